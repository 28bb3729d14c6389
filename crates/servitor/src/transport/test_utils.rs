//! Test helpers for the transport module.

use std::net::TcpStream;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::{Duration, Instant};

use super::{ConnectionHandler, Exchange};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
    finish_after: Option<usize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        Self::build(None)
    }

    pub(crate) fn finishing_after(limit: usize) -> (Arc<AtomicUsize>, Arc<Self>) {
        Self::build(Some(limit))
    }

    fn build(finish_after: Option<usize>) -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
            finish_after,
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: TcpStream) -> Exchange {
        let seen = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        match self.finish_after {
            Some(limit) if seen >= limit => Exchange::Finished,
            _ => Exchange::Continue,
        }
    }
}

pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
