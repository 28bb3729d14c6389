//! Line-oriented framing for control requests and responses.
//!
//! A request is the command on one line, each argument on its own line,
//! then a blank line:
//!
//! ```text
//! <command>\n[<arg>\n]*\n
//! ```
//!
//! Responses use the same layout without the command line. There is no
//! escaping, so a frame cannot carry an empty argument or a line break
//! inside a value. [`CommandFrame::new`] rejects such values instead of
//! producing a frame the peer would misread.

use std::io::{self, BufRead, Read, Write};

use thiserror::Error;

/// Upper bound on the bytes accepted for a single frame.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Errors raised while building, encoding, or decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream before sending a single line.
    #[error("connection closed before a frame was received")]
    ConnectionClosed,
    /// The command line of a request was empty.
    #[error("command frames require a non-empty command")]
    EmptyCommand,
    /// A value was empty or contained a line break.
    #[error("value {value:?} cannot be represented in a control frame")]
    UnrepresentableArgument { value: String },
    /// A received line was not valid UTF-8.
    #[error("frame contained invalid UTF-8")]
    InvalidUtf8,
    /// The frame exceeded [`MAX_FRAME_BYTES`].
    #[error("frame exceeds maximum size of {MAX_FRAME_BYTES} bytes")]
    TooLarge,
    /// Reading or writing the underlying stream failed.
    #[error("control stream I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A control request: one command plus its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    command: String,
    args: Vec<String>,
}

impl CommandFrame {
    /// Builds a frame, rejecting values the wire format cannot carry.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Result<Self, FrameError> {
        let command = command.into();
        if command.is_empty() {
            return Err(FrameError::EmptyCommand);
        }
        ensure_representable(&command)?;
        for arg in &args {
            ensure_representable(arg)?;
        }
        Ok(Self { command, args })
    }

    /// The command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The argument lines.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Writes the frame, including the terminating blank line.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), FrameError> {
        write_line(writer, &self.command)?;
        for arg in &self.args {
            write_line(writer, arg)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Reads one frame.
    ///
    /// Returns [`FrameError::ConnectionClosed`] when the stream ends before
    /// any line arrives. A stream that ends after the command but before the
    /// blank line still yields the lines received so far.
    pub fn decode<R: BufRead>(reader: &mut R) -> Result<Self, FrameError> {
        let Some(mut lines) = read_lines(reader)? else {
            return Err(FrameError::ConnectionClosed);
        };
        if lines.is_empty() {
            return Err(FrameError::EmptyCommand);
        }
        let command = lines.remove(0);
        Ok(Self {
            command,
            args: lines,
        })
    }
}

/// A control response: zero or more output lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFrame {
    lines: Vec<String>,
}

impl ResponseFrame {
    /// A response with no lines; used to acknowledge a stop.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// Splits `text` into response lines.
    ///
    /// Blank lines are dropped because the peer would read them as the end
    /// of the frame.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        }
    }

    /// The response lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether the response carries no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Writes the response, including the terminating blank line.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), FrameError> {
        for line in &self.lines {
            write_line(writer, line)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Reads one response. A stream that ends early yields the lines
    /// received so far.
    pub fn decode<R: BufRead>(reader: &mut R) -> Result<Self, FrameError> {
        let lines = read_lines(reader)?.unwrap_or_default();
        Ok(Self { lines })
    }
}

fn ensure_representable(value: &str) -> Result<(), FrameError> {
    if value.is_empty() || value.contains(['\n', '\r']) {
        return Err(FrameError::UnrepresentableArgument {
            value: value.to_owned(),
        });
    }
    Ok(())
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")
}

/// Reads lines up to the blank sentinel or end of stream.
///
/// Returns `None` when the stream ended before any byte was read.
fn read_lines<R: BufRead>(reader: &mut R) -> Result<Option<Vec<String>>, FrameError> {
    let mut lines = Vec::new();
    let mut consumed = 0_usize;
    loop {
        let remaining = MAX_FRAME_BYTES.saturating_sub(consumed);
        let limit = u64::try_from(remaining)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut buffer = Vec::new();
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buffer)?;
        if read == 0 {
            if consumed == 0 {
                return Ok(None);
            }
            return Ok(Some(lines));
        }
        consumed = consumed.saturating_add(read);
        if consumed > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge);
        }
        strip_line_ending(&mut buffer);
        if buffer.is_empty() {
            return Ok(Some(lines));
        }
        let line = String::from_utf8(buffer).map_err(|_| FrameError::InvalidUtf8)?;
        lines.push(line);
    }
}

fn strip_line_ending(buffer: &mut Vec<u8>) {
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }
    }
}
