//! Test suites for the service controller.

mod support;
