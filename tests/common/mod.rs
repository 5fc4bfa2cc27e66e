//! Shared helpers for integration tests.
//!
//! - `logger`: phase-tagged test output on stderr

pub mod logger;
