//! Utility functions and helpers

pub mod atomic;

pub use atomic::{write_json_atomic, AtomicError, AtomicResult};
