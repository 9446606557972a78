//! Utility functions and helpers
//!
//! - [`retry`] - Retry logic for transient connection failures

pub mod retry;
