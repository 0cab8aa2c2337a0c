//! Reframe Common Utilities
//!
//! Shared infrastructure for all Reframe crates:
//! - Error types and result aliases
//! - Session and virtual clocks for animation and frame pacing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
