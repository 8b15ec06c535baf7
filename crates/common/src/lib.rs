//! Reelforge Common Utilities
//!
//! Shared infrastructure for all Reelforge crates:
//! - Error types and result aliases
//! - Clock and throughput utilities for export accounting
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
