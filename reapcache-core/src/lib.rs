//! # reapcache core
//!
//! Shared building blocks for the reapcache crates:
//!
//! - **Errors**: `CacheError` and the crate-wide `Result` alias
//! - **Config**: `CacheConfig` with the TTL and sweep interval
//! - **Constants**: Defaults and thread naming
//! - **Traits**: `Fetcher`, the slow path a write-through cache sits in front of
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use reapcache_core::CacheConfig;
//!
//! let config = CacheConfig::new()
//!     .ttl(Duration::from_millis(100))
//!     .sweep_interval(Duration::from_millis(50));
//! assert!(config.validate().is_ok());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod traits;

pub use config::CacheConfig;
pub use constants::*;
pub use error::{CacheError, Result};
pub use traits::Fetcher;
