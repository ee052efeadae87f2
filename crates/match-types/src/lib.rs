//! # match-types
//!
//! Shared types for the match index.
//!
//! - [`VectorRecord`]: an `{id, vector}` pair as enumerated from the
//!   source-of-truth record store
//! - [`Settings`]: layered configuration for the daemon and index
//! - [`ConfigError`]: configuration loading failures
//!
//! ## Usage
//!
//! ```rust
//! use match_types::VectorRecord;
//!
//! let record = VectorRecord::new(7, vec![0.5, 0.5]);
//! assert_eq!(record.dimension(), 2);
//! ```

pub mod config;
pub mod error;
pub mod record;

pub use config::Settings;
pub use error::ConfigError;
pub use record::VectorRecord;
