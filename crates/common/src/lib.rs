//! Common utilities and shared types for pollchain.
//!
//! This crate provides foundational components used across all pollchain crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Backoff**: Bounded exponential budgets via [`Backoff`]
//! - **ID Generation**: ULID-based poll identifiers via [`IdGenerator`]
//! - **Metrics**: Poll and vote counters via [`Metrics`]
//!
//! # Example
//!
//! ```no_run
//! use pollchain_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod id;
pub mod metrics;

pub use backoff::Backoff;
pub use config::{Config, PollConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use metrics::{Metrics, MetricsSnapshot, Timer, get_metrics};
