//! # Stellar Turn Server
//!
//! Hosts one galaxy and advances it on a fixed schedule.
//!
//! Client commands (orders, build queues, research targets, report
//! retrieval) go through [`GameHost`], which serializes them with turn
//! execution. The wire protocol that delivers those commands is not part of
//! this crate.
//!
//! ## Crate Structure
//!
//! - [`config`]: RON server configuration
//! - [`error`]: Server error type
//! - [`host`]: The galaxy owner and command surface
//! - [`scheduler`]: Interval-driven turn loop with snapshot cadence

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod host;
pub mod scheduler;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use host::GameHost;
pub use scheduler::Schedule;
