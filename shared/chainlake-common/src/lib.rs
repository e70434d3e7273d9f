//! Shared types and utilities for the Chainlake analytics core.
//!
//! Everything that more than one crate needs lives here: the transfer
//! event model, rollup bucket shapes, partition states, the error
//! taxonomy, configuration loading, and the deterministic time/bin
//! helpers that aggregation correctness depends on.

pub mod bins;
pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::{ChainlakeError, Result};
