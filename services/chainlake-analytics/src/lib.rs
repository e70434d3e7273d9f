//! Per-address behavioral analytics.
//!
//! Profiles aggregate every transfer an address touched for one asset;
//! risk indicators and the behavioral classification are derived from
//! the aggregate, never from individual events.

pub mod classify;
pub mod profile;
pub mod risk;

pub use classify::classify;
pub use profile::ProfileStore;
