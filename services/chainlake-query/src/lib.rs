//! Read-only query facade over the Chainlake stores.
//!
//! A library boundary, not a transport: callers hold a `QueryFacade`
//! and get clones of stored data. Nothing here mutates the stores.

pub mod facade;

pub use facade::QueryFacade;
