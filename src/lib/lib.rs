//! Store-and-forward relay.
//!
//! Messages arrive over HTTP, are persisted by a single writer task into an
//! ordered store, and are forwarded in batches of the oldest entries to a
//! collector. They leave the store only once the collector confirms them, or
//! when a prolonged outage pushes the queue past its configured maximum.

pub mod adapters;
pub mod config;
pub mod core;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod tests;
