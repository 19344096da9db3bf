//! Storage Engine
//!
//! Expiring key-value store: mapping, expiration index and sweeper.

mod index;
mod store;
mod sweeper;

pub use store::Store;
