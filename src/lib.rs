//! Two-chain bridge relay
//!
//! The indexer records `Deposit` and `Distribution` events from both chains
//! into SQLite; the relay worker calls `distribute` on the destination chain
//! for every unprocessed deposit and marks it processed once confirmed.

pub mod api;
pub mod config;
pub mod contracts;
pub mod db;
pub mod metrics;
pub mod schedule;
pub mod types;
pub mod watchers;
pub mod writers;
