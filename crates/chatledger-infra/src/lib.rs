//! Infrastructure layer for chatledger.
//!
//! Contains implementations of the repository traits defined in
//! `chatledger-core` (SQLite storage over a split reader/writer pool)
//! and the reqwest-based completion provider.

pub mod provider;
pub mod sqlite;
