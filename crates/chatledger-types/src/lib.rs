//! Shared domain types for chatledger.
//!
//! This crate contains the core domain types used across the chatledger
//! engine: Session, Message, Sender, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod error;
pub mod message;
pub mod session;
