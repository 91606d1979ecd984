//! Business logic and repository trait definitions for chatledger.
//!
//! This crate defines the "ports" (repository traits) that the
//! infrastructure layer implements, plus the services that own the
//! engine's invariants: content fingerprinting, session identity and
//! uniqueness, per-session ordered messages with dedup and cascade
//! edit/delete, and the turn-by-turn conversation orchestrator.
//! It depends only on `chatledger-types` -- never on `chatledger-infra`
//! or any database/IO crate.

pub mod conversation;
pub mod fingerprint;
pub mod message;
pub mod session;
