//! Per-session ordered messages: dedup, cascade edit/delete.

pub mod log;
pub mod repository;

pub use log::{EditOutcome, MessageLog};
pub use repository::MessageRepository;
