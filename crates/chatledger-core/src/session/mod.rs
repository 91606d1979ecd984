//! Session identity, uniqueness, and soft-delete.

pub mod repository;
pub mod store;

pub use repository::SessionRepository;
pub use store::SessionStore;
