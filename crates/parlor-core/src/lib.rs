//! Parlor conversation service.
//!
//! The service only talks to its collaborators through the traits in
//! [`store`]. SQLite and WebSocket implementations live in parlor-db and
//! parlor-gateway.

pub mod error;
pub mod service;
pub mod store;

pub use error::ServiceError;
pub use service::{ConversationService, Principal};
