//! Shared types for the qa-playground client and any backend it talks to.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
