//! Keyward Core - identity store contract, token issuance, and policy model
//!
//! This crate defines the domain layer shared by every Keyward frontend:
//! the [`IdentityStore`] trait with a reference in-memory implementation,
//! the [`TokenIssuer`] that projects a user's role/claim graph into a signed
//! bearer token, the immutable [`PolicyRegistry`], and bootstrap role seeding.

pub mod config;
pub mod error;
pub mod policy;
pub mod seed;
pub mod store;
pub mod token;
pub mod types;

pub use config::*;
pub use error::*;
pub use policy::*;
pub use seed::*;
pub use store::*;
pub use token::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
