//! Middleware components
//!
//! This module contains middleware for:
//! - Authentication (JWT issued by the identity provider)

pub mod auth;

pub use auth::{auth_middleware, AuthUser, Claims};
