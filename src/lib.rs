//! User accounts: register, login, logout and profile lookup with
//! Argon2 password hashing and a single active JWT session per user.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;

pub use auth::services::AuthService;
pub use error::AuthError;
