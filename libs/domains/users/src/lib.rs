//! Users Domain
//!
//! Accounts, credentials and role-based access for the accounts service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, bearer resolution, role gate
//! └──────┬──────┘
//!        │
//! ┌──────▼──────────────────────┐
//! │ AuthService / UserService   │  ← Use cases
//! │ EncryptService TokenService │  ← Argon2id, HS256 JWT
//! └──────┬──────────────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Trait, in-memory and Postgres implementations
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Domain entity, DTOs, enums
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_users::{
//!     AuthService, EncryptService, InMemoryUserRepository, PasswordConfig, TokenConfig,
//!     TokenService, UserService, handlers,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = Arc::new(InMemoryUserRepository::new());
//! let encrypt = EncryptService::new(&PasswordConfig::default())?;
//! let tokens = TokenService::new(&TokenConfig::new(
//!     "access-secret-that-is-at-least-32-chars",
//!     "refresh-secret-that-is-at-least-32-chars",
//! )?);
//!
//! let state = handlers::UsersState {
//!     auth: AuthService::new(repository.clone(), encrypt.clone(), tokens),
//!     users: UserService::new(repository, encrypt),
//! };
//! let router = handlers::router(state);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod authorization;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod tokens;

// Re-export commonly used types
pub use auth::AuthService;
pub use authorization::{Operation, RequiredRoles, authorize, authorize_operation};
pub use config::{PasswordConfig, TokenConfig};
pub use error::{UniqueField, UserError, UserResult};
pub use models::{AuthTokens, Role, User, UserFilter, UserPatch, UserResponse};
pub use password::EncryptService;
pub use postgres::PgUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;
pub use tokens::{TokenClaims, TokenService};
