//! Stockroom Authentication
//!
//! Credential and session-authentication core for the Stockroom drink
//! inventory API:
//! - PBKDF2-HMAC-SHA256 (default) or Argon2id password hashing
//! - Constant-time password verification
//! - HS256 bearer token issuance and validation
//! - Axum extractor and middleware guards with a uniform 401 response
//!
//! Credential records are produced and consumed here but stored by the
//! caller. Tokens are stateless and cannot be revoked before they expire.
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET` - Secret key for signing tokens (required, min 32 chars)
//! - `JWT_ACCESS_EXPIRATION` - Access token lifetime in seconds (default: 1800)
//! - `JWT_ISSUER` - JWT issuer claim (default: "stockroom")
//! - `JWT_AUDIENCE` - JWT audience claim (default: "stockroom-api")
//! - `PASSWORD_KDF` - `pbkdf2-sha256` (default) or `argon2id`
//! - `PBKDF2_ITERATIONS` - PBKDF2 rounds (default and minimum: 100000)
//! - `ARGON2_MEMORY_COST` / `ARGON2_TIME_COST` / `ARGON2_PARALLELISM`
//! - `PASSWORD_SALT_LENGTH` - Salt bytes (default: 32, minimum: 16)
//! - `MIN_PASSWORD_LENGTH` - Minimum password length (default: 8)
//!
//! # Usage
//!
//! ```rust,ignore
//! use stockroom_auth::{AuthConfig, AuthService, AuthState, middleware::require_auth};
//!
//! let auth = AuthState::new(AuthService::new(AuthConfig::from_env()?)?);
//!
//! // Registration: store `record.encode()?` next to the user row
//! let record = auth.service.register(register_request).await?;
//!
//! // Login: look the record up by email, `None` if there is no such user
//! let token = auth.service.login(login_request, stored_record.as_ref()).await?;
//!
//! // Protect routes
//! let app = Router::new()
//!     .route("/users/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(auth.clone(), require_auth))
//!     .with_state(auth);
//! ```

pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod models;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use credentials::{CredentialManager, CredentialRecord, KdfAlgorithm, KdfParams};
pub use error::AuthError;
pub use extractors::AuthUser;
pub use models::*;
pub use service::{AuthService, AuthState};
pub use token::{TokenClaims, TokenIssuer};
