//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::credentials::{
    KdfAlgorithm, MIN_ARGON2_MEMORY_KIB, MIN_ARGON2_TIME_COST, MIN_PBKDF2_ITERATIONS,
    MIN_SALT_LENGTH,
};
use crate::error::AuthError;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Longest accepted default token lifetime in seconds (one year)
pub const MAX_ACCESS_TOKEN_EXPIRATION: i64 = 365 * 24 * 60 * 60;

/// Authentication configuration loaded from environment
///
/// Built once at startup and handed to [`CredentialManager`](crate::CredentialManager)
/// and [`TokenIssuer`](crate::TokenIssuer); nothing reads the environment afterwards.
#[derive(Clone)]
pub struct AuthConfig {
    /// JWT secret key for signing tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Default access token lifetime in seconds (from JWT_ACCESS_EXPIRATION env var)
    pub access_token_expiration: i64,

    /// JWT issuer (from JWT_ISSUER env var)
    pub jwt_issuer: String,

    /// JWT audience (from JWT_AUDIENCE env var)
    pub jwt_audience: String,

    /// KDF used for new credential records (from PASSWORD_KDF env var)
    pub password_kdf: KdfAlgorithm,

    /// PBKDF2-HMAC-SHA256 rounds (from PBKDF2_ITERATIONS env var)
    pub pbkdf2_iterations: u32,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Random salt length in bytes (from PASSWORD_SALT_LENGTH env var)
    pub salt_length: usize,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,
}

impl AuthConfig {
    /// Configuration with default settings around the given secret
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_expiration: 1800, // 30 minutes
            jwt_issuer: "stockroom".to_string(),
            jwt_audience: "stockroom-api".to_string(),
            password_kdf: KdfAlgorithm::Pbkdf2Sha256,
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
            argon2_memory_cost: MIN_ARGON2_MEMORY_KIB,
            argon2_time_cost: MIN_ARGON2_TIME_COST,
            argon2_parallelism: 1,
            salt_length: 32,
            min_password_length: 8,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| AuthError::Config("JWT_SECRET must be set".to_string()))?;
        let defaults = Self::new(jwt_secret);

        Ok(Self {
            access_token_expiration: parse_or(
                &lookup,
                "JWT_ACCESS_EXPIRATION",
                defaults.access_token_expiration,
            )?,
            jwt_issuer: lookup("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: lookup("JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            password_kdf: parse_or(&lookup, "PASSWORD_KDF", defaults.password_kdf)?,
            pbkdf2_iterations: parse_or(&lookup, "PBKDF2_ITERATIONS", defaults.pbkdf2_iterations)?,
            argon2_memory_cost: parse_or(
                &lookup,
                "ARGON2_MEMORY_COST",
                defaults.argon2_memory_cost,
            )?,
            argon2_time_cost: parse_or(&lookup, "ARGON2_TIME_COST", defaults.argon2_time_cost)?,
            argon2_parallelism: parse_or(
                &lookup,
                "ARGON2_PARALLELISM",
                defaults.argon2_parallelism,
            )?,
            salt_length: parse_or(&lookup, "PASSWORD_SALT_LENGTH", defaults.salt_length)?,
            min_password_length: parse_or(
                &lookup,
                "MIN_PASSWORD_LENGTH",
                defaults.min_password_length,
            )?,
            jwt_secret: defaults.jwt_secret,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.access_token_expiration <= 0 {
            return Err(AuthError::Config(
                "JWT_ACCESS_EXPIRATION must be positive".to_string(),
            ));
        }

        if self.access_token_expiration > MAX_ACCESS_TOKEN_EXPIRATION {
            return Err(AuthError::Config(format!(
                "JWT_ACCESS_EXPIRATION must be at most {} seconds",
                MAX_ACCESS_TOKEN_EXPIRATION
            )));
        }

        if self.salt_length < MIN_SALT_LENGTH {
            return Err(AuthError::Config(format!(
                "PASSWORD_SALT_LENGTH must be at least {}",
                MIN_SALT_LENGTH
            )));
        }

        match self.password_kdf {
            KdfAlgorithm::Pbkdf2Sha256 if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS => {
                return Err(AuthError::Config(format!(
                    "PBKDF2_ITERATIONS must be at least {}",
                    MIN_PBKDF2_ITERATIONS
                )));
            }
            KdfAlgorithm::Argon2id => {
                if self.argon2_time_cost < MIN_ARGON2_TIME_COST {
                    return Err(AuthError::Config(format!(
                        "ARGON2_TIME_COST must be at least {}",
                        MIN_ARGON2_TIME_COST
                    )));
                }
                if self.argon2_memory_cost < MIN_ARGON2_MEMORY_KIB {
                    return Err(AuthError::Config(format!(
                        "ARGON2_MEMORY_COST must be at least {} KiB",
                        MIN_ARGON2_MEMORY_KIB
                    )));
                }
                if self.argon2_parallelism == 0 {
                    return Err(AuthError::Config(
                        "ARGON2_PARALLELISM must be positive".to_string(),
                    ));
                }
            }
            _ => {}
        }

        if self.min_password_length < 8 {
            return Err(AuthError::Config(
                "MIN_PASSWORD_LENGTH must be at least 8".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[redacted]")
            .field("access_token_expiration", &self.access_token_expiration)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("password_kdf", &self.password_kdf)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .field("argon2_memory_cost", &self.argon2_memory_cost)
            .field("argon2_time_cost", &self.argon2_time_cost)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .field("salt_length", &self.salt_length)
            .field("min_password_length", &self.min_password_length)
            .finish()
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AuthError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Config(format!("{} has an invalid value", key))),
        None => Ok(default),
    }
}
