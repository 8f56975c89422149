//! Authentication Service
//!
//! Registration, login and password change on top of the credential manager
//! and token issuer. Credential records are handed in and out; storing them
//! is the caller's job.

use crate::config::AuthConfig;
use crate::credentials::{CredentialManager, CredentialRecord};
use crate::error::AuthError;
use crate::models::*;
use crate::token::TokenIssuer;

use axum::extract::FromRef;
use std::sync::Arc;
use validator::Validate;

/// Authentication service
pub struct AuthService {
    config: AuthConfig,
    credentials: Arc<CredentialManager>,
    tokens: Arc<TokenIssuer>,
}

impl AuthService {
    /// Create a new authentication service on the wall clock
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let tokens = TokenIssuer::new(&config)?;
        Self::with_token_issuer(config, tokens)
    }

    /// Create a service around an already built token issuer
    pub fn with_token_issuer(config: AuthConfig, tokens: TokenIssuer) -> Result<Self, AuthError> {
        let credentials = CredentialManager::new(&config)?;

        Ok(Self {
            config,
            credentials: Arc::new(credentials),
            tokens: Arc::new(tokens),
        })
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn tokens(&self) -> Arc<TokenIssuer> {
        Arc::clone(&self.tokens)
    }

    // ============================================
    // Registration
    // ============================================

    /// Validate a registration and produce the record to store
    pub async fn register(&self, req: RegisterRequest) -> Result<CredentialRecord, AuthError> {
        req.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        self.validate_password(&req.password)?;

        let identity = normalize_identity(&req.email);
        let credentials = Arc::clone(&self.credentials);
        let record =
            run_kdf(move || credentials.hash(&identity, &req.password)).await?;

        tracing::info!(identity = %record.identity, "Credential record created");
        Ok(record)
    }

    /// Validate password strength
    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.config.min_password_length
            )));
        }
        Ok(())
    }

    // ============================================
    // Login
    // ============================================

    /// Check a login against the stored record (if any) and issue a token
    ///
    /// Pass `None` when no record exists for the identity; the same KDF work
    /// is done either way and the failure is indistinguishable.
    pub async fn login(
        &self,
        req: LoginRequest,
        record: Option<&CredentialRecord>,
    ) -> Result<TokenResponse, AuthError> {
        req.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let identity = normalize_identity(&req.email);
        let credentials = Arc::clone(&self.credentials);
        let expected = identity.clone();
        let record = record.cloned();
        let verified = run_kdf(move || match record {
            Some(record) if record.identity == expected => {
                credentials.verify(&req.password, &record)
            }
            _ => {
                credentials.burn_verification(&req.password);
                Ok(false)
            }
        })
        .await?;

        if !verified {
            tracing::warn!(identity = %identity, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.tokens.issue_default(&identity)?;
        tracing::info!(identity = %identity, "Login succeeded");

        Ok(TokenResponse::bearer(
            access_token,
            self.tokens.default_ttl().num_seconds(),
        ))
    }

    /// Verify a bearer token and return the identity it was issued to
    pub fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.verify(token)
    }

    /// Whether a record should be re-hashed with the current settings
    pub fn needs_rehash(&self, record: &CredentialRecord) -> bool {
        self.credentials.needs_rehash(record)
    }

    // ============================================
    // Password Change
    // ============================================

    /// Verify the current password and produce a replacement record
    pub async fn change_password(
        &self,
        req: ChangePasswordRequest,
        record: &CredentialRecord,
    ) -> Result<CredentialRecord, AuthError> {
        req.validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        self.validate_password(&req.new_password)?;

        let credentials = Arc::clone(&self.credentials);
        let record = record.clone();
        let replacement = run_kdf(move || {
            if !credentials.verify(&req.current_password, &record)? {
                return Err(AuthError::InvalidCredentials);
            }
            credentials.hash(&record.identity, &req.new_password)
        })
        .await;

        match &replacement {
            Ok(record) => tracing::info!(identity = %record.identity, "Password changed"),
            Err(AuthError::InvalidCredentials) => {
                tracing::warn!("Password change rejected: current password mismatch")
            }
            Err(_) => {}
        }

        replacement
    }
}

/// Run KDF work off the async executor
async fn run_kdf<T, F>(work: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!("KDF task failed: {:?}", e);
        AuthError::Internal
    })?
}

/// Shared state for routers that use the authentication guards
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(service: AuthService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl FromRef<AuthState> for Arc<TokenIssuer> {
    fn from_ref(state: &AuthState) -> Self {
        state.service.tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};

    fn test_service() -> (AuthService, Arc<ManualClock>) {
        let config = AuthConfig::new("service-test-secret-0123456789abcdef");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tokens = TokenIssuer::with_clock(&config, clock.clone()).unwrap();
        (AuthService::with_token_issuer(config, tokens).unwrap(), clock)
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_login_authenticate() {
        let (auth, clock) = test_service();
        let record = auth
            .register(register_request("Alice@Example.com", "Correct-Horse-1"))
            .await
            .unwrap();
        assert_eq!(record.identity, "alice@example.com");

        let response = auth
            .login(login_request("alice@example.com", "Correct-Horse-1"), Some(&record))
            .await
            .unwrap();
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 1800);
        assert_eq!(
            auth.authenticate(&response.access_token).unwrap(),
            "alice@example.com"
        );

        clock.advance(Duration::minutes(31));
        assert_eq!(
            auth.authenticate(&response.access_token),
            Err(AuthError::Expired)
        );
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let (auth, _) = test_service();
        let record = auth
            .register(register_request("bob@example.com", "Sparkling-Water-9"))
            .await
            .unwrap();

        let wrong_password = auth
            .login(login_request("bob@example.com", "sparkling-water-9"), Some(&record))
            .await;
        let unknown_user = auth
            .login(login_request("nobody@example.com", "Sparkling-Water-9"), None)
            .await;
        let someone_elses_record = auth
            .login(login_request("mallory@example.com", "Sparkling-Water-9"), Some(&record))
            .await;

        assert_eq!(wrong_password, Err(AuthError::InvalidCredentials));
        assert_eq!(unknown_user, Err(AuthError::InvalidCredentials));
        assert_eq!(someone_elses_record, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let (auth, _) = test_service();
        let result = auth
            .register(RegisterRequest {
                email: "carol@example.com".into(),
                password: "Ginger-Ale-2".into(),
                password_confirm: "Ginger-Ale-3".into(),
            })
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));

        let result = auth.register(register_request("not-an-email", "Ginger-Ale-2")).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_configured_minimum_length_applies() {
        let mut config = AuthConfig::new("service-test-secret-0123456789abcdef");
        config.min_password_length = 12;
        let auth = AuthService::new(config).unwrap();

        let result = auth.register(register_request("dave@example.com", "Root-Beer7")).await;
        assert!(matches!(result, Err(AuthError::Validation(msg)) if msg.contains("12")));
    }

    #[tokio::test]
    async fn test_change_password_replaces_record() {
        let (auth, _) = test_service();
        let original = auth
            .register(register_request("erin@example.com", "Cold-Brew-42"))
            .await
            .unwrap();

        let replacement = auth
            .change_password(
                ChangePasswordRequest {
                    current_password: "Cold-Brew-42".into(),
                    new_password: "Iced-Tea-1234".into(),
                    new_password_confirm: "Iced-Tea-1234".into(),
                },
                &original,
            )
            .await
            .unwrap();

        assert_eq!(replacement.identity, original.identity);
        assert_ne!(replacement.salt, original.salt);
        assert!(auth.credentials().verify("Iced-Tea-1234", &replacement).unwrap());
        assert!(!auth.credentials().verify("Cold-Brew-42", &replacement).unwrap());
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let (auth, _) = test_service();
        let original = auth
            .register(register_request("frank@example.com", "Tonic-Water-5"))
            .await
            .unwrap();

        let result = auth
            .change_password(
                ChangePasswordRequest {
                    current_password: "Tonic-Water-6".into(),
                    new_password: "Soda-Water-999".into(),
                    new_password_confirm: "Soda-Water-999".into(),
                },
                &original,
            )
            .await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_surfaces_malformed_record() {
        let (auth, _) = test_service();
        let mut record = auth
            .register(register_request("gina@example.com", "Lemon-Squash-3"))
            .await
            .unwrap();
        record.salt.clear();

        let result = auth
            .login(login_request("gina@example.com", "Lemon-Squash-3"), Some(&record))
            .await;
        assert_eq!(result, Err(AuthError::InvalidRecord));
    }

    #[test]
    fn test_auth_state_exposes_token_issuer() {
        let (auth, _) = test_service();
        let state = AuthState::new(auth);
        let issuer = Arc::<TokenIssuer>::from_ref(&state);
        let token = issuer.issue_default("hank@example.com").unwrap();
        assert_eq!(state.service.authenticate(&token).unwrap(), "hank@example.com");
    }
}
