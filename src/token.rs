//! Token Issuer/Verifier
//!
//! Mints and validates HS256 bearer tokens. Tokens are stateless: nothing is
//! stored server-side and a token stays valid until its `exp` passes.

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::AuthError;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Claims carried by every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user identity)
    pub sub: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// JWT ID (unique identifier)
    pub jti: Uuid,
}

impl TokenClaims {
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }
}

/// Signs and checks access tokens with the server-held secret
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Create a token issuer on the wall clock
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a token issuer on a caller-supplied clock
    pub fn with_clock(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        config.validate()?;

        // Expiry is checked against `clock`, not the library's own time source
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let default_ttl = Duration::try_seconds(config.access_token_expiration).ok_or_else(|| {
            AuthError::Config("JWT_ACCESS_EXPIRATION is out of range".to_string())
        })?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            default_ttl,
            clock,
        })
    }

    /// Lifetime used by [`issue_default`](Self::issue_default)
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token with the configured lifetime
    pub fn issue_default(&self, subject: &str) -> Result<String, AuthError> {
        self.issue(subject, self.default_ttl)
    }

    /// Issue a token for `subject` that expires `ttl` from now
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, AuthError> {
        if subject.is_empty() {
            return Err(AuthError::Validation("Token subject is required".to_string()));
        }
        if ttl < Duration::seconds(1) {
            return Err(AuthError::Validation(
                "Token lifetime must be at least one second".to_string(),
            ));
        }

        let now = self.clock.now();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Validation("Token lifetime is too large".to_string()))?;

        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("JWT encoding error: {:?}", e);
            AuthError::Internal
        })
    }

    /// Validate a token and return its subject
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.verify_claims(token).map(|claims| claims.sub)
    }

    /// Validate a token and return all of its claims
    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = token_data.claims;

        if claims.exp <= self.clock.now().timestamp() {
            tracing::debug!(subject = %claims.sub, "Rejected expired token");
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const SECRET: &str = "test-signing-secret-that-is-long-enough";

    fn manual_issuer() -> (TokenIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer = TokenIssuer::with_clock(&AuthConfig::new(SECRET), clock.clone()).unwrap();
        (issuer, clock)
    }

    /// Replace one character of the signature segment
    fn tamper_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        format!("{}.{}", head, chars.into_iter().collect::<String>())
    }

    #[test]
    fn test_issue_then_verify() {
        let (issuer, _) = manual_issuer();
        let token = issuer.issue("alice@example.com", Duration::minutes(30)).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), "alice@example.com");
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let (issuer, clock) = manual_issuer();
        let token = issuer.issue("alice@example.com", Duration::minutes(30)).unwrap();

        clock.advance(Duration::minutes(29));
        assert_eq!(issuer.verify(&token).unwrap(), "alice@example.com");

        clock.advance(Duration::minutes(2));
        assert_eq!(issuer.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_token_is_expired_at_exact_deadline() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let issuer = TokenIssuer::with_clock(&AuthConfig::new(SECRET), clock.clone()).unwrap();
        let token = issuer.issue("bob@example.com", Duration::seconds(60)).unwrap();

        clock.set(start + Duration::seconds(59));
        assert!(issuer.verify(&token).is_ok());

        clock.set(start + Duration::seconds(60));
        assert_eq!(issuer.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_claims_contents() {
        let (issuer, clock) = manual_issuer();
        let now = clock.now();
        let token = issuer.issue_default("carol@example.com").unwrap();
        let claims = issuer.verify_claims(&token).unwrap();

        assert_eq!(claims.subject(), "carol@example.com");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, (now + Duration::minutes(30)).timestamp());
        assert_eq!(claims.iss, "stockroom");
        assert_eq!(claims.aud, "stockroom-api");
        assert!(claims.expires_at().unwrap() > now);
    }

    #[test]
    fn test_each_token_gets_its_own_id() {
        let (issuer, _) = manual_issuer();
        let first = issuer.verify_claims(&issuer.issue_default("dave@example.com").unwrap());
        let second = issuer.verify_claims(&issuer.issue_default("dave@example.com").unwrap());
        assert_ne!(first.unwrap().jti, second.unwrap().jti);
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let (issuer, _) = manual_issuer();
        let token = issuer.issue_default("erin@example.com").unwrap();
        assert_eq!(
            issuer.verify(&tamper_signature(&token)),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_foreign_key_is_rejected() {
        let (issuer, _) = manual_issuer();
        let other = TokenIssuer::new(&AuthConfig::new("another-secret-also-long-enough-000")).unwrap();
        let token = other.issue_default("frank@example.com").unwrap();
        assert_eq!(issuer.verify(&token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_foreign_audience_is_rejected() {
        let (issuer, _) = manual_issuer();
        let mut config = AuthConfig::new(SECRET);
        config.jwt_audience = "someone-else".to_string();
        let other = TokenIssuer::new(&config).unwrap();

        let token = other.issue_default("gina@example.com").unwrap();
        assert_eq!(issuer.verify(&token), Err(AuthError::InvalidClaims));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (issuer, _) = manual_issuer();
        for token in ["", "not-a-token", "a.b", "a.b.c", "!!!.???.***"] {
            assert_eq!(issuer.verify(token), Err(AuthError::Malformed), "{:?}", token);
        }
    }

    #[test]
    fn test_missing_expiry_is_malformed() {
        #[derive(Serialize)]
        struct NoExpiry<'a> {
            sub: &'a str,
            iss: &'a str,
            aud: &'a str,
        }

        let (issuer, _) = manual_issuer();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoExpiry {
                sub: "hank@example.com",
                iss: "stockroom",
                aud: "stockroom-api",
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(issuer.verify(&token), Err(AuthError::Malformed));
    }

    #[test]
    fn test_issue_rejects_bad_input() {
        let (issuer, _) = manual_issuer();
        assert!(matches!(
            issuer.issue("", Duration::minutes(5)),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            issuer.issue("ivy@example.com", Duration::zero()),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            issuer.issue("ivy@example.com", Duration::milliseconds(500)),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_issue_rejects_unrepresentable_lifetime() {
        let (issuer, _) = manual_issuer();
        assert!(matches!(
            issuer.issue("alice@example.com", Duration::days(365 * 300_000)),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_default_lifetime() {
        let mut config = AuthConfig::new(SECRET);
        config.access_token_expiration = i64::MAX;
        assert!(matches!(
            TokenIssuer::new(&config),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            TokenIssuer::new(&AuthConfig::new("short")),
            Err(AuthError::Config(_))
        ));
    }
}
