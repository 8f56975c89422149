//! Authentication Extractors
//!
//! Axum extractor for the bearer-authenticated identity.

use crate::error::AuthError;
use crate::token::{TokenClaims, TokenIssuer};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Authenticated identity extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub subject: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Create user from token claims
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            subject: claims.sub.clone(),
            expires_at: claims.expires_at(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenIssuer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Claims already validated by middleware
        if let Some(claims) = parts.extensions.get::<TokenClaims>() {
            return Ok(AuthUser::from_claims(claims));
        }

        let token = bearer_token(&parts.headers)?;
        let issuer = Arc::<TokenIssuer>::from_ref(state);
        let claims = issuer.verify_claims(token)?;

        Ok(AuthUser::from_claims(&claims))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
