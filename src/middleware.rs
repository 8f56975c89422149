//! Authentication Middleware
//!
//! Bearer token guards for axum routers. Attach with
//! `axum::middleware::from_fn_with_state`.

use crate::error::AuthError;
use crate::extractors::bearer_token;
use crate::token::TokenIssuer;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require authenticated user
///
/// Validates the bearer token and stores its claims in request extensions
/// for use by extractors.
pub async fn require_auth(
    State(issuer): State<Arc<TokenIssuer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = {
        let token = bearer_token(req.headers())?;
        issuer.verify_claims(token)?
    };

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Optional authentication
///
/// Stores claims when a valid token is presented; never rejects.
pub async fn optional_auth(
    State(issuer): State<Arc<TokenIssuer>>,
    mut req: Request,
    next: Next,
) -> Response {
    let claims = bearer_token(req.headers())
        .and_then(|token| issuer.verify_claims(token))
        .ok();

    if let Some(claims) = claims {
        req.extensions_mut().insert(claims);
    }

    next.run(req).await
}
