// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the authenticated caller.
//!
//! The gateway middleware does the actual verification; these only read the
//! [`AuthenticatedIdentity`] it left in the request extensions.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.did is the caller's DID
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, AuthenticatedIdentity};

/// Requires an authenticated caller.
pub struct Auth(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingAuthorization)
    }
}

/// Authenticated caller if there is one.
///
/// Exempt routes never carry an identity, so this is always `None` there.
pub struct OptionalAuth(pub Option<AuthenticatedIdentity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            parts.extensions.get::<AuthenticatedIdentity>().cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts() -> Parts {
        Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn identity() -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            did: "did:wba:example.com:wba:user:abc".to_string(),
            key_id: Some("key-1".to_string()),
            access_token: None,
        }
    }

    #[tokio::test]
    async fn auth_requires_identity() {
        let mut parts = parts();
        let result = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::MissingAuthorization)));
    }

    #[tokio::test]
    async fn auth_reads_identity_from_extensions() {
        let mut parts = parts();
        parts.extensions.insert(identity());

        let Auth(found) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, identity());
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_identity() {
        let mut parts = parts();
        let OptionalAuth(found) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn optional_auth_returns_identity_when_present() {
        let mut parts = parts();
        parts.extensions.insert(identity());
        let OptionalAuth(found) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found.map(|i| i.did), Some(identity().did));
    }
}
