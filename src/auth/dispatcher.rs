// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authentication decision.
//!
//! ## States
//!
//! ```text
//! RECEIVED -> SCHEME_DETECTED -> IDENTITY_VERIFYING -> AUTHENTICATED
//!                            \-> BEARER_VERIFYING   -> AUTHENTICATED
//!                                     (any step)    -> REJECTED
//! ```
//!
//! The DIDWba path checks, in order: timestamp, nonce, document resolution,
//! signature. Only when all four pass is a session token issued. The bearer
//! path only verifies the token.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::claims::AuthenticatedIdentity;
use super::error::AuthError;
use super::header::{AuthorizationHeader, SignedAuthHeader};
use super::nonce::NonceValidator;
use super::resolver::DocumentResolver;
use super::signature::SignatureSuite;
use super::token::{TokenIssuer, TokenVerifier, DEFAULT_TOKEN_TTL_MINUTES};

/// Default timestamp tolerance in minutes.
pub const DEFAULT_TIMESTAMP_TOLERANCE_MINUTES: i64 = 5;

/// Where a request is in the authentication state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Received,
    SchemeDetected,
    IdentityVerifying,
    BearerVerifying,
    Authenticated,
    Rejected,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::SchemeDetected => "scheme_detected",
            Self::IdentityVerifying => "identity_verifying",
            Self::BearerVerifying => "bearer_verifying",
            Self::Authenticated => "authenticated",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Combines freshness checks, resolution, signature verification and
/// token handling into one accept/reject decision.
pub struct AuthDispatcher {
    nonces: Arc<NonceValidator>,
    resolver: DocumentResolver,
    suite: Arc<dyn SignatureSuite>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    token_ttl_minutes: i64,
    timestamp_tolerance_minutes: i64,
}

impl AuthDispatcher {
    pub fn new(
        nonces: Arc<NonceValidator>,
        resolver: DocumentResolver,
        suite: Arc<dyn SignatureSuite>,
        tokens: (TokenIssuer, TokenVerifier),
    ) -> Self {
        let (issuer, verifier) = tokens;
        Self {
            nonces,
            resolver,
            suite,
            issuer,
            verifier,
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            timestamp_tolerance_minutes: DEFAULT_TIMESTAMP_TOLERANCE_MINUTES,
        }
    }

    /// Lifetime of issued tokens.
    pub fn with_token_ttl(mut self, minutes: i64) -> Self {
        self.token_ttl_minutes = minutes;
        self
    }

    /// Accepted clock skew for header timestamps.
    pub fn with_timestamp_tolerance(mut self, minutes: i64) -> Self {
        self.timestamp_tolerance_minutes = minutes;
        self
    }

    pub fn nonces(&self) -> &Arc<NonceValidator> {
        &self.nonces
    }

    /// Decode a raw header value and authenticate it.
    pub async fn authenticate_raw(
        &self,
        raw: &str,
        domain: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        debug!(stage = %AuthStage::Received, "Authenticating request");
        let header = AuthorizationHeader::parse(raw).inspect_err(|e| reject(e, None))?;
        self.authenticate(&header, domain).await
    }

    /// Authenticate a decoded header received on `domain`.
    ///
    /// A DIDWba header yields an identity carrying a freshly issued token; a
    /// bearer header yields the identity recorded in the token.
    pub async fn authenticate(
        &self,
        header: &AuthorizationHeader,
        domain: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        debug!(stage = %AuthStage::SchemeDetected, scheme = header.scheme());

        let result = match header {
            AuthorizationHeader::DidWba(signed) => self.verify_signed(signed, domain).await,
            AuthorizationHeader::Bearer(token) => self.verify_bearer(token),
        };

        match &result {
            Ok(identity) => info!(
                stage = %AuthStage::Authenticated,
                did = %identity.did,
                token_issued = identity.token_issued(),
                "Request authenticated"
            ),
            Err(e) => reject(e, Some(header)),
        }
        result
    }

    async fn verify_signed(
        &self,
        header: &SignedAuthHeader,
        domain: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        debug!(stage = %AuthStage::IdentityVerifying, did = %header.did);

        let tolerance = chrono::Duration::minutes(self.timestamp_tolerance_minutes);
        let Some(issued_at) = self
            .nonces
            .check_timestamp(&header.timestamp, self.timestamp_tolerance_minutes)
        else {
            return Err(AuthError::TimestampExpired);
        };

        // The header stays acceptable until `issued_at + tolerance`; so must
        // the record of its nonce.
        if !self.nonces.is_fresh_until(&header.nonce, issued_at + tolerance) {
            return Err(AuthError::NonceReused);
        }

        let document = self.resolver.resolve(&header.did).await?;
        debug!(did = %header.did, "DID document resolved");

        let verification = self.suite.verify(header, &document, domain);
        if !verification.valid {
            return Err(AuthError::InvalidSignature(verification.message));
        }

        let issued = self.issuer.issue(
            &header.did,
            Some(header.verification_method.as_str()),
            self.token_ttl_minutes,
        )?;

        Ok(AuthenticatedIdentity {
            did: header.did.clone(),
            key_id: Some(header.verification_method.clone()),
            access_token: Some(issued.token),
        })
    }

    fn verify_bearer(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError> {
        debug!(stage = %AuthStage::BearerVerifying);
        self.verifier
            .verify(token)
            .map(AuthenticatedIdentity::from_claims)
    }
}

fn reject(error: &AuthError, header: Option<&AuthorizationHeader>) {
    let did = match header {
        Some(AuthorizationHeader::DidWba(signed)) => Some(signed.did.as_str()),
        _ => None,
    };
    warn!(
        stage = %AuthStage::Rejected,
        error_code = error.error_code(),
        did = did.unwrap_or("-"),
        reason = %error,
        "Authentication rejected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::auth::clock::{Clock, ManualClock};
    use crate::auth::document::DidDocument;
    use crate::auth::resolver::ResolveError;
    use crate::auth::signature::{Secp256k1Suite, SigningRequest, SignatureError, Verification};
    use crate::auth::testutil::{
        dispatcher_with, document_for, rfc3339, signed_header, MemoryStore,
    };

    const DID: &str = "did:method:example.com:user:abc";
    const DOMAIN: &str = "example.com";

    struct Harness {
        clock: Arc<ManualClock>,
        dispatcher: AuthDispatcher,
    }

    fn harness_with(
        suite: Arc<dyn SignatureSuite>,
        remote: Result<Option<DidDocument>, ResolveError>,
    ) -> Harness {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::with([document_for(DID)]));
        let dispatcher = dispatcher_with(store, remote, suite, clock.clone());
        Harness { clock, dispatcher }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(Secp256k1Suite), Ok(None))
    }

    fn didwba(header: SignedAuthHeader) -> AuthorizationHeader {
        AuthorizationHeader::DidWba(header)
    }

    #[tokio::test]
    async fn valid_signed_header_is_authenticated_with_token() {
        let h = harness();
        let header = signed_header(&document_for(DID), DOMAIN, "nonce-a", h.clock.now());

        let identity = h.dispatcher.authenticate(&didwba(header), DOMAIN).await.unwrap();

        assert_eq!(identity.did, DID);
        assert_eq!(identity.key_id.as_deref(), Some("key-1"));
        let token = identity.access_token.expect("token issued");

        let bearer = h
            .dispatcher
            .authenticate(&AuthorizationHeader::Bearer(token), DOMAIN)
            .await
            .unwrap();
        assert_eq!(bearer.did, DID);
        assert_eq!(bearer.key_id.as_deref(), Some("key-1"));
        assert!(!bearer.token_issued());
    }

    #[tokio::test]
    async fn raw_header_round_trips_through_parser() {
        let h = harness();
        let header = signed_header(&document_for(DID), DOMAIN, "nonce-raw", h.clock.now());

        let identity = h
            .dispatcher
            .authenticate_raw(&header.to_string(), DOMAIN)
            .await
            .unwrap();
        assert_eq!(identity.did, DID);
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected_despite_valid_signature() {
        let h = harness();
        let stale = h.clock.now() - Duration::minutes(10);
        let header = signed_header(&document_for(DID), DOMAIN, "nonce-b", stale);

        let result = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(result, Err(AuthError::TimestampExpired)));
        // Freshness is checked before the nonce is recorded.
        assert!(h.dispatcher.nonces().is_empty());
    }

    #[tokio::test]
    async fn replayed_nonce_is_rejected() {
        let h = harness();
        let header = signed_header(&document_for(DID), DOMAIN, "nonce-c", h.clock.now());

        assert!(h
            .dispatcher
            .authenticate(&didwba(header.clone()), DOMAIN)
            .await
            .is_ok());
        let replay = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(replay, Err(AuthError::NonceReused)));
    }

    #[tokio::test]
    async fn future_dated_header_cannot_be_replayed_after_window() {
        let h = harness();
        let ahead = h.clock.now() + Duration::minutes(4);
        let header = signed_header(&document_for(DID), DOMAIN, "nonce-ahead", ahead);

        assert!(h
            .dispatcher
            .authenticate(&didwba(header.clone()), DOMAIN)
            .await
            .is_ok());

        // Past the nonce window, but the timestamp is still within tolerance.
        h.clock.advance(Duration::minutes(7));
        let replay = h.dispatcher.authenticate(&didwba(header.clone()), DOMAIN).await;
        assert!(matches!(replay, Err(AuthError::NonceReused)));

        h.clock.advance(Duration::minutes(3));
        let late = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(late, Err(AuthError::TimestampExpired)));
    }

    #[tokio::test]
    async fn header_for_other_domain_is_rejected() {
        let h = harness();
        let header = signed_header(&document_for(DID), "other.example", "nonce-d", h.clock.now());

        let result = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let h = harness();
        let mut header = signed_header(&document_for(DID), DOMAIN, "nonce-e", h.clock.now());
        header.timestamp = rfc3339(h.clock.now() + Duration::seconds(1));

        let result = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn unresolvable_did_is_rejected() {
        let h = harness();
        let other = "did:method:example.com:user:nobody";
        let header = signed_header(&document_for(other), DOMAIN, "nonce-f", h.clock.now());

        let result = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(result, Err(AuthError::ResolutionFailed(_))));
    }

    #[tokio::test]
    async fn remote_transport_failure_is_reported() {
        let h = harness_with(
            Arc::new(Secp256k1Suite),
            Err(ResolveError::Transport("connection refused".into())),
        );
        let other = "did:method:example.com:user:remote";
        let header = signed_header(&document_for(other), DOMAIN, "nonce-g", h.clock.now());

        let result = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(result, Err(AuthError::TransportError(_))));
    }

    #[tokio::test]
    async fn malformed_identifier_is_rejected() {
        let h = harness();
        let mut header = signed_header(&document_for(DID), DOMAIN, "nonce-h", h.clock.now());
        header.did = "did:method:example.com".to_string();

        let result = h.dispatcher.authenticate(&didwba(header), DOMAIN).await;
        assert!(matches!(result, Err(AuthError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn expired_bearer_token_is_rejected() {
        let h = harness();
        let header = signed_header(&document_for(DID), DOMAIN, "nonce-i", h.clock.now());
        let token = h
            .dispatcher
            .authenticate(&didwba(header), DOMAIN)
            .await
            .unwrap()
            .access_token
            .unwrap();

        h.clock.advance(Duration::minutes(61));
        let result = h
            .dispatcher
            .authenticate(&AuthorizationHeader::Bearer(token), DOMAIN)
            .await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn garbage_bearer_token_is_rejected() {
        let h = harness();
        let result = h
            .dispatcher
            .authenticate_raw("Bearer definitely-not-a-jwt", DOMAIN)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn unknown_scheme_is_invalid_header() {
        let h = harness();
        let result = h.dispatcher.authenticate_raw("Basic dXNlcjpwYXNz", DOMAIN).await;
        assert!(matches!(result, Err(AuthError::InvalidHeader(_))));
    }

    /// Suite double that accepts everything, to show the dispatcher defers
    /// entirely to the injected capability.
    struct AcceptAll;

    impl SignatureSuite for AcceptAll {
        fn sign(&self, _: &SigningRequest<'_>) -> Result<SignedAuthHeader, SignatureError> {
            Err(SignatureError::Encoding("not used".into()))
        }

        fn verify(&self, _: &SignedAuthHeader, _: &DidDocument, _: &str) -> Verification {
            Verification {
                valid: true,
                message: "accepted".into(),
            }
        }
    }

    #[tokio::test]
    async fn signature_backend_is_injectable() {
        let h = harness_with(Arc::new(AcceptAll), Ok(None));
        let header = SignedAuthHeader::new(
            DID,
            "nonce-j",
            &rfc3339(h.clock.now()),
            "key-1",
            "unchecked",
        );

        let identity = h.dispatcher.authenticate(&didwba(header), DOMAIN).await.unwrap();
        assert_eq!(identity.did, DID);
    }
}
