// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client request signer.
//!
//! Chooses between a cached bearer token and a fresh DIDWba signature for
//! each request, caches tokens returned by the server per origin, and applies
//! a [`RetryPolicy`] when the server answers `401`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::identity::{self, DEFAULT_METHOD_FRAGMENT};
use super::token_cache::{origin_of, TokenCache};
use super::transport::{
    HttpMethod, HttpTransport, ReqwestTransport, TransportRequest, TransportResponse,
};
use super::ClientError;
use crate::auth::clock::{system_clock, SharedClock};
use crate::auth::document::DidDocument;
use crate::auth::header::BEARER_SCHEME;
use crate::auth::signature::{Secp256k1Suite, SignatureSuite, SigningRequest};

/// Status that triggers a retry with a fresh signature.
const UNAUTHORIZED: u16 = 401;

/// How many times a rejected request is re-sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0 }
    }

    /// Whether a response with `status`, after `retries_so_far` retries,
    /// should be re-sent. Only `401` qualifies.
    pub fn should_retry(&self, status: u16, retries_so_far: u32) -> bool {
        status == UNAUTHORIZED && retries_so_far < self.max_retries
    }
}

/// Result of [`ClientRequestSigner::send_authenticated`].
///
/// Transport failures and unsupported verbs surface here as synthetic
/// statuses (`500`, `400`) with an `{"error": ...}` body rather than as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedResponse {
    pub status: u16,
    pub body: Value,
    /// Token the server returned on this response, if any
    pub token: Option<String>,
}

impl SignedResponse {
    fn synthetic(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
            token: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Signs outgoing requests as one DID.
pub struct ClientRequestSigner {
    document: DidDocument,
    private_key_pem: String,
    method_fragment: String,
    suite: Arc<dyn SignatureSuite>,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenCache,
    retry: RetryPolicy,
    clock: SharedClock,
}

impl ClientRequestSigner {
    pub fn new(
        document: DidDocument,
        private_key_pem: impl Into<String>,
        suite: Arc<dyn SignatureSuite>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let clock = system_clock();
        Self {
            document,
            private_key_pem: private_key_pem.into(),
            method_fragment: DEFAULT_METHOD_FRAGMENT.to_string(),
            suite,
            transport,
            tokens: TokenCache::new(clock.clone()),
            retry: RetryPolicy::default(),
            clock,
        }
    }

    /// Signer for a DID document and PEM key on disk, using the secp256k1
    /// suite over `reqwest`.
    pub fn from_files(
        document_path: &Path,
        private_key_path: &Path,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let identity = identity::load(document_path, private_key_path)?;
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::new(
            identity.document,
            identity.private_key_pem,
            Arc::new(Secp256k1Suite),
            Arc::new(transport),
        ))
    }

    pub fn with_method_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.method_fragment = fragment.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the clock used for timestamps and token expiry.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.tokens = TokenCache::new(clock.clone());
        self.clock = clock;
        self
    }

    pub fn did(&self) -> &str {
        &self.document.id
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// `Authorization` value for a request to `url`: the cached bearer token
    /// for its origin, or a freshly signed DIDWba header when there is none
    /// or `force_new` is set.
    pub fn build_header(&self, url: &str, force_new: bool) -> Result<String, ClientError> {
        let origin = origin_of(url)?;
        if !force_new {
            if let Some(token) = self.tokens.get(&origin) {
                debug!(origin = %origin, "Using cached bearer token");
                return Ok(format!("{BEARER_SCHEME} {token}"));
            }
        }

        let domain = service_domain(url)?;
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let header = self.suite.sign(&SigningRequest {
            document: &self.document,
            private_key_pem: &self.private_key_pem,
            method_fragment: &self.method_fragment,
            service_domain: &domain,
            nonce: &nonce,
            timestamp: &timestamp,
        })?;
        debug!(origin = %origin, did = %self.document.id, "Built DIDWba header");
        Ok(header.to_string())
    }

    /// Take a token out of `response` and cache it for `url`'s origin.
    ///
    /// Looks at, in order: body `access_token`, body `Authorization`, then the
    /// `authorization` response header.
    pub fn cache_token(&self, url: &str, response: &TransportResponse) -> Option<String> {
        let token = extract_token(response)?;
        let origin = origin_of(url).ok()?;
        self.tokens.insert(&origin, token.clone());
        debug!(origin = %origin, "Cached bearer token");
        Some(token)
    }

    /// Forget the token for `url`'s origin.
    pub fn clear_token(&self, url: &str) {
        if let Ok(origin) = origin_of(url) {
            if self.tokens.remove(&origin) {
                debug!(origin = %origin, "Cleared cached token");
            }
        }
    }

    /// Send one authenticated request, retrying per the [`RetryPolicy`] with
    /// a fresh signature if the server answers `401`.
    pub async fn send_authenticated(
        &self,
        url: &str,
        method: &str,
        body: Option<Value>,
    ) -> SignedResponse {
        let Some(method) = HttpMethod::parse(method) else {
            warn!(method, "Unsupported HTTP method");
            return SignedResponse::synthetic(400, "Unsupported HTTP method");
        };

        let mut retries = 0;
        loop {
            let authorization = match self.build_header(url, retries > 0) {
                Ok(value) => value,
                Err(e) => {
                    warn!(url, error = %e, "Failed to build authorization header");
                    return SignedResponse::synthetic(500, e.to_string());
                }
            };

            info!(url, method = method.as_str(), attempt = retries + 1, "Sending authenticated request");
            let response = match self
                .transport
                .send(TransportRequest {
                    method,
                    url: url.to_string(),
                    authorization,
                    body: body.clone(),
                })
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(url, error = %e, "Authenticated request failed");
                    return SignedResponse::synthetic(500, e.to_string());
                }
            };

            if response.status == UNAUTHORIZED {
                self.clear_token(url);
            }
            if self.retry.should_retry(response.status, retries) {
                warn!(url, "Request rejected, retrying with a fresh signature");
                retries += 1;
                continue;
            }

            let token = if (200..300).contains(&response.status) {
                self.cache_token(url, &response)
            } else {
                None
            };
            return SignedResponse {
                status: response.status,
                body: response.body,
                token,
            };
        }
    }
}

/// Host of `url` as the server will see it, without port or IPv6 brackets.
fn service_domain(url: &str) -> Result<String, ClientError> {
    let parsed = Url::parse(url).map_err(|e| ClientError::InvalidUrl(url.to_string(), e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ClientError::InvalidUrl(url.to_string(), "no host".into()))?;
    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

fn strip_bearer(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.is_empty()).then(|| token.to_string())
}

fn extract_token(response: &TransportResponse) -> Option<String> {
    if let Some(token) = response.body.get("access_token").and_then(Value::as_str) {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    if let Some(token) = response
        .body
        .get("Authorization")
        .and_then(Value::as_str)
        .and_then(strip_bearer)
    {
        return Some(token);
    }
    response
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer)
}
