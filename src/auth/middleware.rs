// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gateway middleware.
//!
//! Runs in front of every route:
//!
//! 1. Exempt paths pass through with no identity attached
//! 2. Everything else needs an `Authorization` header, handed to the
//!    [`AuthDispatcher`] together with the domain the request arrived on
//! 3. On success the [`AuthenticatedIdentity`] goes into the request
//!    extensions; a token issued on this request is echoed back in the
//!    `authorization` response header
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/wba/test", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(dispatcher, auth_gateway));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, HOST},
        HeaderMap, HeaderValue, Uri,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::dispatcher::AuthDispatcher;
use super::{AuthError, AuthenticatedIdentity};

/// A path that bypasses authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExemptPath {
    /// Only this exact path.
    Exact(&'static str),
    /// This path and anything below it (`/docs`, `/docs/...`).
    Prefix(&'static str),
}

impl ExemptPath {
    pub fn matches(&self, path: &str) -> bool {
        match *self {
            ExemptPath::Exact(exact) => path == exact,
            ExemptPath::Prefix(prefix) => match path.strip_prefix(prefix) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

/// Paths served without authentication.
pub const EXEMPT_PATHS: &[ExemptPath] = &[
    ExemptPath::Exact("/"),
    ExemptPath::Exact("/openapi.json"),
    ExemptPath::Exact("/agents/example/ad.json"),
    ExemptPath::Prefix("/docs"),
    ExemptPath::Prefix("/redoc"),
    ExemptPath::Prefix("/wba/user"),
];

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.iter().any(|exempt| exempt.matches(path))
}

/// Domain the request was received on, without its port.
///
/// Taken from the `Host` header, or from the URI authority when there is no
/// `Host` (HTTP/2 carries it in `:authority`).
pub fn request_domain(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or_default();
    host_without_port(host).to_string()
}

fn host_without_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. `[::1]:8000`
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, _)) = rest.split_once(']') {
            return addr;
        }
    }
    host.split(':').next().unwrap_or_default()
}

/// Gateway middleware. See the module docs for the flow.
pub async fn auth_gateway(
    State(dispatcher): State<Arc<AuthDispatcher>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_exempt(path) {
        debug!(path, "Exempt path, skipping authentication");
        return next.run(request).await;
    }

    let raw = match request.headers().get(AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(raw) => raw.to_string(),
            Err(_) => {
                return AuthError::InvalidHeader("header is not valid ASCII".into()).into_response()
            }
        },
        None => {
            warn!(path, "Request without authorization header");
            return AuthError::MissingAuthorization.into_response();
        }
    };

    let domain = request_domain(request.headers(), request.uri());
    let identity = match dispatcher.authenticate_raw(&raw, &domain).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    let issued = identity.access_token.clone();
    request.extensions_mut().insert::<AuthenticatedIdentity>(identity);

    let mut response = next.run(request).await;
    if let Some(token) = issued {
        match HeaderValue::from_str(&format!("bearer {token}")) {
            Ok(value) => {
                response.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Issued token is not a valid header value; not echoed"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    use crate::auth::clock::{Clock, ManualClock};
    use crate::auth::extractor::OptionalAuth;
    use crate::auth::testutil::{dispatcher_for, document_for, signed_header};

    const DID: &str = "did:wba:example.com:wba:user:abc";

    #[test]
    fn root_is_exempt_only_on_exact_match() {
        assert!(is_exempt("/"));
        assert!(!is_exempt("/wba/test"));
        assert!(!is_exempt("/auth/did-wba"));
    }

    #[test]
    fn prefix_exemption_respects_segment_boundary() {
        assert!(is_exempt("/docs"));
        assert!(is_exempt("/docs/anything"));
        assert!(!is_exempt("/documentation"));
        assert!(is_exempt("/wba/user/abc/did.json"));
        assert!(!is_exempt("/wba/username"));
    }

    #[test]
    fn exact_entries_do_not_match_children() {
        assert!(is_exempt("/openapi.json"));
        assert!(!is_exempt("/openapi.json/x"));
        assert!(is_exempt("/agents/example/ad.json"));
        assert!(!is_exempt("/agents/example"));
    }

    #[test]
    fn domain_drops_port() {
        let uri = Uri::from_static("/wba/test");
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost:8000"));
        assert_eq!(request_domain(&headers, &uri), "localhost");

        headers.insert(HOST, HeaderValue::from_static("[::1]:8000"));
        assert_eq!(request_domain(&headers, &uri), "::1");

        headers.insert(HOST, HeaderValue::from_static("example.com"));
        assert_eq!(request_domain(&headers, &uri), "example.com");

        assert_eq!(request_domain(&HeaderMap::new(), &uri), "");
    }

    #[test]
    fn domain_falls_back_to_uri_authority() {
        let uri = Uri::from_static("http://agent.example.com:8000/wba/test");
        assert_eq!(request_domain(&HeaderMap::new(), &uri), "agent.example.com");

        let uri = Uri::from_static("https://[::1]:8443/wba/test");
        assert_eq!(request_domain(&HeaderMap::new(), &uri), "::1");

        // Host wins when both are present.
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("example.com"));
        let uri = Uri::from_static("http://other.example:8000/wba/test");
        assert_eq!(request_domain(&headers, &uri), "example.com");
    }

    async fn whoami(OptionalAuth(identity): OptionalAuth) -> String {
        identity
            .map(|id| id.did)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(clock: Arc<ManualClock>) -> Router {
        let dispatcher = Arc::new(dispatcher_for(vec![document_for(DID)], clock));
        Router::new()
            .route("/", get(whoami))
            .route("/docs/page", get(whoami))
            .route("/documentation", get(whoami))
            .route("/wba/test", get(whoami))
            .layer(axum::middleware::from_fn_with_state(dispatcher, auth_gateway))
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_request(path: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri(path)
            .header(HOST, "example.com:8000")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn exempt_paths_pass_without_identity() {
        let app = app(Arc::new(ManualClock::starting_now()));

        let response = app.clone().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");

        let response = app.oneshot(get_request("/docs/page")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sibling_of_prefix_requires_auth() {
        let app = app(Arc::new(ManualClock::starting_now()));
        let response = app.oneshot(get_request("/documentation")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_header_is_rejected_with_code() {
        let app = app(Arc::new(ManualClock::starting_now()));
        let response = app.oneshot(get_request("/wba/test")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error_code"], "missing_authorization");
    }

    #[tokio::test]
    async fn signed_request_attaches_identity_and_echoes_token() {
        let clock = Arc::new(ManualClock::starting_now());
        let app = app(clock.clone());
        let header = signed_header(&document_for(DID), "example.com", "gw-1", clock.now());

        let mut request = get_request("/wba/test");
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&header.to_string()).unwrap());
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let echoed = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .expect("token echoed");
        assert!(echoed.starts_with("bearer "));
        assert_eq!(body_string(response).await, DID);

        // The echoed token authenticates the next request on its own.
        let token = echoed.trim_start_matches("bearer ");
        let mut request = get_request("/wba/test");
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(AUTHORIZATION).is_none());
        assert_eq!(body_string(response).await, DID);
    }

    #[tokio::test]
    async fn signature_for_other_host_is_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let app = app(clock.clone());
        let header = signed_header(&document_for(DID), "evil.example", "gw-2", clock.now());

        let mut request = get_request("/wba/test");
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&header.to_string()).unwrap());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error_code"], "invalid_signature");
    }
}
