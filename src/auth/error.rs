// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every per-request failure maps to `401 Unauthorized` with a JSON body
//! carrying a stable `error_code`. Internal faults map to a generic `500`
//! whose message never includes implementation detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::resolver::ResolveError;

/// Message returned for any internal fault.
const GENERIC_FAILURE: &str = "Internal server error";

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Missing authorization header")]
    MissingAuthorization,

    /// Header could not be parsed as `Bearer` or `DIDWba`
    #[error("Invalid authorization header format: {0}")]
    InvalidHeader(String),

    /// Request timestamp outside the accepted tolerance, or unparsable
    #[error("Timestamp expired or invalid")]
    TimestampExpired,

    /// Nonce already presented inside its validity window
    #[error("Nonce has already been used")]
    NonceReused,

    /// DID is not a well-formed identifier
    #[error("Invalid DID: {0}")]
    InvalidIdentifier(String),

    /// Neither the local store nor the remote host produced a document
    #[error("Failed to resolve DID document: {0}")]
    ResolutionFailed(String),

    /// The single remote resolution attempt failed at the transport level
    #[error("DID document fetch failed: {0}")]
    TransportError(String),

    /// Header signature did not verify against the resolved document
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Bearer token is malformed or its signature does not verify
    #[error("Invalid token")]
    InvalidToken,

    /// Bearer token expiry is not in the future
    #[error("Token has expired")]
    TokenExpired,

    /// Token signing/verification keys could not be loaded
    #[error("Token key material missing: {0}")]
    KeyMaterialMissing(String),

    /// Unexpected internal failure
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "missing_authorization",
            AuthError::InvalidHeader(_) => "invalid_header",
            AuthError::TimestampExpired => "timestamp_expired",
            AuthError::NonceReused => "nonce_reused",
            AuthError::InvalidIdentifier(_) => "invalid_identifier",
            AuthError::ResolutionFailed(_) => "resolution_failed",
            AuthError::TransportError(_) => "transport_error",
            AuthError::InvalidSignature(_) => "invalid_signature",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::KeyMaterialMissing(_) => "key_material_missing",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::KeyMaterialMissing(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show to the caller.
    fn public_message(&self) -> String {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<ResolveError> for AuthError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidIdentifier(msg) => AuthError::InvalidIdentifier(msg),
            ResolveError::NotFound(msg) => AuthError::ResolutionFailed(msg),
            ResolveError::Transport(msg) => AuthError::TransportError(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
