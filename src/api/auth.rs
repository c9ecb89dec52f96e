// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication endpoints.
//!
//! The gateway has already authenticated the request by the time these run;
//! the handlers only shape what it attached.

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::auth::{Auth, AuthError, OptionalAuth};

/// Response for POST /auth/did-wba
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    pub did: String,
}

/// Response for GET /auth/verify
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub verified: bool,
    pub did: String,
    pub message: String,
}

/// Exchange a DIDWba-signed request for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/did-wba",
    tag = "Authentication",
    security(("did_wba" = [])),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Header missing, malformed, stale, replayed or not verifiable"),
    )
)]
pub async fn did_wba_auth(Auth(identity): Auth) -> Result<Json<TokenResponse>, AuthError> {
    let access_token = identity.access_token.ok_or_else(|| {
        AuthError::InvalidHeader("token issuance requires the DIDWba scheme".to_string())
    })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        did: identity.did,
    }))
}

/// Check a bearer token.
#[utoipa::path(
    get,
    path = "/auth/verify",
    tag = "Authentication",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token missing, invalid or expired"),
    )
)]
pub async fn verify_token(Auth(identity): Auth) -> Result<Json<VerifyResponse>, AuthError> {
    // A token issued on this request means the caller signed instead.
    if identity.token_issued() {
        return Err(AuthError::InvalidHeader(
            "Invalid token format, must use Bearer scheme".to_string(),
        ));
    }

    Ok(Json(VerifyResponse {
        verified: true,
        did: identity.did,
        message: "Token verified successfully".to_string(),
    }))
}

/// Echo the identity attached to this request.
#[utoipa::path(
    get,
    path = "/wba/test",
    tag = "Authentication",
    security(("did_wba" = []), ("bearer" = [])),
    responses(
        (status = 200, description = "Authentication status"),
        (status = 401, description = "Unauthorized"),
    )
)]
pub async fn wba_test(OptionalAuth(identity): OptionalAuth) -> Json<Value> {
    let Some(identity) = identity else {
        return Json(json!({
            "status": "warning",
            "message": "No authentication provided, but access allowed",
        }));
    };

    let mut body = json!({
        "status": "success",
        "message": "Successfully authenticated",
        "did": identity.did,
        "authenticated": true,
    });
    if let Some(token) = identity.access_token.filter(|t| !t.is_empty()) {
        body["Authorization"] = Value::String(format!("bearer {token}"));
    }
    Json(body)
}
