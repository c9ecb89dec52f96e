// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated caller representation.

use serde::Serialize;
use utoipa::ToSchema;

use super::token::TokenClaims;

/// Identity attached to a request once the gateway has accepted it.
///
/// Lives in the request extensions for the duration of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthenticatedIdentity {
    /// Authenticated DID
    pub did: String,

    /// Verification method the caller signed with, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Session token issued while handling this request
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl AuthenticatedIdentity {
    /// Identity established from a verified bearer token.
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            did: claims.sub,
            key_id: claims.keyid,
            access_token: None,
        }
    }

    /// Whether a new token was issued for this request.
    pub fn token_issued(&self) -> bool {
        self.access_token.is_some()
    }
}
