// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `Authorization` header decoding.
//!
//! Two variants exist and are decoded up front into [`AuthorizationHeader`]:
//!
//! ```text
//! Bearer <token>
//! DIDWba did="...", nonce="...", timestamp="...", verification_method="...", signature="..."
//! ```

use std::fmt;

use super::error::AuthError;

/// Scheme word of the identity-signed variant.
pub const DID_WBA_SCHEME: &str = "DIDWba";

/// Scheme word of the bearer variant.
pub const BEARER_SCHEME: &str = "Bearer";

/// A decoded `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationHeader {
    /// Previously issued session token.
    Bearer(String),
    /// Per-request DID signature.
    DidWba(SignedAuthHeader),
}

impl AuthorizationHeader {
    /// Decode a raw header value.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        let (scheme, rest) = raw
            .split_once(char::is_whitespace)
            .ok_or_else(|| AuthError::InvalidHeader("missing credentials".into()))?;

        if scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            let token = rest.trim();
            if token.is_empty() {
                return Err(AuthError::InvalidHeader("empty bearer token".into()));
            }
            return Ok(Self::Bearer(token.to_string()));
        }

        if scheme.eq_ignore_ascii_case(DID_WBA_SCHEME) {
            return SignedAuthHeader::parse_params(raw, rest).map(Self::DidWba);
        }

        Err(AuthError::InvalidHeader(format!(
            "unsupported scheme '{scheme}'"
        )))
    }

    /// Short label for logs.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Bearer(_) => BEARER_SCHEME,
            Self::DidWba(_) => DID_WBA_SCHEME,
        }
    }
}

/// Parsed DIDWba header. `raw` keeps the exact header value that was signed
/// over, so verification sees what the client sent.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAuthHeader {
    pub raw: String,
    pub did: String,
    pub nonce: String,
    pub timestamp: String,
    pub verification_method: String,
    pub signature: String,
}

impl SignedAuthHeader {
    /// Assemble a header from its parts and render the raw value.
    pub fn new(
        did: impl Into<String>,
        nonce: impl Into<String>,
        timestamp: impl Into<String>,
        verification_method: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        let mut header = Self {
            raw: String::new(),
            did: did.into(),
            nonce: nonce.into(),
            timestamp: timestamp.into(),
            verification_method: verification_method.into(),
            signature: signature.into(),
        };
        header.raw = header.render();
        header
    }

    fn render(&self) -> String {
        format!(
            r#"{DID_WBA_SCHEME} did="{}", nonce="{}", timestamp="{}", verification_method="{}", signature="{}""#,
            self.did, self.nonce, self.timestamp, self.verification_method, self.signature
        )
    }

    fn parse_params(raw: &str, params: &str) -> Result<Self, AuthError> {
        let mut did = None;
        let mut nonce = None;
        let mut timestamp = None;
        let mut verification_method = None;
        let mut signature = None;

        for part in params.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| AuthError::InvalidHeader(format!("malformed parameter '{part}'")))?;
            let value = value
                .trim()
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| {
                    AuthError::InvalidHeader(format!("unquoted value for '{}'", key.trim()))
                })?
                .to_string();

            match key.trim() {
                "did" => did = Some(value),
                "nonce" => nonce = Some(value),
                "timestamp" => timestamp = Some(value),
                "verification_method" => verification_method = Some(value),
                "signature" => signature = Some(value),
                _ => {}
            }
        }

        fn required(field: Option<String>, name: &str) -> Result<String, AuthError> {
            field
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuthError::InvalidHeader(format!("missing '{name}'")))
        }

        Ok(Self {
            raw: raw.to_string(),
            did: required(did, "did")?,
            nonce: required(nonce, "nonce")?,
            timestamp: required(timestamp, "timestamp")?,
            verification_method: required(verification_method, "verification_method")?,
            signature: required(signature, "signature")?,
        })
    }
}

impl fmt::Display for SignedAuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// Signatures stay out of logs.
impl fmt::Debug for SignedAuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAuthHeader")
            .field("did", &self.did)
            .field("nonce", &self.nonce)
            .field("timestamp", &self.timestamp)
            .field("verification_method", &self.verification_method)
            .finish_non_exhaustive()
    }
}
