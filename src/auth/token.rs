// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token issuing and verification.
//!
//! Tokens are JWTs signed with an asymmetric key loaded once at start-up.
//! Signature and algorithm are checked by `jsonwebtoken`; expiry is checked
//! here against the injected [`Clock`](super::clock::Clock) and must be
//! strictly in the future.

use std::fs;
use std::path::Path;

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::clock::SharedClock;
use super::error::AuthError;

/// Default token lifetime in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Authenticated DID
    pub sub: String,

    /// Verification method the DID authenticated with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyid: Option<String>,

    /// Issued at (unix seconds)
    #[serde(default)]
    pub iat: i64,

    /// Expiry (unix seconds)
    pub exp: i64,
}

/// A freshly signed token and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Reject symmetric algorithms: tokens must be verifiable without the signing key.
pub fn ensure_asymmetric(algorithm: Algorithm) -> Result<(), String> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(format!(
            "{algorithm:?} is symmetric; an asymmetric algorithm is required"
        )),
        _ => Ok(()),
    }
}

/// Signing and verification keys for session tokens.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl TokenKeys {
    /// Load PEM keys from disk. Any failure is fatal for the caller.
    pub fn load(
        private_key_path: &Path,
        public_key_path: &Path,
        algorithm: Algorithm,
    ) -> Result<Self, AuthError> {
        let read = |path: &Path, what: &str| {
            fs::read(path).map_err(|e| {
                AuthError::KeyMaterialMissing(format!(
                    "{what} key not readable at {}: {e}",
                    path.display()
                ))
            })
        };
        let private_pem = read(private_key_path, "private")?;
        let public_pem = read(public_key_path, "public")?;

        let keys = Self::from_pem(&private_pem, &public_pem, algorithm)?;
        info!(
            private_key = %private_key_path.display(),
            public_key = %public_key_path.display(),
            algorithm = ?algorithm,
            "Loaded token signing keys"
        );
        Ok(keys)
    }

    /// Build keys from PEM bytes.
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        algorithm: Algorithm,
    ) -> Result<Self, AuthError> {
        ensure_asymmetric(algorithm).map_err(AuthError::KeyMaterialMissing)?;

        let bad = |what: &str, e: jsonwebtoken::errors::Error| {
            AuthError::KeyMaterialMissing(format!("{what} key is not valid PEM for {algorithm:?}: {e}"))
        };

        let (encoding, decoding) = match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(private_pem).map_err(|e| bad("private", e))?,
                DecodingKey::from_ec_pem(public_pem).map_err(|e| bad("public", e))?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(private_pem).map_err(|e| bad("private", e))?,
                DecodingKey::from_ed_pem(public_pem).map_err(|e| bad("public", e))?,
            ),
            _ => (
                EncodingKey::from_rsa_pem(private_pem).map_err(|e| bad("private", e))?,
                DecodingKey::from_rsa_pem(public_pem).map_err(|e| bad("public", e))?,
            ),
        };

        Ok(Self {
            encoding,
            decoding,
            algorithm,
        })
    }

    /// Split into an issuer and a verifier sharing `clock`.
    pub fn into_pair(self, clock: SharedClock) -> (TokenIssuer, TokenVerifier) {
        (
            TokenIssuer {
                key: self.encoding,
                algorithm: self.algorithm,
                clock: clock.clone(),
            },
            TokenVerifier {
                key: self.decoding,
                algorithm: self.algorithm,
                clock,
            },
        )
    }
}

/// Issues signed session tokens.
pub struct TokenIssuer {
    key: EncodingKey,
    algorithm: Algorithm,
    clock: SharedClock,
}

impl TokenIssuer {
    /// Sign a token for `subject` that expires `ttl_minutes` from now.
    pub fn issue(
        &self,
        subject: &str,
        key_id: Option<&str>,
        ttl_minutes: i64,
    ) -> Result<IssuedToken, AuthError> {
        let now = self.clock.now();
        let claims = TokenClaims {
            sub: subject.to_string(),
            keyid: key_id.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))?;

        debug!(sub = %claims.sub, exp = claims.exp, "Issued session token");
        Ok(IssuedToken { token, claims })
    }
}

/// Verifies session tokens.
pub struct TokenVerifier {
    key: DecodingKey,
    algorithm: Algorithm,
    clock: SharedClock,
}

impl TokenVerifier {
    /// Verify signature, then expiry.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub"]);

        let claims = decode::<TokenClaims>(token, &self.key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}
