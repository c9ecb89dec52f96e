// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DIDWba signing and verification.
//!
//! [`SignatureSuite`] is the seam between protocol logic and cryptography:
//! one capability to produce a signed header, one to check it. The default
//! [`Secp256k1Suite`] signs the SHA-256 digest of the canonical JSON object
//!
//! ```text
//! {"did":"...","nonce":"...","service":"<domain>","timestamp":"..."}
//! ```
//!
//! with ECDSA over secp256k1, hashing exactly once (the digest is handed to
//! the prehash signer), and encodes the 64-byte `r || s` as unpadded
//! base64url. Binding `service` to the receiving domain keeps a header signed
//! for one host from being replayed against another.

use std::collections::BTreeMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};

use super::document::{DidDocument, PublicKeyJwk, VerificationMethod};
use super::header::SignedAuthHeader;

/// Verification method type handled by [`Secp256k1Suite`].
pub const SECP256K1_METHOD_TYPE: &str = "EcdsaSecp256k1VerificationKey2019";

/// Outcome of a signature check, with a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub message: String,
}

impl Verification {
    fn ok() -> Self {
        Self {
            valid: true,
            message: "Verification successful".to_string(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Errors while producing a signed header.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("verification method '{0}' not found in DID document")]
    MissingMethod(String),

    #[error("private key does not match verification method '{0}'")]
    KeyMismatch(String),

    #[error("payload encoding failed: {0}")]
    Encoding(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Everything needed to sign one request.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub document: &'a DidDocument,
    pub private_key_pem: &'a str,
    pub method_fragment: &'a str,
    pub service_domain: &'a str,
    pub nonce: &'a str,
    pub timestamp: &'a str,
}

/// Signing and verification capability for DIDWba headers.
pub trait SignatureSuite: Send + Sync {
    /// Produce a signed header for `request`.
    fn sign(&self, request: &SigningRequest<'_>) -> Result<SignedAuthHeader, SignatureError>;

    /// Check `header` against `document`, bound to `domain`.
    ///
    /// Must fail closed when the header's key reference is absent from the
    /// document.
    fn verify(&self, header: &SignedAuthHeader, document: &DidDocument, domain: &str)
        -> Verification;
}

/// ECDSA secp256k1 suite (`EcdsaSecp256k1VerificationKey2019`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Suite;

impl SignatureSuite for Secp256k1Suite {
    fn sign(&self, request: &SigningRequest<'_>) -> Result<SignedAuthHeader, SignatureError> {
        let signing_key = SigningKey::from_pkcs8_pem(request.private_key_pem)
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

        let method = request
            .document
            .find_verification_method(request.method_fragment)
            .ok_or_else(|| SignatureError::MissingMethod(request.method_fragment.to_string()))?;
        match verifying_key(method) {
            Ok(published) if published == *signing_key.verifying_key() => {}
            _ => return Err(SignatureError::KeyMismatch(request.method_fragment.to_string())),
        }

        let did = request.document.id.as_str();
        let digest = payload_digest(
            did,
            request.nonce,
            request.timestamp,
            request.service_domain,
        )
        .map_err(SignatureError::Encoding)?;
        let signature: Signature = signing_key
            .sign_prehash(&digest)
            .map_err(|e| SignatureError::Signing(e.to_string()))?;

        Ok(SignedAuthHeader::new(
            did,
            request.nonce,
            request.timestamp,
            request.method_fragment.trim_start_matches('#'),
            Base64UrlUnpadded::encode_string(&signature.to_bytes()),
        ))
    }

    fn verify(
        &self,
        header: &SignedAuthHeader,
        document: &DidDocument,
        domain: &str,
    ) -> Verification {
        if header.did != document.id {
            return Verification::fail("DID does not match DID document id");
        }

        let Some(method) = document.find_verification_method(&header.verification_method) else {
            return Verification::fail(format!(
                "Verification method '{}' not found in DID document",
                header.verification_method
            ));
        };

        let key = match verifying_key(method) {
            Ok(key) => key,
            Err(msg) => return Verification::fail(msg),
        };

        let signature = match Base64UrlUnpadded::decode_vec(&header.signature)
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok())
        {
            Some(sig) => sig,
            None => return Verification::fail("Signature is not a valid secp256k1 signature"),
        };

        let digest = match payload_digest(&header.did, &header.nonce, &header.timestamp, domain) {
            Ok(digest) => digest,
            Err(msg) => return Verification::fail(msg),
        };

        match key.verify_prehash(&digest, &signature) {
            Ok(()) => Verification::ok(),
            Err(_) => Verification::fail("Signature verification failed"),
        }
    }
}

/// Key-sorted compact JSON of the signed fields.
fn canonical_payload(
    did: &str,
    nonce: &str,
    timestamp: &str,
    service: &str,
) -> Result<String, String> {
    let payload: BTreeMap<&str, &str> = BTreeMap::from([
        ("did", did),
        ("nonce", nonce),
        ("service", service),
        ("timestamp", timestamp),
    ]);
    serde_json::to_string(&payload).map_err(|e| e.to_string())
}

/// SHA-256 of the canonical payload.
fn payload_digest(
    did: &str,
    nonce: &str,
    timestamp: &str,
    service: &str,
) -> Result<[u8; 32], String> {
    let canonical = canonical_payload(did, nonce, timestamp, service)?;
    Ok(Sha256::digest(canonical.as_bytes()).into())
}

/// Public key of a secp256k1 verification method.
fn verifying_key(method: &VerificationMethod) -> Result<VerifyingKey, String> {
    if method.method_type != SECP256K1_METHOD_TYPE {
        return Err(format!(
            "Unsupported verification method type '{}'",
            method.method_type
        ));
    }
    let jwk = method
        .public_key_jwk
        .as_ref()
        .ok_or("Verification method has no publicKeyJwk")?;
    if jwk.kty != "EC" || jwk.crv != "secp256k1" {
        return Err(format!("Unsupported key curve {}/{}", jwk.kty, jwk.crv));
    }

    let x = Base64UrlUnpadded::decode_vec(&jwk.x).map_err(|_| "Invalid JWK x coordinate")?;
    let y = Base64UrlUnpadded::decode_vec(&jwk.y).map_err(|_| "Invalid JWK y coordinate")?;
    if x.len() != 32 || y.len() != 32 {
        return Err("JWK coordinates must be 32 bytes".to_string());
    }

    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| "JWK is not a valid secp256k1 point".to_string())
}

/// JWK form of a secp256k1 public key.
pub fn public_key_jwk(key: &VerifyingKey, kid: Option<&str>) -> PublicKeyJwk {
    let point = key.to_encoded_point(false);
    let bytes = point.as_bytes();
    PublicKeyJwk {
        kty: "EC".to_string(),
        crv: "secp256k1".to_string(),
        x: Base64UrlUnpadded::encode_string(&bytes[1..33]),
        y: Base64UrlUnpadded::encode_string(&bytes[33..65]),
        kid: kid.map(str::to_string),
    }
}
