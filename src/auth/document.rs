// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DID document representation.
//!
//! Only the parts the protocol reads are typed; everything else in the JSON
//! is preserved in `extra` so a served document round-trips unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A published DID document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// The DID this document describes
    pub id: String,

    #[serde(default, rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceEndpoint>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A key entry in `verificationMethod`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Full key reference, `<did>#<fragment>`
    pub id: String,

    #[serde(rename = "type")]
    pub method_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    #[serde(default, rename = "publicKeyJwk", skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<PublicKeyJwk>,
}

/// EC public key in JWK form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// An entry in `service`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    /// A URL string, or a map/list of them
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: serde_json::Value,
}

impl DidDocument {
    /// Find the verification method a header's key reference points to.
    ///
    /// Accepts either a bare fragment (`key-1`, `#key-1`) or a full reference
    /// (`did:...#key-1`). A full reference must name this document's DID.
    pub fn find_verification_method(&self, key_reference: &str) -> Option<&VerificationMethod> {
        let full = match key_reference.split_once('#') {
            Some(("", fragment)) => format!("{}#{fragment}", self.id),
            Some(_) => key_reference.to_string(),
            None => format!("{}#{key_reference}", self.id),
        };
        self.verification_method.iter().find(|m| m.id == full)
    }
}
