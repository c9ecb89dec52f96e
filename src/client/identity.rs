// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local DID identities for the client.
//!
//! An identity is a secp256k1 key plus the DID document publishing it, stored
//! in the same layout the server's document store reads:
//!
//! ```text
//! {root}/user_{id}/did.json
//! {root}/user_{id}/key-1_private.pem
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
use serde_json::json;
use tracing::info;

use super::ClientError;
use crate::auth::document::{DidDocument, ServiceEndpoint, VerificationMethod};
use crate::auth::resolver::FsDocumentStore;
use crate::auth::signature::{public_key_jwk, SECP256K1_METHOD_TYPE};

/// Fragment of the single key every generated identity carries.
pub const DEFAULT_METHOD_FRAGMENT: &str = "key-1";

/// A DID document and the private key for its `key-1` method.
#[derive(Clone)]
pub struct LocalIdentity {
    pub document: DidDocument,
    pub private_key_pem: String,
    pub dir: PathBuf,
}

impl LocalIdentity {
    pub fn did(&self) -> &str {
        &self.document.id
    }

    pub fn private_key_path(dir: &Path, fragment: &str) -> PathBuf {
        dir.join(format!("{fragment}_private.pem"))
    }
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("did", &self.document.id)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// `did:wba` identifier for a host, optional port and path.
pub fn did_for(host: &str, port: Option<u16>, path_segments: &[&str]) -> String {
    let authority = match port {
        Some(port) => format!("{host}%3A{port}"),
        None => host.to_string(),
    };
    let mut did = format!("did:wba:{authority}");
    for segment in path_segments {
        did.push(':');
        did.push_str(segment);
    }
    did
}

/// Build a DID document publishing `key` as `#key-1`.
pub fn create_document(
    did: &str,
    key: &VerifyingKey,
    agent_description_url: Option<&str>,
) -> DidDocument {
    let method_id = format!("{did}#{DEFAULT_METHOD_FRAGMENT}");

    let mut extra = HashMap::new();
    extra.insert(
        "@context".to_string(),
        json!([
            "https://www.w3.org/ns/did/v1",
            "https://w3id.org/security/suites/jws-2020/v1",
            "https://w3id.org/security/suites/secp256k1-2019/v1"
        ]),
    );
    extra.insert("authentication".to_string(), json!([method_id]));

    DidDocument {
        id: did.to_string(),
        verification_method: vec![VerificationMethod {
            id: method_id,
            method_type: SECP256K1_METHOD_TYPE.to_string(),
            controller: Some(did.to_string()),
            public_key_jwk: Some(public_key_jwk(key, Some(DEFAULT_METHOD_FRAGMENT))),
        }],
        service: agent_description_url
            .map(|url| ServiceEndpoint {
                id: format!("{did}#ad"),
                service_type: "AgentDescription".to_string(),
                service_endpoint: json!(url),
            })
            .into_iter()
            .collect(),
        extra,
    }
}

/// Load the identity for `unique_id` from `root`, creating and saving a new
/// one (bound to `host:port`) if none exists.
pub fn generate_or_load(
    root: &Path,
    unique_id: &str,
    host: &str,
    port: u16,
) -> Result<LocalIdentity, ClientError> {
    let store = FsDocumentStore::new(root);
    let dir = store.user_dir(unique_id);
    let document_path = store.document_path(unique_id);
    let key_path = LocalIdentity::private_key_path(&dir, DEFAULT_METHOD_FRAGMENT);

    if document_path.exists() {
        info!(path = %document_path.display(), "Loading existing DID document");
        return load(&document_path, &key_path);
    }

    let signing_key = SigningKey::random(&mut OsRng);
    let did = did_for(host, Some(port), &["wba", "user", unique_id]);
    let ad_url = format!("http://{host}:{port}/agents/example/ad.json");
    let document = create_document(&did, signing_key.verifying_key(), Some(&ad_url));

    let private_key_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.as_str().to_string())
        .map_err(|e| ClientError::InvalidKey(e.to_string()))?;
    let document_json = serde_json::to_string_pretty(&document)
        .map_err(|e| ClientError::InvalidDocument(e.to_string()))?;

    fs::create_dir_all(&dir).map_err(|e| ClientError::io(&dir, e))?;
    fs::write(&key_path, &private_key_pem).map_err(|e| ClientError::io(&key_path, e))?;
    fs::write(&document_path, document_json).map_err(|e| ClientError::io(&document_path, e))?;
    info!(did = %did, path = %document_path.display(), "Created new DID identity");

    Ok(LocalIdentity {
        document,
        private_key_pem,
        dir,
    })
}

/// Load an identity from a document file and a PEM key file.
pub fn load(document_path: &Path, private_key_path: &Path) -> Result<LocalIdentity, ClientError> {
    let raw = fs::read_to_string(document_path).map_err(|e| ClientError::io(document_path, e))?;
    let document: DidDocument =
        serde_json::from_str(&raw).map_err(|e| ClientError::InvalidDocument(e.to_string()))?;

    let private_key_pem =
        fs::read_to_string(private_key_path).map_err(|e| ClientError::io(private_key_path, e))?;
    SigningKey::from_pkcs8_pem(&private_key_pem)
        .map_err(|e| ClientError::InvalidKey(e.to_string()))?;

    Ok(LocalIdentity {
        document,
        private_key_pem,
        dir: document_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    })
}
