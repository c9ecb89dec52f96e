// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for auth tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use super::clock::{ManualClock, SharedClock};
use super::dispatcher::AuthDispatcher;
use super::document::DidDocument;
use super::header::SignedAuthHeader;
use super::nonce::NonceValidator;
use super::resolver::{DidIdentifier, DocumentFetcher, DocumentResolver, DocumentStore, ResolveError};
use super::signature::{Secp256k1Suite, SignatureSuite, SigningRequest};
use super::token::{TokenIssuer, TokenKeys, TokenVerifier};

pub const FIXTURE_DID: &str = "did:wba:localhost%3A8000:wba:user:abc";
pub const FIXTURE_DOCUMENT_JSON: &str = include_str!("../../testdata/did/user_abc/did.json");
pub const FIXTURE_KEY_PEM: &str = include_str!("../../testdata/did/user_abc/key-1_private.pem");

pub const JWT_PRIVATE_PEM: &str = include_str!("../../testdata/jwt/private_key.pem");
pub const JWT_PUBLIC_PEM: &str = include_str!("../../testdata/jwt/public_key.pem");
pub const JWT_OTHER_PRIVATE_PEM: &str = include_str!("../../testdata/jwt/other_private_key.pem");

/// The fixture document for `user_abc`.
pub fn fixture_document() -> DidDocument {
    serde_json::from_str(FIXTURE_DOCUMENT_JSON).expect("fixture DID document")
}

/// The fixture key material published under another DID.
pub fn document_for(did: &str) -> DidDocument {
    let mut doc = fixture_document();
    doc.id = did.to_string();
    for method in &mut doc.verification_method {
        let fragment = method.id.rsplit('#').next().unwrap_or("key-1").to_string();
        method.id = format!("{did}#{fragment}");
        method.controller = Some(did.to_string());
    }
    doc
}

pub fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sign a header with the fixture key for `doc`.
pub fn signed_header(
    doc: &DidDocument,
    domain: &str,
    nonce: &str,
    timestamp: DateTime<Utc>,
) -> SignedAuthHeader {
    let timestamp = rfc3339(timestamp);
    Secp256k1Suite
        .sign(&SigningRequest {
            document: doc,
            private_key_pem: FIXTURE_KEY_PEM,
            method_fragment: "key-1",
            service_domain: domain,
            nonce,
            timestamp: &timestamp,
        })
        .expect("fixture signing")
}

/// Token issuer/verifier pair over the RSA fixtures, driven by `clock`.
pub fn token_pair(clock: Arc<ManualClock>) -> (TokenIssuer, TokenVerifier) {
    TokenKeys::from_pem(
        JWT_PRIVATE_PEM.as_bytes(),
        JWT_PUBLIC_PEM.as_bytes(),
        jsonwebtoken::Algorithm::RS256,
    )
    .expect("fixture JWT keys")
    .into_pair(clock)
}

/// In-memory document store keyed by subject id.
#[derive(Default)]
pub struct MemoryStore(pub HashMap<String, DidDocument>);

impl MemoryStore {
    pub fn with(documents: impl IntoIterator<Item = DidDocument>) -> Self {
        Self(
            documents
                .into_iter()
                .map(|doc| {
                    let subject = DidIdentifier::parse(&doc.id)
                        .expect("fixture DID")
                        .subject_id()
                        .to_string();
                    (subject, doc)
                })
                .collect(),
        )
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, subject_id: &str) -> Result<Option<DidDocument>, ResolveError> {
        Ok(self.0.get(subject_id).cloned())
    }
}

/// Fetcher that always answers with the same result.
pub struct FixedFetcher(pub Result<Option<DidDocument>, ResolveError>);

#[async_trait]
impl DocumentFetcher for FixedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Option<DidDocument>, ResolveError> {
        self.0.clone()
    }
}

/// Dispatcher over in-memory documents with no remote host, the default
/// secp256k1 suite and a five minute timestamp tolerance.
pub fn dispatcher_for(documents: Vec<DidDocument>, clock: Arc<ManualClock>) -> AuthDispatcher {
    dispatcher_with(
        Arc::new(MemoryStore::with(documents)),
        Ok(None),
        Arc::new(Secp256k1Suite),
        clock,
    )
}

pub fn dispatcher_with(
    store: Arc<dyn DocumentStore>,
    remote: Result<Option<DidDocument>, ResolveError>,
    suite: Arc<dyn SignatureSuite>,
    clock: Arc<ManualClock>,
) -> AuthDispatcher {
    let shared: SharedClock = clock.clone();
    let nonces = Arc::new(NonceValidator::new(chrono::Duration::minutes(6), 1000, shared));
    let resolver = DocumentResolver::new(store, Arc::new(FixedFetcher(remote)));
    AuthDispatcher::new(nonces, resolver, suite, token_pair(clock)).with_timestamp_tolerance(5)
}
