// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::resolver::{DocumentFetcher, DocumentStore};
use crate::auth::token::TokenKeys;
use crate::auth::{
    clock::system_clock, AuthDispatcher, AuthError, DocumentResolver, FsDocumentStore,
    HttpDocumentFetcher, NonceValidator, Secp256k1Suite,
};
use crate::config::{Config, DEFAULT_AGENT_DESCRIPTION};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<AuthDispatcher>,
    /// Local identity documents, also served at `/wba/user/{id}/did.json`
    pub documents: Arc<dyn DocumentStore>,
    pub agent_description: Arc<str>,
}

impl AppState {
    pub fn new(dispatcher: AuthDispatcher, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            documents,
            agent_description: Arc::from(DEFAULT_AGENT_DESCRIPTION),
        }
    }

    pub fn with_agent_description(mut self, description: impl Into<String>) -> Self {
        self.agent_description = Arc::from(description.into());
        self
    }

    /// Wire the production components described by `config`.
    ///
    /// Fails only when the token keys cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let clock = system_clock();

        let keys = TokenKeys::load(
            &config.jwt_private_key_path,
            &config.jwt_public_key_path,
            config.jwt_algorithm,
        )?;

        let nonces = Arc::new(NonceValidator::new(
            chrono::Duration::minutes(config.nonce_expiration_minutes),
            config.nonce_cache_capacity,
            clock.clone(),
        ));

        let documents: Arc<dyn DocumentStore> =
            Arc::new(FsDocumentStore::new(&config.did_documents_path));
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(
            HttpDocumentFetcher::new(config.http_timeout)
                .map_err(|e| AuthError::Internal(e.to_string()))?,
        );
        let resolver = DocumentResolver::new(documents.clone(), fetcher)
            .with_scheme(config.did_resolve_scheme.clone());

        let dispatcher = AuthDispatcher::new(
            nonces,
            resolver,
            Arc::new(Secp256k1Suite),
            keys.into_pair(clock),
        )
        .with_token_ttl(config.access_token_expire_minutes)
        .with_timestamp_tolerance(config.timestamp_expiration_minutes);

        Ok(Self::new(dispatcher, documents).with_agent_description(config.agent_description.clone()))
    }
}
