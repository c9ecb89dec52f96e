// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DID document resolution.
//!
//! ## Resolution order
//!
//! 1. Local document store, keyed by the DID's last path segment
//!    (`{root}/user_{subject_id}/did.json`)
//! 2. One remote GET to `{scheme}://{authority}/{path...}/did.json`
//!
//! There is no retry or backoff inside the resolver. A document whose `id`
//! does not match the requested DID is never returned.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::document::DidDocument;

/// File name of a stored DID document.
pub const DID_DOCUMENT_FILENAME: &str = "did.json";

/// Resolution failures. None of these are retried here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid DID: {0}")]
    InvalidIdentifier(String),

    #[error("DID document not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// A parsed `did:<method>:<authority>:<segment>...` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidIdentifier {
    pub method: String,
    /// Percent-decoded authority, e.g. `localhost:8000`
    pub authority: String,
    pub path_segments: Vec<String>,
}

impl DidIdentifier {
    /// Parse a DID. Requires the `did` scheme, a method, an authority and at
    /// least two path segments.
    pub fn parse(did: &str) -> Result<Self, ResolveError> {
        let invalid = |reason: &str| ResolveError::InvalidIdentifier(format!("{reason}: {did}"));

        let parts: Vec<&str> = did.split(':').collect();
        if parts.len() < 5 {
            return Err(invalid("too few segments"));
        }
        if parts[0] != "did" {
            return Err(invalid("not a DID"));
        }

        let method = parts[1];
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(invalid("bad method name"));
        }

        let authority = urlencoding::decode(parts[2])
            .map_err(|_| invalid("authority is not valid percent-encoding"))?
            .into_owned();
        if authority.is_empty()
            || authority
                .chars()
                .any(|c| matches!(c, '/' | '?' | '#' | '@' | '\\') || c.is_whitespace())
        {
            return Err(invalid("bad authority"));
        }

        let path_segments: Vec<String> = parts[3..].iter().map(|s| s.to_string()).collect();
        if path_segments
            .iter()
            .any(|s| s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\']))
        {
            return Err(invalid("bad path segment"));
        }

        Ok(Self {
            method: method.to_string(),
            authority,
            path_segments,
        })
    }

    /// Last path segment, used as the local subject id.
    pub fn subject_id(&self) -> &str {
        self.path_segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Remote location of the document.
    pub fn document_url(&self, scheme: &str) -> String {
        format!(
            "{scheme}://{}/{}/{DID_DOCUMENT_FILENAME}",
            self.authority,
            self.path_segments.join("/")
        )
    }
}

/// Local DID document lookup.
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` means "not stored here".
    fn load(&self, subject_id: &str) -> Result<Option<DidDocument>, ResolveError>;
}

/// Documents stored on disk as `{root}/user_{subject_id}/did.json`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one subject's document and keys.
    pub fn user_dir(&self, subject_id: &str) -> PathBuf {
        self.root.join(format!("user_{subject_id}"))
    }

    pub fn document_path(&self, subject_id: &str) -> PathBuf {
        self.user_dir(subject_id).join(DID_DOCUMENT_FILENAME)
    }
}

impl DocumentStore for FsDocumentStore {
    fn load(&self, subject_id: &str) -> Result<Option<DidDocument>, ResolveError> {
        if subject_id.is_empty() || subject_id.contains(['/', '\\']) || subject_id.contains("..") {
            return Err(ResolveError::InvalidIdentifier(format!(
                "unsafe subject id: {subject_id}"
            )));
        }

        let path = self.document_path(subject_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read local DID document");
                return Err(ResolveError::NotFound(format!("unreadable local document: {e}")));
            }
        };

        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Local DID document is not valid JSON");
            ResolveError::NotFound(format!("invalid local document: {e}"))
        })
    }
}

/// Remote DID document retrieval.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// `Ok(None)` means the host answered but had no document.
    async fn fetch(&self, url: &str) -> Result<Option<DidDocument>, ResolveError>;
}

/// Fetches documents over HTTP(S) with a fixed per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<DidDocument>, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::Transport(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "DID document fetch returned non-success");
            return Ok(None);
        }

        response
            .json::<DidDocument>()
            .await
            .map(Some)
            .map_err(|e| ResolveError::NotFound(format!("GET {url} returned invalid document: {e}")))
    }
}

/// Local-first DID resolver with a single remote fallback.
#[derive(Clone)]
pub struct DocumentResolver {
    store: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn DocumentFetcher>,
    scheme: String,
}

impl DocumentResolver {
    pub fn new(store: Arc<dyn DocumentStore>, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            store,
            fetcher,
            scheme: "http".to_string(),
        }
    }

    /// Scheme used for the remote fetch (`http` or `https`).
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Resolve a DID to its document.
    pub async fn resolve(&self, did: &str) -> Result<DidDocument, ResolveError> {
        let identifier = DidIdentifier::parse(did)?;
        let subject_id = identifier.subject_id();

        match self.store.load(subject_id)? {
            Some(doc) if doc.id == did => {
                debug!(did, "Resolved DID document from local store");
                return Ok(doc);
            }
            Some(doc) => {
                warn!(did, stored_id = %doc.id, "Local document belongs to a different DID");
            }
            None => {}
        }

        let url = identifier.document_url(&self.scheme);
        info!(did, url = %url, "Local DID lookup missed, fetching remotely");

        match self.fetcher.fetch(&url).await? {
            Some(doc) if doc.id == did => Ok(doc),
            Some(doc) => Err(ResolveError::NotFound(format!(
                "remote document id {} does not match {did}",
                doc.id
            ))),
            None => Err(ResolveError::NotFound(did.to_string())),
        }
    }
}
