// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Module
//!
//! Client side of DID WBA: sign outgoing requests with a local DID key, cache
//! the bearer token the server hands back (one per origin), and retry once
//! with a fresh signature when the server rejects a cached token.
//!
//! ```rust,ignore
//! let signer = ClientRequestSigner::from_files(&doc_path, &key_path, DEFAULT_TIMEOUT)?;
//! let response = signer
//!     .send_authenticated("http://localhost:8000/wba/test", "GET", None)
//!     .await;
//! ```

use std::io;
use std::path::Path;

pub mod identity;
pub mod signer;
pub mod token_cache;
pub mod transport;

pub use identity::{generate_or_load, LocalIdentity};
pub use signer::{ClientRequestSigner, RetryPolicy, SignedResponse};
pub use token_cache::TokenCache;
pub use transport::{HttpMethod, HttpTransport, ReqwestTransport, DEFAULT_TIMEOUT};

use crate::auth::signature::SignatureError;

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid URL '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid DID document: {0}")]
    InvalidDocument(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Signing(#[from] SignatureError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        ClientError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
