// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Server side of DID WBA mutual authentication.
//!
//! ## Auth Flow
//!
//! 1. Client signs `{did, nonce, service, timestamp}` with a key listed in its
//!    DID document and sends `Authorization: DIDWba did="...", ...`
//! 2. Gateway:
//!    - Checks the timestamp is within tolerance and the nonce is unused
//!    - Resolves the DID document (local store first, then one remote GET)
//!    - Verifies the signature, bound to the `Host` the request arrived on
//!    - Issues a bearer token and echoes it in the `authorization` response header
//! 3. Subsequent requests send `Authorization: Bearer <token>` until it expires
//!
//! ## Security
//!
//! - All non-exempt endpoints require authentication
//! - Nonce reuse inside the validity window is rejected
//! - Tokens are signed with an asymmetric key; HS* algorithms are refused

pub mod claims;
pub mod clock;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod extractor;
pub mod header;
pub mod middleware;
pub mod nonce;
pub mod resolver;
pub mod signature;
pub mod token;

#[cfg(test)]
pub mod testutil;

pub use claims::AuthenticatedIdentity;
pub use dispatcher::AuthDispatcher;
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use header::{AuthorizationHeader, SignedAuthHeader};
pub use nonce::{NonceSweeper, NonceValidator};
pub use resolver::{DocumentResolver, FsDocumentStore, HttpDocumentFetcher};
pub use signature::{Secp256k1Suite, SignatureSuite};
pub use token::{TokenIssuer, TokenKeys, TokenVerifier};
