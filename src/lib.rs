// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DID WBA Gateway - mutual authentication for DID-signed HTTP requests
//!
//! A server verifies `Authorization: DIDWba ...` headers against the caller's
//! resolved DID document and answers with a short-lived bearer token; the
//! client side signs requests and caches those tokens per origin.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Header parsing, replay protection, DID resolution, signature
//!   verification, token issuance, and the gateway middleware
//! - `client` - Request signer, local identities, token cache
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod state;
