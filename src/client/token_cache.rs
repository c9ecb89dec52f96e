// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-origin bearer token cache.
//!
//! Tokens are keyed by origin (`scheme://host:port`). When the token is a JWT
//! with a readable `exp` claim, the entry is dropped shortly before that
//! expiry so the next request re-signs instead of waiting for a 401. Opaque
//! tokens stay cached until the server rejects them.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::ClientError;
use crate::auth::clock::SharedClock;

/// Cached tokens are dropped this long before their `exp`.
const EXPIRY_SKEW_SECS: i64 = 30;

/// A cached token and, when known, its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    #[serde(default)]
    exp: Option<i64>,
}

impl CachedToken {
    /// Read `exp` without verifying the token; the server remains the
    /// authority on validity.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let expires_at = jsonwebtoken::dangerous::insecure_decode::<ExpiryClaim>(&token)
            .ok()
            .and_then(|data| data.claims.exp)
            .and_then(|exp| DateTime::from_timestamp(exp, 0));
        Self { token, expires_at }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= exp,
            None => false,
        }
    }
}

/// Origin of a URL, used as the cache key.
pub fn origin_of(url: &str) -> Result<String, ClientError> {
    let parsed = Url::parse(url).map_err(|e| ClientError::InvalidUrl(url.to_string(), e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(ClientError::InvalidUrl(url.to_string(), "no host".into()));
    }
    Ok(parsed.origin().ascii_serialization())
}

/// Concurrency-safe token cache.
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
    clock: SharedClock,
}

impl TokenCache {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Live token for `origin`, dropping it first if it has expired.
    pub fn get(&self, origin: &str) -> Option<String> {
        let now = self.clock.now();
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Token cache lock poisoned; treating as empty");
            return None;
        };

        match entries.get(origin) {
            Some(cached) if cached.is_expired(now) => {
                debug!(origin, "Cached token expired, discarding");
                entries.remove(origin);
                None
            }
            Some(cached) => Some(cached.token.clone()),
            None => None,
        }
    }

    pub fn insert(&self, origin: &str, token: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(origin.to_string(), CachedToken::new(token));
        }
    }

    pub fn remove(&self, origin: &str) -> bool {
        self.entries
            .lock()
            .map(|mut entries| entries.remove(origin).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
