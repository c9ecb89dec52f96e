// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Nonce and timestamp freshness checks for replay protection.
//!
//! Nonces are tracked in a capacity-bounded LRU keyed by nonce value with the
//! instant until which the nonce must stay recorded. That instant is at least
//! the validity window after first use, and for a header stamped in the
//! future, as late as its timestamp stays acceptable. A live entry is never
//! evicted: once the store is full of live nonces, new ones are refused.
//! [`NonceSweeper`] drops expired entries in the background so the map does
//! not grow with traffic.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clock::SharedClock;

/// Default upper bound on tracked nonces.
pub const DEFAULT_NONCE_CAPACITY: usize = 100_000;

/// Default interval between sweeps of expired nonces.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Replay-protection store and timestamp checker.
pub struct NonceValidator {
    /// nonce -> retained until
    seen: Mutex<LruCache<String, DateTime<Utc>>>,
    window: chrono::Duration,
    clock: SharedClock,
}

impl NonceValidator {
    /// Create a validator whose nonces stay live for `window`.
    ///
    /// - `capacity`: max number of nonces tracked at once. When every tracked
    ///   nonce is still live, new nonces are rejected rather than evicting one.
    pub fn new(window: chrono::Duration, capacity: usize, clock: SharedClock) -> Self {
        Self {
            seen: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            window,
            clock,
        }
    }

    /// Generate a random nonce and record it as issued now.
    pub fn generate(&self) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        if !self.is_fresh(&nonce) {
            warn!("Generated nonce could not be recorded");
        }
        nonce
    }

    /// Returns `true` and records the nonce if it has not been seen inside the
    /// validity window; returns `false` for a replay.
    ///
    /// Fails closed if the store is unavailable or full of live nonces.
    pub fn is_fresh(&self, nonce: &str) -> bool {
        self.is_fresh_until(nonce, self.clock.now())
    }

    /// Like [`is_fresh`](Self::is_fresh), but keeps the nonce recorded until
    /// at least `keep_until` even if that is past the validity window.
    pub fn is_fresh_until(&self, nonce: &str, keep_until: DateTime<Utc>) -> bool {
        let now = self.clock.now();
        let retain_until = keep_until.max(now + self.window);
        let Ok(mut seen) = self.seen.lock() else {
            warn!("Nonce store lock poisoned; rejecting nonce");
            return false;
        };

        match seen.get(nonce).copied() {
            Some(until) if now <= until => return false,
            Some(_) => {}
            None if seen.len() >= seen.cap().get() => {
                let purged = purge_locked(&mut seen, now);
                if seen.len() >= seen.cap().get() {
                    warn!(
                        capacity = seen.cap().get(),
                        "Nonce store full of live nonces; rejecting nonce"
                    );
                    return false;
                }
                debug!(purged, "Made room in nonce store");
            }
            None => {}
        }
        seen.put(nonce.to_string(), retain_until);
        true
    }

    /// Parse a header timestamp and check it lies within `tolerance_minutes`
    /// of now, in either direction. Returns the parsed time when accepted.
    pub fn check_timestamp(&self, timestamp: &str, tolerance_minutes: i64) -> Option<DateTime<Utc>> {
        timestamp_within(timestamp, tolerance_minutes, self.clock.now())
    }

    /// Check that an ISO-8601 timestamp lies within `tolerance_minutes` of now,
    /// in either direction. Unparsable input is rejected.
    pub fn verify_timestamp(&self, timestamp: &str, tolerance_minutes: i64) -> bool {
        self.check_timestamp(timestamp, tolerance_minutes).is_some()
    }

    /// Drop nonces that no longer need to be retained. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        match self.seen.lock() {
            Ok(mut seen) => purge_locked(&mut seen, now),
            Err(_) => 0,
        }
    }

    /// Number of nonces currently tracked, expired or not.
    pub fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn purge_locked(seen: &mut LruCache<String, DateTime<Utc>>, now: DateTime<Utc>) -> usize {
    let expired: Vec<String> = seen
        .iter()
        .filter(|(_, until)| now > **until)
        .map(|(nonce, _)| nonce.clone())
        .collect();
    for nonce in &expired {
        seen.pop(nonce);
    }
    expired.len()
}

/// Timestamp check against an explicit "now".
pub fn verify_timestamp_at(timestamp: &str, tolerance_minutes: i64, now: DateTime<Utc>) -> bool {
    timestamp_within(timestamp, tolerance_minutes, now).is_some()
}

fn timestamp_within(
    timestamp: &str,
    tolerance_minutes: i64,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let request_time = match DateTime::parse_from_rfc3339(timestamp.trim()) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            debug!(error = %e, "Invalid timestamp format");
            return None;
        }
    };

    let skew = (now - request_time).abs();
    if skew > chrono::Duration::minutes(tolerance_minutes) {
        debug!(
            request_time = %request_time,
            now = %now,
            skew_secs = skew.num_seconds(),
            "Timestamp outside tolerance"
        );
        return None;
    }
    Some(request_time)
}

/// Background task that periodically purges expired nonces.
pub struct NonceSweeper {
    nonces: Arc<NonceValidator>,
    interval: Duration,
}

impl NonceSweeper {
    pub fn new(nonces: Arc<NonceValidator>) -> Self {
        Self {
            nonces,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(NonceSweeper::new(nonces).run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Nonce sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Nonce sweeper shutting down");
                    return;
                }
            }

            let removed = self.nonces.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = self.nonces.len(), "Purged expired nonces");
            }
        }
    }
}
