//! Per-client fixed-window rate limiting.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::admission::{AdmissionDecision, Rejection};
use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Request count for one client within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    pub request_count: u32,
    pub window_start: Instant,
}

/// Fixed-window limiter: at most `limit` requests per `period` per client.
///
/// The window resets wholesale once `period` has elapsed, so up to twice the
/// limit can pass across a boundary.
pub struct RateLimiter {
    windows: DashMap<String, ClientWindow>,
    limit: u32,
    period: Duration,
    exempt: HashSet<String>,
}

impl RateLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            period,
            exempt: HashSet::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests, config.period())
            .with_exempt(config.exempt_clients.iter().cloned())
    }

    /// Clients that are always admitted and never tracked.
    pub fn with_exempt<I: IntoIterator<Item = String>>(mut self, clients: I) -> Self {
        self.exempt.extend(clients);
        self
    }

    /// Count a request from `client_id` made at `now`.
    pub fn admit(&self, client_id: &str, now: Instant) -> AdmissionDecision {
        if self.exempt.contains(client_id) {
            return AdmissionDecision::Admit;
        }

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut created = false;
        let decision = match self.windows.entry(client_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ClientWindow {
                    request_count: 1,
                    window_start: now,
                });
                created = true;
                AdmissionDecision::Admit
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();
                if now.saturating_duration_since(window.window_start) > self.period {
                    window.request_count = 1;
                    window.window_start = now;
                    AdmissionDecision::Admit
                } else if window.request_count.saturating_add(1) > self.limit {
                    Rejection::RateLimited.into()
                } else {
                    window.request_count += 1;
                    AdmissionDecision::Admit
                }
            }
        };

        // Entry guard is released here, so len() cannot contend with it.
        if created {
            metrics::record_tracked_clients(self.windows.len());
        }
        if !decision.allow() {
            tracing::warn!(client = %client_id, limit = self.limit, "Rate limit exceeded");
        }
        decision
    }

    /// Current window for a client, if tracked.
    pub fn window(&self, client_id: &str) -> Option<ClientWindow> {
        self.windows.get(client_id).map(|w| *w.value())
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop windows whose period has elapsed. A dropped client starts a fresh
    /// window on its next request, same as a reset. Returns the number removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let period = self.period;
        let mut removed = 0;
        self.windows.retain(|_, w| {
            let live = now.saturating_duration_since(w.window_start) <= period;
            if !live {
                removed += 1;
            }
            live
        });
        metrics::record_tracked_clients(self.windows.len());
        removed
    }
}

/// Periodically sweep stale windows until shutdown is signalled.
pub async fn run_sweeper(
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    if every.is_zero() {
        tracing::warn!("Rate limit sweep interval is zero; sweeper disabled");
        return;
    }

    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    tracing::info!(interval = ?every, "Rate limit sweeper started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "Swept stale rate limit windows");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limit sweeper stopped");
                break;
            }
        }
    }
}
