//! Cached, non-blocking server status.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::protocol::{self, Players, ServerStatus};

/// Tuning for the [`StatusMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How long a result is served before a refresh is scheduled
    pub cache_ttl: Duration,
    /// Bound on a single ping, connect included
    pub timeout: Duration,
    /// Hosts that get a bare TCP connect when the status exchange fails
    pub internal_hosts: Vec<Regex>,
}

impl MonitorConfig {
    /// Builds a config from regex source strings.
    pub fn new(
        cache_ttl: Duration,
        timeout: Duration,
        internal_host_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let internal_hosts = internal_host_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cache_ttl,
            timeout,
            internal_hosts,
        })
    }

    pub fn default_internal_patterns() -> Vec<String> {
        vec!["^localhost$".to_string(), r"^127\.".to_string()]
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(30_000),
            timeout: Duration::from_millis(2_000),
            internal_hosts: Self::default_internal_patterns()
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
        }
    }
}

/// What the portal knows about one server right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// `None` until the first ping completes
    pub online: Option<bool>,
    pub pending: bool,
    pub checked_at: Option<DateTime<Utc>>,
    pub players: Option<Players>,
    pub version: Option<String>,
    pub motd: Option<String>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl StatusSnapshot {
    fn unknown() -> Self {
        Self {
            online: None,
            pending: false,
            checked_at: None,
            players: None,
            version: None,
            motd: None,
            latency_ms: None,
            error: None,
        }
    }

    fn pending() -> Self {
        Self {
            pending: true,
            ..Self::unknown()
        }
    }

    fn online(status: ServerStatus) -> Self {
        Self {
            online: Some(true),
            checked_at: Some(Utc::now()),
            players: status.players,
            version: status.version,
            motd: status.motd,
            latency_ms: status.latency_ms,
            ..Self::unknown()
        }
    }

    fn reachable() -> Self {
        Self {
            online: Some(true),
            checked_at: Some(Utc::now()),
            ..Self::unknown()
        }
    }

    fn offline(error: String) -> Self {
        Self {
            online: Some(false),
            checked_at: Some(Utc::now()),
            error: Some(error),
            ..Self::unknown()
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        match self.checked_at {
            None => true,
            Some(at) => {
                let age = Utc::now().signed_duration_since(at);
                age.to_std().map_or(false, |age| age > ttl)
            }
        }
    }
}

/// A cached snapshot and the ticket of the ping allowed to replace it.
#[derive(Debug, Clone)]
struct Entry {
    snapshot: StatusSnapshot,
    /// Ticket of the in-flight ping, 0 when none is running
    ticket: u64,
}

impl Entry {
    fn new(snapshot: StatusSnapshot) -> Self {
        Self { snapshot, ticket: 0 }
    }
}

/// Status cache keyed by server id.
///
/// [`request`](Self::request) answers from the cache and schedules at most one
/// background ping per server when the entry is missing or stale. Must be
/// used from within a Tokio runtime.
///
/// Every scheduled ping carries a ticket and only writes back while its ticket
/// is still the entry's. Forgetting or refreshing a server invalidates pings
/// already in flight, so a result for an old address never lands.
pub struct StatusMonitor {
    config: MonitorConfig,
    cache: Arc<DashMap<String, Entry>>,
    next_ticket: AtomicU64,
}

impl StatusMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            cache: Arc::new(DashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns the cached status of `server_id`, scheduling a refresh if needed.
    ///
    /// # Arguments
    ///
    /// * `server_id` - Cache key
    /// * `address` - `host[:port]` of the Minecraft server
    ///
    /// # Returns
    ///
    /// The current snapshot. A server seen for the first time comes back with
    /// `pending: true` and `online: None`.
    pub fn request(&self, server_id: &str, address: &str) -> StatusSnapshot {
        self.schedule_if_stale(server_id, address);
        self.peek(server_id).unwrap_or_else(StatusSnapshot::pending)
    }

    /// Cached snapshot without scheduling anything.
    pub fn peek(&self, server_id: &str) -> Option<StatusSnapshot> {
        self.cache.get(server_id).map(|entry| entry.snapshot.clone())
    }

    /// Pings now and stores the result, bypassing the TTL.
    pub async fn refresh_now(&self, server_id: &str, address: &str) -> StatusSnapshot {
        let snapshot = self.probe(address).await;
        self.cache.insert(server_id.to_string(), Entry::new(snapshot.clone()));
        snapshot
    }

    /// Drops the cache entry of a deleted or re-addressed server. A ping
    /// still in flight for it is discarded when it completes.
    pub fn forget(&self, server_id: &str) {
        self.cache.remove(server_id);
    }

    fn schedule_if_stale(&self, server_id: &str, address: &str) {
        let ticket = {
            let mut entry = self
                .cache
                .entry(server_id.to_string())
                .or_insert_with(|| Entry::new(StatusSnapshot::unknown()));
            if entry.snapshot.pending || !entry.snapshot.is_stale(self.config.cache_ttl) {
                return;
            }
            // claimed while holding the shard lock
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            entry.snapshot.pending = true;
            entry.ticket = ticket;
            ticket
        };

        let cache = Arc::clone(&self.cache);
        let id = server_id.to_string();
        let address = address.to_string();
        let probe = Probe {
            timeout: self.config.timeout,
            internal_hosts: self.config.internal_hosts.clone(),
        };

        tokio::spawn(async move {
            let snapshot = probe.run(&address).await;
            match cache.get_mut(&id) {
                Some(mut entry) if entry.ticket == ticket => *entry = Entry::new(snapshot),
                _ => debug!("Discarding superseded status of {} ({})", id, address),
            }
        });
    }

    async fn probe(&self, address: &str) -> StatusSnapshot {
        Probe {
            timeout: self.config.timeout,
            internal_hosts: self.config.internal_hosts.clone(),
        }
        .run(address)
        .await
    }

    /// Periodically requests the status of every server `servers` yields.
    ///
    /// `servers` returns `(server_id, address)` pairs and is called on each
    /// tick, so servers added later are picked up.
    pub fn spawn_poller<F, Fut>(self: Arc<Self>, servers: F, interval: Duration) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<(String, String)>> + Send,
    {
        info!("📡 Status poller running every {:?}", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let targets = servers().await;
                debug!("Polling {} servers", targets.len());
                for (server_id, address) in targets {
                    self.request(&server_id, &address);
                }
            }
        })
    }
}

struct Probe {
    timeout: Duration,
    internal_hosts: Vec<Regex>,
}

impl Probe {
    async fn run(&self, address: &str) -> StatusSnapshot {
        let (host, port) = protocol::parse_address(address);
        match protocol::ping(&host, port, self.timeout).await {
            Ok(status) => StatusSnapshot::online(status),
            Err(e) => {
                debug!("Status ping to {}:{} failed: {}", host, port, e);
                if self.is_internal(&host) && protocol::tcp_reachable(&host, port, self.timeout).await {
                    StatusSnapshot::reachable()
                } else {
                    StatusSnapshot::offline(e.to_string())
                }
            }
        }
    }

    fn is_internal(&self, host: &str) -> bool {
        self.internal_hosts.iter().any(|pattern| pattern.is_match(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_snapshot_is_not_stale() {
        let snapshot = StatusSnapshot::offline("refused".to_string());
        assert!(!snapshot.is_stale(Duration::from_secs(30)));
        assert!(StatusSnapshot::unknown().is_stale(Duration::from_secs(30)));
    }

    #[test]
    fn old_snapshot_is_stale() {
        let mut snapshot = StatusSnapshot::reachable();
        snapshot.checked_at = Some(Utc::now() - chrono::Duration::seconds(31));
        assert!(snapshot.is_stale(Duration::from_secs(30)));
    }

    #[test]
    fn default_internal_patterns() {
        let probe = Probe {
            timeout: Duration::from_millis(10),
            internal_hosts: MonitorConfig::default().internal_hosts,
        };
        assert!(probe.is_internal("localhost"));
        assert!(probe.is_internal("127.0.0.1"));
        assert!(!probe.is_internal("mc.example.org"));
        assert!(!probe.is_internal("notlocalhost"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let result = MonitorConfig::new(
            Duration::from_secs(1),
            Duration::from_secs(1),
            &["(unclosed".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(StatusSnapshot::pending()).unwrap();
        assert_eq!(json["pending"], true);
        assert!(json["online"].is_null());
        assert!(json.get("checkedAt").is_some());
        assert!(json.get("latencyMs").is_some());
    }
}
