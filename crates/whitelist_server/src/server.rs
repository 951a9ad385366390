//! Server lifecycle.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use server_status::{MonitorConfig, StatusMonitor};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::mail::{self, Mailer};
use crate::membership::MembershipList;
use crate::routes;
use crate::state::AppState;
use crate::store::{servers, Store};

/// The portal backend: database, mail transport, membership list, status
/// monitor and HTTP API.
pub struct PortalServer {
    state: AppState,
}

impl PortalServer {
    /// Opens the database, imports the seed file into an empty server table
    /// and picks the mail transport.
    ///
    /// # Arguments
    ///
    /// * `config` - Runtime configuration
    ///
    /// # Returns
    ///
    /// A server ready to [`start`](Self::start), or the first setup failure.
    pub fn new(config: PortalConfig) -> Result<Self, PortalError> {
        let store = match &config.database_path {
            Some(path) => Store::open(path)?,
            None => {
                warn!("⚠️ No database path configured, data lives in memory only");
                Store::open_in_memory()?
            }
        };

        if let Some(seed) = &config.servers_seed {
            if seed.is_file() {
                store.call_blocking(|conn| servers::seed_if_empty(conn, seed))?;
            } else {
                warn!("⚠️ Server seed file {} not found, skipping import", seed.display());
            }
        }

        let mailer = mail::from_config(&config.mail)?;
        Self::with_parts(config, store, mailer)
    }

    /// Builds a server around an existing store and mail transport.
    pub fn with_parts(
        config: PortalConfig,
        store: Store,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, PortalError> {
        let monitor_config = MonitorConfig::new(
            config.status.cache_ttl,
            config.status.timeout,
            &config.status.internal_hosts,
        )
        .map_err(|e| PortalError::Internal(format!("invalid internal host pattern: {e}")))?;

        let membership = MembershipList::new(config.membership.csv_paths.clone());
        info!("👥 Membership list source: {}", membership.source());

        Ok(Self {
            state: AppState {
                config: Arc::new(config),
                store,
                mailer,
                membership: Arc::new(membership),
                status: Arc::new(StatusMonitor::new(monitor_config)),
            },
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Serves the API until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish; the status poller, if any,
    /// is stopped afterwards.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), PortalError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.state.config.bind_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| PortalError::Internal(format!("failed to bind {address}: {e}")))?;

        info!("🚀 Whitelist API listening on http://{}", address);

        let poller = self.spawn_status_poller();

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(poller) = poller {
            poller.abort();
        }

        result.map_err(|e| PortalError::Internal(format!("server error: {e}")))?;
        info!("🛑 Whitelist API stopped");
        Ok(())
    }

    fn spawn_status_poller(&self) -> Option<JoinHandle<()>> {
        let interval = self.state.config.status.poll_interval?;
        let store = self.state.store.clone();

        let handle = Arc::clone(&self.state.status).spawn_poller(
            move || {
                let store = store.clone();
                async move {
                    match store.call(|conn| servers::list(conn)).await {
                        Ok(list) => list.into_iter().map(|s| (s.id, s.ip)).collect(),
                        Err(e) => {
                            warn!("⚠️ Could not list servers for status polling: {}", e);
                            Vec::new()
                        }
                    }
                }
            },
            interval,
        );
        Some(handle)
    }
}
