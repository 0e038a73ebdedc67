//! Process wiring: store, prober, scheduler and the API server.

use crate::http_server::{ApiServer, AppState};
use crate::roster::load_roster_file;
use crate::types::{ProbeKind, ServerConfig};
use liveness::{
    Eligibility, IcmpProber, LivenessStore, MetricsRegistry, ProbeScheduler, Prober,
    SchedulerSettings, TcpProber,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Build the prober selected by the configuration
pub fn build_prober(config: &ServerConfig) -> Arc<dyn Prober> {
    match config.probe_kind {
        ProbeKind::Icmp => Arc::new(IcmpProber::with_command(
            config.ping_command.clone(),
            config.probe_timeout,
        )),
        ProbeKind::Tcp => Arc::new(TcpProber::new(config.tcp_port, config.probe_timeout)),
    }
}

/// Liveness server
pub struct LivenessServer {
    config: ServerConfig,
    state: AppState,
}

impl LivenessServer {
    /// Assemble every component with the configured prober
    pub fn new(config: ServerConfig) -> common::Result<Self> {
        let prober = build_prober(&config);
        Self::with_prober(config, prober)
    }

    /// Assemble every component around an explicit prober
    pub fn with_prober(config: ServerConfig, prober: Arc<dyn Prober>) -> common::Result<Self> {
        let metrics = if config.metrics_enabled {
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let settings = SchedulerSettings {
            batch_size: config.batch_size,
            management_interval: config.management_interval,
            eligibility: Eligibility::new(config.eligible_prefixes.iter().cloned()),
        };
        let store = Arc::new(LivenessStore::new());
        let scheduler = Arc::new(ProbeScheduler::new(store, prober, settings, metrics.clone()));
        scheduler.reconfigure(config.interval_seconds)?;

        let state = AppState {
            scheduler,
            metrics,
            roster_has_headers: config.roster_has_headers,
        };
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Load the initial roster and autostart, as configured
    pub async fn prepare(&self) -> common::Result<()> {
        if let Some(ref path) = self.config.roster_path {
            let servers = load_roster_file(path, self.config.roster_has_headers)?;
            let count = servers.len();
            self.state.scheduler.store().replace_roster(servers).await;
            if let Some(ref m) = self.state.metrics {
                m.record_roster_replacement(count);
            }
        }

        if self.config.autostart {
            self.state.scheduler.start(self.config.interval_seconds).await?;
        }
        Ok(())
    }

    /// Run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            listen_addr = %self.config.listen_addr,
            probe = ?self.config.probe_kind,
            interval_seconds = self.config.interval_seconds,
            "Starting liveness server"
        );

        if let Err(e) = self.prepare().await {
            error!(error = %e, "Startup failed");
            return Err(e.into());
        }

        let scheduler = self.state.scheduler.clone();
        let api = ApiServer::new(self.state, self.config.listen_addr.clone());
        let served = api.run(shutdown).await;

        scheduler.shutdown().await;
        if let Err(e) = served {
            warn!(error = %e, "API server error");
            return Err(e);
        }

        info!("Liveness server stopped");
        Ok(())
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
    }
}
