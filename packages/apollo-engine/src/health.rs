use crate::api::HealthProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Checking,
    Online { version: Option<String> },
    Offline { reason: String },
}

impl BackendStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, BackendStatus::Online { .. })
    }
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStatus::Checking => write!(f, "checking"),
            BackendStatus::Online { version: Some(v) } => write!(f, "online (v{})", v),
            BackendStatus::Online { version: None } => write!(f, "online"),
            BackendStatus::Offline { reason } => write!(f, "offline: {}", reason),
        }
    }
}

/// Polls the backend's health endpoint and publishes the latest status.
///
/// The monitor only owns a probe and a watch channel, so a poll can never touch
/// wizard state.
pub struct HealthMonitor<P: HealthProbe> {
    probe: P,
    interval: Duration,
    tx: watch::Sender<BackendStatus>,
}

impl<P: HealthProbe + 'static> HealthMonitor<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        let (tx, _) = watch::channel(BackendStatus::Checking);
        Self { probe, interval, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<BackendStatus> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> BackendStatus {
        self.tx.borrow().clone()
    }

    pub async fn check_once(&self) -> BackendStatus {
        self.tx.send_replace(BackendStatus::Checking);
        let status = match self.probe.health().await {
            Ok(report) if report.is_ok() => BackendStatus::Online {
                version: report.version,
            },
            Ok(report) => BackendStatus::Offline {
                reason: report
                    .message
                    .unwrap_or_else(|| format!("status '{}'", report.status)),
            },
            Err(e) => BackendStatus::Offline {
                reason: e.message().to_string(),
            },
        };

        match &status {
            BackendStatus::Offline { reason } => warn!(%reason, "Backend health check failed"),
            _ => debug!(status = %status, "Backend health check"),
        }
        self.tx.send_replace(status.clone());
        status
    }

    /// Checks immediately, then every `interval` until the handle is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }
}
