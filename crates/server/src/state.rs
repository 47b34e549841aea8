//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

use voice_duet_agent::{LifecyclePhase, RunReport};
use voice_duet_config::Settings;

use crate::presentation::BroadcastSurface;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    /// Surface the running conversation presents on
    pub surface: Arc<BroadcastSurface>,
    /// Identifier of this process's run
    pub run_id: String,
    phase: watch::Receiver<LifecyclePhase>,
    report: Arc<RwLock<Option<RunReport>>>,
}

impl AppState {
    pub fn new(
        config: Settings,
        surface: Arc<BroadcastSurface>,
        phase: watch::Receiver<LifecyclePhase>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            surface,
            run_id: uuid::Uuid::new_v4().to_string(),
            phase,
            report: Arc::new(RwLock::new(None)),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    /// Store the finished run's report
    pub fn set_report(&self, report: RunReport) {
        *self.report.write() = Some(report);
    }

    pub fn report(&self) -> Option<RunReport> {
        self.report.read().clone()
    }
}
