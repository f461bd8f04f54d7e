// =============================================================================
// Central Application State
// =============================================================================
//
// Ties the upstream adapter, cache, store, and discovery engine together
// behind Arc so every background task shares one instance. The (out-of-scope)
// HTTP façade would read its snapshots from here; nothing in this crate
// renders them, but the shape is kept so that collaborator can be bolted on
// without touching the engine.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::config::Config;
use crate::discovery::DiscoveryStatus;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for operator visibility.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: String,
}

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// mutation so a future status collaborator can detect changes cheaply.
    pub state_version: AtomicU64,

    pub config: Arc<Config>,
    pub cache: Arc<crate::cache::Cache>,
    pub exchange: Arc<crate::exchange::ExchangeClient>,
    pub store: Arc<dyn crate::persistence::Store>,
    pub discovery: Arc<crate::discovery::DiscoveryEngine>,
    pub scheduler: Arc<crate::scheduler::Scheduler>,

    recent_errors: RwLock<Vec<ErrorRecord>>,
    start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<crate::cache::Cache>,
        exchange: Arc<crate::exchange::ExchangeClient>,
        store: Arc<dyn crate::persistence::Store>,
        discovery: Arc<crate::discovery::DiscoveryEngine>,
        scheduler: Arc<crate::scheduler::Scheduler>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config,
            cache,
            exchange,
            store,
            discovery,
            scheduler,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Record an error message, evicting the oldest entry once the ring
    /// buffer exceeds [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }

        self.increment_version();
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Build a complete, serialisable snapshot of engine state.
    pub async fn build_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_seconds: self.uptime_seconds(),
            environment: self.config.environment.clone(),
            discovery: self.discovery.status().await,
            cache: self.cache.stats().await,
            recent_errors: self.recent_errors(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_seconds: u64,
    pub environment: String,
    pub discovery: DiscoveryStatus,
    pub cache: CacheStats,
    pub recent_errors: Vec<ErrorRecord>,
}
