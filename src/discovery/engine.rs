// =============================================================================
// Pattern Discovery Engine — correlation + state machine + background loop
// =============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::persistence::{NewListing, NewTarget, Store};
use crate::types::{ExecutionStatus, ListingStatus};

/// How long past the schedule boundary counts as "missed" rather than
/// "scheduled" — strict: exactly 10s is already missed.
const SCHEDULE_LEAD_THRESHOLD: chrono::Duration = chrono::Duration::seconds(10);
/// Between-cycle sleep on an unhandled exception in the background loop.
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub new_listings: usize,
    pub ready_targets: usize,
    pub scheduled_targets: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    pub running: bool,
    pub last_calendar_check: Option<chrono::DateTime<Utc>>,
    pub monitored_listings: usize,
    pub ready_targets: usize,
    pub ready_state_pattern: (i32, i32, i32),
    pub target_advance_hours: f64,
    pub poll_interval_seconds: u64,
    pub default_buy_amount: f64,
}

struct Inner {
    running: bool,
    last_calendar_check: Option<chrono::DateTime<Utc>>,
    monitored_vcoin_ids: HashSet<String>,
}

pub struct DiscoveryEngine {
    store: Arc<dyn Store>,
    exchange: Arc<ExchangeClient>,
    ready_state_pattern: (i32, i32, i32),
    target_advance_hours: f64,
    poll_interval_seconds: u64,
    default_buy_amount: f64,
    state: RwLock<Inner>,
}

impl DiscoveryEngine {
    pub fn new(store: Arc<dyn Store>, exchange: Arc<ExchangeClient>, config: &Config) -> Self {
        Self {
            store,
            exchange,
            ready_state_pattern: config.ready_state_pattern,
            target_advance_hours: config.target_advance_hours,
            poll_interval_seconds: config.calendar_poll_interval_seconds,
            default_buy_amount: config.default_buy_amount_usdt,
            state: RwLock::new(Inner {
                running: false,
                last_calendar_check: None,
                monitored_vcoin_ids: HashSet::new(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Discovery cycle
    // -------------------------------------------------------------------------

    /// Run one full discovery cycle: calendar ingest, ready-state scan,
    /// schedule. Idempotent — safe to call concurrently with itself, relying
    /// on `vcoin_id` uniqueness rather than mutual exclusion (§5).
    pub async fn discover_cycle(&self) -> CycleResult {
        let now = Utc::now();
        self.state.write().last_calendar_check = Some(now);

        let mut result = CycleResult::default();

        if let Err(e) = self.ingest_calendar(now, &mut result).await {
            result.errors.push(format!("calendar ingest: {e}"));
        }

        if let Err(e) = self.scan_ready_states(&mut result).await {
            result.errors.push(format!("ready-state scan: {e}"));
        }

        if let Err(e) = self.schedule_pending(now, &mut result).await {
            result.errors.push(format!("schedule: {e}"));
        }

        info!(
            new_listings = result.new_listings,
            ready_targets = result.ready_targets,
            scheduled_targets = result.scheduled_targets,
            error_count = result.errors.len(),
            "discovery cycle complete"
        );

        result
    }

    async fn ingest_calendar(&self, now: chrono::DateTime<Utc>, result: &mut CycleResult) -> Result<()> {
        let entries = self.exchange.get_calendar().await?;

        for entry in entries {
            if entry.launch_time() <= now {
                continue;
            }

            if self.store.get_listing_by_vcoin(&entry.vcoin_id).await?.is_some() {
                continue;
            }

            let new_listing = NewListing::from_calendar_entry(&entry, now);
            match self.store.create_listing(new_listing).await {
                Ok(_) => {
                    result.new_listings += 1;
                    self.state.write().monitored_vcoin_ids.insert(entry.vcoin_id.clone());
                    debug!(vcoin_id = %entry.vcoin_id, "new listing created");
                }
                Err(e) => {
                    result.errors.push(format!("create_listing({}): {e}", entry.vcoin_id));
                }
            }
        }

        Ok(())
    }

    async fn scan_ready_states(&self, result: &mut CycleResult) -> Result<()> {
        let monitoring = self.store.list_monitoring().await?;

        for listing in monitoring {
            let symbols = match self.exchange.get_symbols(Some(listing.vcoin_id.as_str())).await {
                Ok(s) => s,
                Err(e) => {
                    result.errors.push(format!("get_symbols({}): {e}", listing.vcoin_id));
                    continue;
                }
            };

            for symbol in &symbols {
                if !symbol.matches_ready(self.ready_state_pattern) {
                    continue;
                }

                if !symbol.has_complete_data() {
                    warn!(vcoin_id = %listing.vcoin_id, "ready-but-incomplete symbol data");
                    continue;
                }

                match self.try_create_ready_target(&listing.vcoin_id, symbol).await {
                    Ok(Some(_)) => result.ready_targets += 1,
                    Ok(None) => {}
                    Err(e) => {
                        result
                            .errors
                            .push(format!("create_ready_target({}): {e}", listing.vcoin_id));
                    }
                }
            }
        }

        Ok(())
    }

    async fn schedule_pending(&self, now: chrono::DateTime<Utc>, result: &mut CycleResult) -> Result<()> {
        let pending = self.store.list_pending_targets().await?;

        for target in pending {
            let delta = target.actual_launch_utc - now;
            if delta > SCHEDULE_LEAD_THRESHOLD {
                self.store
                    .update_target_status(target.id, ExecutionStatus::Scheduled, None, None)
                    .await?;
                result.scheduled_targets += 1;
            } else {
                self.store
                    .update_target_status(target.id, ExecutionStatus::Missed, None, None)
                    .await?;
                self.store
                    .update_listing_status(&target.vcoin_id, ListingStatus::Missed)
                    .await?;
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Ready-target policy (§4.D) — also used by the recheck workflow (§4.E)
    // -------------------------------------------------------------------------

    /// Atomic per-`vcoin_id` attempt to create a snipe target. Returns
    /// `Ok(None)` (not an error) when the target is intentionally not
    /// created: it already exists, required fields are missing, or the
    /// advance notice is too short.
    pub async fn try_create_ready_target(
        &self,
        vcoin_id: &str,
        symbol: &crate::types::SymbolRecord,
    ) -> Result<Option<crate::persistence::Target>> {
        self.try_create_ready_target_at(vcoin_id, symbol, Utc::now()).await
    }

    /// Same as [`Self::try_create_ready_target`] but with an injectable
    /// `discovered_at`, so the advance-hours boundary can be exercised
    /// against a fixed clock in tests instead of racing real wall-clock time.
    async fn try_create_ready_target_at(
        &self,
        vcoin_id: &str,
        symbol: &crate::types::SymbolRecord,
        discovered_at: chrono::DateTime<Utc>,
    ) -> Result<Option<crate::persistence::Target>> {
        if self.store.get_target_by_vcoin(vcoin_id).await?.is_some() {
            return Ok(None);
        }

        let (Some(contract), Some(price_scale), Some(qty_scale), Some(open_time_ms)) = (
            symbol.contract.as_deref(),
            symbol.price_scale,
            symbol.qty_scale,
            symbol.open_time_ms,
        ) else {
            warn!(vcoin_id, "missing required fields for target creation");
            return Ok(None);
        };

        let actual_launch = crate::types::epoch_ms_to_utc(open_time_ms);
        let advance_hours = (actual_launch - discovered_at).num_milliseconds() as f64 / 3_600_000.0;

        if advance_hours < self.target_advance_hours {
            warn!(
                vcoin_id,
                advance_hours, required = self.target_advance_hours,
                "advance notice too short — target window not actionable"
            );
            return Ok(None);
        }

        let order_params = serde_json::json!({
            "symbol": contract,
            "side": "BUY",
            "type": "MARKET",
            "quoteOrderQty": self.default_buy_amount,
        });

        let new_target = NewTarget {
            vcoin_id: vcoin_id.to_string(),
            contract: contract.to_string(),
            price_precision: price_scale,
            qty_precision: qty_scale,
            actual_launch_time_ms: open_time_ms,
            actual_launch_utc: actual_launch,
            discovered_at_utc: discovered_at,
            hours_advance_notice: advance_hours,
            intended_buy_amount_quote: self.default_buy_amount,
            order_params,
            execution_status: ExecutionStatus::Pending.to_string(),
        };

        match self.store.create_target(new_target).await {
            Ok(target) => {
                self.store
                    .update_listing_status(vcoin_id, ListingStatus::Ready)
                    .await?;
                info!(vcoin_id, advance_hours, "snipe target created");
                Ok(Some(target))
            }
            Err(crate::error::Error::DbConflict(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // Background loop
    // -------------------------------------------------------------------------

    pub async fn run_background_loop(&self, mut shutdown: watch::Receiver<bool>) {
        self.state.write().running = true;
        info!(interval_seconds = self.poll_interval_seconds, "discovery background loop starting");

        while !*shutdown.borrow() {
            let result = self.discover_cycle().await;

            if !result.errors.is_empty() {
                error!(errors = ?result.errors, "discovery cycle reported errors");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(ERROR_RETRY_DELAY) => {}
                }
                continue;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(Duration::from_secs(self.poll_interval_seconds)) => {}
            }
        }

        info!("discovery background loop shutting down");
        self.state.write().running = false;
    }

    // -------------------------------------------------------------------------
    // Status query
    // -------------------------------------------------------------------------

    pub async fn status(&self) -> DiscoveryStatus {
        let (running, last_calendar_check) = {
            let s = self.state.read();
            (s.running, s.last_calendar_check)
        };

        let monitored_listings = self.store.list_monitoring().await.map(|v| v.len()).unwrap_or(0);
        let ready_targets = self.store.list_pending_targets().await.map(|v| v.len()).unwrap_or(0);

        DiscoveryStatus {
            running,
            last_calendar_check,
            monitored_listings,
            ready_targets,
            ready_state_pattern: self.ready_state_pattern,
            target_advance_hours: self.target_advance_hours,
            poll_interval_seconds: self.poll_interval_seconds,
            default_buy_amount: self.default_buy_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, TtlConfig};
    use crate::persistence::memory::MemoryStore;
    use crate::types::SymbolRecord;

    fn engine() -> DiscoveryEngine {
        let config = Config::default();
        let cache = Arc::new(Cache::new(None, TtlConfig::from_config(&config)));
        let exchange = Arc::new(ExchangeClient::new(&config, cache, None, None));
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        DiscoveryEngine::new(store, exchange, &config)
    }

    fn ready_symbol(vcoin_id: &str, open_time_ms: i64) -> SymbolRecord {
        SymbolRecord {
            vcoin_id: vcoin_id.to_string(),
            contract: Some(format!("{vcoin_id}USDT")),
            price_scale: Some(8),
            qty_scale: Some(6),
            open_time_ms: Some(open_time_ms),
            sts: 2,
            st: 2,
            tt: 4,
        }
    }

    #[tokio::test]
    async fn s1_happy_path_creates_scheduled_target() {
        let engine = engine();
        let now = Utc::now();
        let launch_ms = (now + chrono::Duration::hours(6)).timestamp_millis();

        engine
            .store
            .create_listing(NewListing {
                vcoin_id: "A".into(),
                symbol_name: "AUSDT".into(),
                project_name: "Alpha".into(),
                announced_launch_time_ms: launch_ms,
                announced_launch_utc: now + chrono::Duration::hours(6),
                status: ListingStatus::Monitoring.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let open_time_ms = (now + chrono::Duration::hours(4)).timestamp_millis();
        let symbol = ready_symbol("A", open_time_ms);

        let target = engine
            .try_create_ready_target("A", &symbol)
            .await
            .unwrap()
            .expect("target should be created");

        assert!((target.hours_advance_notice - 4.0).abs() < 0.05);
        assert_eq!(target.order_params["quoteOrderQty"], 100.0);
        assert_eq!(target.order_params["symbol"], "AUSDT");
    }

    #[tokio::test]
    async fn s3_too_short_advance_creates_no_target() {
        let engine = engine();
        let now = Utc::now();
        let open_time_ms = (now + chrono::Duration::hours(1)).timestamp_millis();
        let symbol = ready_symbol("B", open_time_ms);

        let result = engine.try_create_ready_target("B", &symbol).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn boundary_exactly_3_5_hours_creates_target() {
        let engine = engine();
        let now = Utc::now();
        let open_time_ms = (now + chrono::Duration::minutes(210)).timestamp_millis(); // 3.5h
        let symbol = ready_symbol("C", open_time_ms);

        // Use the same fixed instant as both "discovered_at" and the basis
        // for `open_time_ms` so the 3.5h gap is exact, not eroded by the
        // real clock advancing between constructing the fixture and the
        // call under test.
        let result = engine
            .try_create_ready_target_at("C", &symbol, now)
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn missing_contract_aborts_target_creation() {
        let engine = engine();
        let now = Utc::now();
        let mut symbol = ready_symbol("D", (now + chrono::Duration::hours(6)).timestamp_millis());
        symbol.contract = None;

        let result = engine.try_create_ready_target("D", &symbol).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn s4_missed_schedule_transitions_target_to_missed() {
        let engine = engine();
        let now = Utc::now();

        engine
            .store
            .create_listing(NewListing {
                vcoin_id: "E".into(),
                symbol_name: "EUSDT".into(),
                project_name: "Echo".into(),
                announced_launch_time_ms: now.timestamp_millis(),
                announced_launch_utc: now,
                status: ListingStatus::Monitoring.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        engine
            .store
            .create_target(NewTarget {
                vcoin_id: "E".into(),
                contract: "EUSDT".into(),
                price_precision: 8,
                qty_precision: 6,
                actual_launch_time_ms: (now + chrono::Duration::seconds(5)).timestamp_millis(),
                actual_launch_utc: now + chrono::Duration::seconds(5),
                discovered_at_utc: now,
                hours_advance_notice: 4.0,
                intended_buy_amount_quote: 100.0,
                order_params: serde_json::json!({"symbol": "EUSDT"}),
                execution_status: ExecutionStatus::Pending.to_string(),
            })
            .await
            .unwrap();

        let mut result = CycleResult::default();
        engine.schedule_pending(now, &mut result).await.unwrap();

        let target = engine.store.get_target_by_vcoin("E").await.unwrap().unwrap();
        assert_eq!(target.execution_status(), ExecutionStatus::Missed);
    }
}
