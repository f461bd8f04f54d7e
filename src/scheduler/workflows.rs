// =============================================================================
// Workflow descriptors — calendar poll and per-symbol recheck
// =============================================================================
//
// Each workflow here is a fixed sequence of named steps, mirroring the
// step-function shape of the source system's workers: `check-symbol-status`,
// `process-symbol-status`, and so on. Unlike that system's decorator-
// discovered handlers, triggers are declared explicitly in this module's
// `WorkflowDescriptor`s (§9) rather than inferred from function registration
// order.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::discovery::DiscoveryEngine;
use crate::exchange::ExchangeClient;
use crate::persistence::Store;
use crate::scheduler::events::{
    Event, NewListingDiscovered, SymbolRecheckNeeded, TargetReadyEvent, DEFAULT_ATTEMPT,
    MAX_RECHECK_ATTEMPTS,
};

/// A trigger this workflow responds to — either a cron schedule or a named
/// event on the in-process bus.
#[derive(Debug, Clone)]
pub enum Trigger {
    Cron(&'static str),
    Event(&'static str),
}

/// Declarative description of a workflow: which triggers fire it, and the
/// named steps it executes. The steps are documentation here (the actual
/// sequencing lives in `run_calendar_poll` / `run_symbol_recheck`), kept
/// alongside the descriptor so the registry in `scheduler::mod` can report
/// them without re-deriving the step list from code.
#[derive(Debug, Clone)]
pub struct WorkflowDescriptor {
    pub id: &'static str,
    pub triggers: &'static [Trigger],
    pub steps: &'static [&'static str],
}

pub const CALENDAR_POLL_WORKFLOW: WorkflowDescriptor = WorkflowDescriptor {
    id: "poll-calendar",
    triggers: &[
        Trigger::Cron("*/5 * * * *"),
        Trigger::Event(crate::scheduler::events::ADMIN_CALENDAR_POLL_REQUESTED),
    ],
    steps: &[
        "run-calendar-discovery",
        "process-discovery-results",
        "send-follow-up-events",
        "log-results",
    ],
};

pub const SYMBOL_RECHECK_WORKFLOW: WorkflowDescriptor = WorkflowDescriptor {
    id: "watch-symbol",
    triggers: &[
        Trigger::Event(crate::scheduler::events::NEW_LISTING_DISCOVERED),
        Trigger::Event(crate::scheduler::events::SYMBOL_RECHECK_NEEDED),
    ],
    steps: &["check-symbol-status", "process-symbol-status"],
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarPollOutcome {
    pub status: String,
    pub trigger: String,
    pub new_listings: usize,
    pub ready_targets: usize,
    pub scheduled_targets: usize,
    pub errors: Vec<String>,
    pub follow_up_events_sent: usize,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Run the calendar poll workflow: discover, then fan out a
/// `NewListingDiscovered` event per newly-created listing so the recheck
/// workflow picks each of them up independently.
pub async fn run_calendar_poll(
    engine: &DiscoveryEngine,
    store: &Arc<dyn Store>,
    trigger: &str,
    bus: &mpsc::Sender<Event>,
) -> CalendarPollOutcome {
    // Step: run-calendar-discovery
    let cycle = engine.discover_cycle().await;

    // Step: process-discovery-results
    let follow_ups = if cycle.new_listings > 0 {
        match store.list_monitoring().await {
            Ok(listings) => {
                let take = cycle.new_listings.min(listings.len());
                listings[listings.len() - take..]
                    .iter()
                    .map(|listing| {
                        Event::NewListingDiscovered(NewListingDiscovered {
                            vcoin_id: listing.vcoin_id.clone(),
                            symbol_name: listing.symbol_name.clone(),
                            project_name: listing.project_name.clone(),
                            launch_time: listing.announced_launch_utc,
                        })
                    })
                    .collect::<Vec<_>>()
            }
            Err(e) => {
                warn!(error = %e, "failed to load newly-monitored listings for follow-up events");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    // Step: send-follow-up-events
    let mut sent = 0usize;
    for event in follow_ups {
        if bus.send(event).await.is_ok() {
            sent += 1;
        } else {
            warn!("failed to publish follow-up event — event bus receiver dropped");
        }
    }

    // Step: log-results
    info!(
        trigger,
        new_listings = cycle.new_listings,
        ready_targets = cycle.ready_targets,
        scheduled_targets = cycle.scheduled_targets,
        errors = cycle.errors.len(),
        follow_up_events_sent = sent,
        "calendar poll workflow complete"
    );

    CalendarPollOutcome {
        status: if cycle.errors.is_empty() { "success".into() } else { "partial".into() },
        trigger: trigger.to_string(),
        new_listings: cycle.new_listings,
        ready_targets: cycle.ready_targets,
        scheduled_targets: cycle.scheduled_targets,
        errors: cycle.errors,
        follow_up_events_sent: sent,
        timestamp: Utc::now(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecheckOutcome {
    pub vcoin_id: String,
    pub attempt: u32,
    pub symbol_ready: bool,
    pub target_created: bool,
    pub next_check_scheduled: bool,
}

/// Run the per-symbol recheck workflow for one `vcoin_id` at a given
/// attempt count. Schedules its own continuation via `bus` when the symbol
/// isn't ready yet and the attempt budget isn't exhausted (§4.E).
pub async fn run_symbol_recheck(
    engine: &DiscoveryEngine,
    exchange: &Arc<ExchangeClient>,
    vcoin_id: &str,
    attempt: u32,
    bus: &mpsc::Sender<Event>,
) -> SymbolRecheckOutcome {
    // Step: check-symbol-status
    let ready_symbol = match exchange.get_symbols(Some(vcoin_id)).await {
        Ok(symbols) => symbols
            .into_iter()
            .find(|s| s.matches_ready(crate::types::READY_STATE_PATTERN)),
        Err(e) => {
            warn!(vcoin_id, error = %e, "failed to fetch symbol status during recheck");
            None
        }
    };

    // Step: process-symbol-status
    let Some(symbol) = ready_symbol else {
        if attempt < MAX_RECHECK_ATTEMPTS {
            let next_attempt = attempt + 1;
            let scheduled = bus
                .send(Event::SymbolRecheckNeeded(SymbolRecheckNeeded {
                    vcoin_id: vcoin_id.to_string(),
                    attempt: next_attempt,
                }))
                .await
                .is_ok();
            return SymbolRecheckOutcome {
                vcoin_id: vcoin_id.to_string(),
                attempt,
                symbol_ready: false,
                target_created: false,
                next_check_scheduled: scheduled,
            };
        }

        warn!(vcoin_id, attempt, "max recheck attempts reached — giving up");
        return SymbolRecheckOutcome {
            vcoin_id: vcoin_id.to_string(),
            attempt,
            symbol_ready: false,
            target_created: false,
            next_check_scheduled: false,
        };
    };

    if !symbol.has_complete_data() {
        warn!(vcoin_id, "symbol reached ready state but data is incomplete");
        return SymbolRecheckOutcome {
            vcoin_id: vcoin_id.to_string(),
            attempt,
            symbol_ready: true,
            target_created: false,
            next_check_scheduled: false,
        };
    }

    let target = match engine.try_create_ready_target(vcoin_id, &symbol).await {
        Ok(target) => target,
        Err(e) => {
            warn!(vcoin_id, error = %e, "failed to create ready target during recheck");
            None
        }
    };

    if let Some(target) = target {
        let _ = bus
            .send(Event::TargetReady(TargetReadyEvent {
                target_id: target.id,
                vcoin_id: vcoin_id.to_string(),
                launch_time_utc_iso: target.actual_launch_utc.to_rfc3339(),
            }))
            .await;

        return SymbolRecheckOutcome {
            vcoin_id: vcoin_id.to_string(),
            attempt,
            symbol_ready: true,
            target_created: true,
            next_check_scheduled: false,
        };
    }

    SymbolRecheckOutcome {
        vcoin_id: vcoin_id.to_string(),
        attempt,
        symbol_ready: true,
        target_created: false,
        next_check_scheduled: false,
    }
}

/// Starting attempt used when a recheck chain is kicked off from a fresh
/// `NewListingDiscovered` event rather than a prior `SymbolRecheckNeeded`.
pub fn initial_attempt() -> u32 {
    DEFAULT_ATTEMPT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, TtlConfig};
    use crate::config::Config;
    use crate::persistence::memory::MemoryStore;

    fn harness() -> (DiscoveryEngine, Arc<ExchangeClient>, Arc<dyn Store>) {
        let config = Config::default();
        let cache = Arc::new(Cache::new(None, TtlConfig::from_config(&config)));
        let exchange = Arc::new(ExchangeClient::new(&config, cache, None, None));
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let engine = DiscoveryEngine::new(store.clone(), exchange.clone(), &config);
        (engine, exchange, store)
    }

    #[tokio::test]
    async fn calendar_poll_with_no_upstream_reports_partial() {
        let (engine, _exchange, store) = harness();
        let (tx, _rx) = mpsc::channel(16);

        let outcome = run_calendar_poll(&engine, &store, "manual", &tx).await;
        assert_eq!(outcome.trigger, "manual");
        assert_eq!(outcome.status, "partial");
    }

    #[tokio::test]
    async fn recheck_not_ready_schedules_continuation() {
        let (engine, exchange, _store) = harness();
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = run_symbol_recheck(&engine, &exchange, "UNKNOWN", 3, &tx).await;
        assert!(!outcome.symbol_ready);
        assert!(outcome.next_check_scheduled);

        match rx.recv().await {
            Some(Event::SymbolRecheckNeeded(e)) => {
                assert_eq!(e.vcoin_id, "UNKNOWN");
                assert_eq!(e.attempt, 4);
            }
            other => panic!("expected SymbolRecheckNeeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recheck_at_attempt_budget_gives_up() {
        let (engine, exchange, _store) = harness();
        let (tx, _rx) = mpsc::channel(16);

        let outcome = run_symbol_recheck(&engine, &exchange, "UNKNOWN", MAX_RECHECK_ATTEMPTS, &tx).await;
        assert!(!outcome.next_check_scheduled);
    }
}
