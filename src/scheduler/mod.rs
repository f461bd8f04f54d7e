// =============================================================================
// Durable Work Scheduler
// =============================================================================
//
// Drives the two workflows in `workflows` from two sources: a cron-evaluated
// calendar poll, and an in-process event bus carrying the workflow follow-up
// events (`NewListingDiscovered`, `SymbolRecheckNeeded`, `TargetReady`, and
// the manually-triggerable `CalendarPollRequested`). There is no external
// durable queue — delivery is at-most-once for the lifetime of the process,
// which is acceptable because every workflow step is itself idempotent
// (§4.C, §5).
// =============================================================================

pub mod cron;
pub mod events;
pub mod workflows;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discovery::DiscoveryEngine;
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::persistence::Store;

use cron::CronSchedule;
use events::Event;
use workflows::{run_calendar_poll, run_symbol_recheck, CALENDAR_POLL_WORKFLOW, SYMBOL_RECHECK_WORKFLOW};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const CRON_TICK_INTERVAL: Duration = Duration::from_secs(30);

pub struct Scheduler {
    engine: Arc<DiscoveryEngine>,
    exchange: Arc<ExchangeClient>,
    store: Arc<dyn Store>,
    calendar_poll_cron: CronSchedule,
    calendar_poll_cron_expr: String,
    bus_tx: mpsc::Sender<Event>,
    bus_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Event>>>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<DiscoveryEngine>,
        exchange: Arc<ExchangeClient>,
        store: Arc<dyn Store>,
        config: &Config,
    ) -> Result<Self> {
        let calendar_poll_cron = CronSchedule::parse(&config.calendar_poll_cron)?;
        let (bus_tx, bus_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            workflows = ?[CALENDAR_POLL_WORKFLOW.id, SYMBOL_RECHECK_WORKFLOW.id],
            "scheduler registered workflows"
        );

        Ok(Self {
            engine,
            exchange,
            store,
            calendar_poll_cron,
            calendar_poll_cron_expr: config.calendar_poll_cron.clone(),
            bus_tx,
            bus_rx: tokio::sync::Mutex::new(Some(bus_rx)),
        })
    }

    /// A manual trigger collaborator (out of scope here) may call this to
    /// request an immediate calendar poll, equivalent to the
    /// `admin.calendar.poll.requested` event.
    pub async fn request_calendar_poll(&self) -> bool {
        self.bus_tx
            .send(Event::CalendarPollRequested(events::CalendarPollRequested {
                triggered_by: "manual".into(),
                timestamp: chrono::Utc::now(),
            }))
            .await
            .is_ok()
    }

    /// Run both the cron-driven poll loop and the event-consumer loop until
    /// `shutdown` fires. Consumes the bus receiver — must only be called
    /// once.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let mut receiver = match self.bus_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                error!("scheduler run() called more than once");
                return;
            }
        };

        let cron_shutdown = shutdown.clone();
        let cron_loop = self.run_cron_loop(cron_shutdown);
        let event_loop = self.run_event_loop(&mut receiver, shutdown);

        tokio::join!(cron_loop, event_loop);
    }

    async fn run_cron_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(cron = %self.calendar_poll_cron_expr(), "cron loop starting");
        let mut last_fired_minute: Option<i64> = None;

        while !*shutdown.borrow() {
            let now = chrono::Utc::now();
            let minute_bucket = now.timestamp() / 60;

            if self.calendar_poll_cron.matches(now) && last_fired_minute != Some(minute_bucket) {
                last_fired_minute = Some(minute_bucket);
                let outcome = run_calendar_poll(&self.engine, &self.store, "cron", &self.bus_tx).await;
                if !outcome.errors.is_empty() {
                    warn!(errors = ?outcome.errors, "cron-triggered calendar poll reported errors");
                }
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(CRON_TICK_INTERVAL) => {}
            }
        }

        info!("cron loop shutting down");
    }

    async fn run_event_loop(&self, receiver: &mut mpsc::Receiver<Event>, mut shutdown: watch::Receiver<bool>) {
        info!("event loop starting");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = receiver.recv() => {
                    match event {
                        Some(event) => self.dispatch(event).await,
                        None => {
                            warn!("event bus closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!("event loop shutting down");
    }

    async fn dispatch(&self, event: Event) {
        match event {
            Event::CalendarPollRequested(req) => {
                let outcome = run_calendar_poll(&self.engine, &self.store, &req.triggered_by, &self.bus_tx).await;
                if !outcome.errors.is_empty() {
                    warn!(errors = ?outcome.errors, "manually-triggered calendar poll reported errors");
                }
            }
            Event::NewListingDiscovered(listing) => {
                run_symbol_recheck(
                    &self.engine,
                    &self.exchange,
                    &listing.vcoin_id,
                    workflows::initial_attempt(),
                    &self.bus_tx,
                )
                .await;
            }
            Event::SymbolRecheckNeeded(recheck) => {
                run_symbol_recheck(&self.engine, &self.exchange, &recheck.vcoin_id, recheck.attempt, &self.bus_tx)
                    .await;
            }
            Event::TargetReady(ready) => {
                info!(vcoin_id = %ready.vcoin_id, target_id = ready.target_id, "target ready for execution");
            }
        }
    }

    fn calendar_poll_cron_expr(&self) -> &str {
        &self.calendar_poll_cron_expr
    }
}
