// =============================================================================
// Internal event bus contract
// =============================================================================
//
// Event names are part of the contract (§6): they are stable strings a
// downstream collaborator could subscribe to, even though delivery in this
// implementation is an in-process channel rather than an external bus.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ADMIN_CALENDAR_POLL_REQUESTED: &str = "admin.calendar.poll.requested";
pub const NEW_LISTING_DISCOVERED: &str = "mexc.new_listing_discovered";
pub const SYMBOL_RECHECK_NEEDED: &str = "mexc.symbol_recheck_needed";
pub const TARGET_READY: &str = "mexc.target_ready";

/// Default starting attempt for a freshly discovered listing's recheck chain.
pub const DEFAULT_ATTEMPT: u32 = 1;
/// Attempt budget for the per-symbol recheck workflow (§4.E).
pub const MAX_RECHECK_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarPollRequested {
    pub triggered_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListingDiscovered {
    pub vcoin_id: String,
    pub symbol_name: String,
    pub project_name: String,
    pub launch_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecheckNeeded {
    pub vcoin_id: String,
    pub attempt: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReadyEvent {
    pub target_id: i32,
    pub vcoin_id: String,
    pub launch_time_utc_iso: String,
}

/// The set of events the scheduler's in-process bus carries. Each variant
/// corresponds to one of the named events above.
#[derive(Debug, Clone)]
pub enum Event {
    CalendarPollRequested(CalendarPollRequested),
    NewListingDiscovered(NewListingDiscovered),
    SymbolRecheckNeeded(SymbolRecheckNeeded),
    TargetReady(TargetReadyEvent),
}
