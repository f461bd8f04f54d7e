// =============================================================================
// Shared types used across the discovery engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `(sts, st, tt)` triple that marks a symbol ready for trading.
pub const READY_STATE_PATTERN: (i32, i32, i32) = (2, 2, 4);

/// A calendar announcement as returned by the upstream calendar feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub vcoin_id: String,
    pub symbol: String,
    pub project_name: String,
    pub first_open_time_ms: i64,
}

impl CalendarEntry {
    pub fn launch_time(&self) -> DateTime<Utc> {
        epoch_ms_to_utc(self.first_open_time_ms)
    }
}

/// A symbol-metadata record as returned by the upstream symbol-v2 feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    #[serde(rename = "cd")]
    pub vcoin_id: String,
    #[serde(rename = "ca", default)]
    pub contract: Option<String>,
    #[serde(rename = "ps", default)]
    pub price_scale: Option<i32>,
    #[serde(rename = "qs", default)]
    pub qty_scale: Option<i32>,
    #[serde(rename = "ot", default)]
    pub open_time_ms: Option<i64>,
    pub sts: i32,
    pub st: i32,
    pub tt: i32,
}

impl SymbolRecord {
    pub fn matches_ready(&self, pattern: (i32, i32, i32)) -> bool {
        (self.sts, self.st, self.tt) == pattern
    }

    pub fn has_complete_data(&self) -> bool {
        self.contract.is_some()
            && self.price_scale.is_some()
            && self.qty_scale.is_some()
            && self.open_time_ms.is_some()
    }
}

pub fn epoch_ms_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

/// Lifecycle status of a Monitored Listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Monitoring,
    Ready,
    Scheduled,
    ExecutedSuccess,
    ExecutedFailed,
    Missed,
    Error,
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::Monitoring
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Monitoring => "monitoring",
            Self::Ready => "ready",
            Self::Scheduled => "scheduled",
            Self::ExecutedSuccess => "executed_success",
            Self::ExecutedFailed => "executed_failed",
            Self::Missed => "missed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Execution status of a Snipe Target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Scheduled,
    Executing,
    Success,
    Failed,
    Cancelled,
    Missed,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

/// Category of an Execution History row, appended by the (out-of-scope)
/// execution collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Snipe,
    Manual,
    Test,
}

impl std::fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Snipe => "snipe",
            Self::Manual => "manual",
            Self::Test => "test",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_pattern_matches_exact_triple() {
        let rec = SymbolRecord {
            vcoin_id: "A".into(),
            contract: Some("AUSDT".into()),
            price_scale: Some(8),
            qty_scale: Some(6),
            open_time_ms: Some(0),
            sts: 2,
            st: 2,
            tt: 4,
        };
        assert!(rec.matches_ready(READY_STATE_PATTERN));
        assert!(rec.has_complete_data());
    }

    #[test]
    fn incomplete_data_detected() {
        let rec = SymbolRecord {
            vcoin_id: "A".into(),
            contract: None,
            price_scale: Some(8),
            qty_scale: Some(6),
            open_time_ms: Some(0),
            sts: 2,
            st: 2,
            tt: 4,
        };
        assert!(!rec.has_complete_data());
    }

    #[test]
    fn default_listing_status_is_monitoring() {
        assert_eq!(ListingStatus::default(), ListingStatus::Monitoring);
    }
}
