pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;

pub use models::{HistoryEntry, Listing, NewHistoryEntry, NewListing, NewTarget, Target};

use async_trait::async_trait;

use crate::error::Result;

/// Durable store for monitored listings, snipe targets, and execution
/// history. Every operation is by-id or by-unique-key; there are no ad-hoc
/// queries in the core (§4.C).
///
/// Uniqueness of `vcoin_id` on listings and on targets is enforced by the
/// implementation; a losing concurrent creator must return `Ok` with the
/// pre-existing row rather than surfacing a conflict error, matching the
/// "conflicting creator treats it as already-exists" policy.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_listing_by_vcoin(&self, vcoin_id: &str) -> Result<Option<Listing>>;

    /// Create a listing. If one already exists for `vcoin_id`, returns the
    /// existing row rather than an error (idempotent creator).
    async fn create_listing(&self, new: NewListing) -> Result<Listing>;

    async fn list_monitoring(&self) -> Result<Vec<Listing>>;

    async fn update_listing_status(&self, vcoin_id: &str, status: crate::types::ListingStatus) -> Result<()>;

    async fn get_target_by_vcoin(&self, vcoin_id: &str) -> Result<Option<Target>>;

    async fn get_target_by_id(&self, id: i32) -> Result<Option<Target>>;

    /// Create a target. Fails with `Error::DbConflict` if one already exists
    /// for this `vcoin_id` — the PDE's ready-target policy treats that as
    /// "another actor already created it" and aborts cleanly.
    async fn create_target(&self, new: NewTarget) -> Result<Target>;

    async fn update_target_status(
        &self,
        id: i32,
        status: crate::types::ExecutionStatus,
        response: Option<serde_json::Value>,
        executed_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()>;

    async fn list_pending_targets(&self) -> Result<Vec<Target>>;

    async fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry>;
}
