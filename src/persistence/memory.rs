// =============================================================================
// In-process fallback store — used when DATABASE_URL is unset
// =============================================================================
//
// Mirrors the Cache's "degrade gracefully, never refuse to start" posture:
// the rest of the system never special-cases "no database configured". Not
// durable across restarts.
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::persistence::models::{HistoryEntry, Listing, NewHistoryEntry, NewListing, NewTarget, Target};
use crate::persistence::Store;
use crate::types::{ExecutionStatus, ListingStatus};

#[derive(Default)]
struct Inner {
    listings: HashMap<String, Listing>,
    targets_by_vcoin: HashMap<String, i32>,
    targets: HashMap<i32, Target>,
    history: Vec<HistoryEntry>,
    next_target_id: i32,
    next_history_id: i32,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_target_id: 1,
                next_history_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_listing_by_vcoin(&self, vcoin_id: &str) -> Result<Option<Listing>> {
        Ok(self.inner.read().listings.get(vcoin_id).cloned())
    }

    async fn create_listing(&self, new: NewListing) -> Result<Listing> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.listings.get(&new.vcoin_id) {
            return Ok(existing.clone());
        }
        let listing = Listing {
            vcoin_id: new.vcoin_id.clone(),
            symbol_name: new.symbol_name,
            project_name: new.project_name,
            announced_launch_time_ms: new.announced_launch_time_ms,
            announced_launch_utc: new.announced_launch_utc,
            status: new.status,
            created_at: new.created_at,
            updated_at: new.updated_at,
        };
        inner.listings.insert(new.vcoin_id, listing.clone());
        Ok(listing)
    }

    async fn list_monitoring(&self) -> Result<Vec<Listing>> {
        Ok(self
            .inner
            .read()
            .listings
            .values()
            .filter(|l| l.status() == ListingStatus::Monitoring)
            .cloned()
            .collect())
    }

    async fn update_listing_status(&self, vcoin_id: &str, status: ListingStatus) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.listings.get_mut(vcoin_id) {
            Some(listing) => {
                listing.status = status.to_string();
                listing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(Error::Validation(format!("no listing for vcoin_id {vcoin_id}"))),
        }
    }

    async fn get_target_by_vcoin(&self, vcoin_id: &str) -> Result<Option<Target>> {
        let inner = self.inner.read();
        Ok(inner
            .targets_by_vcoin
            .get(vcoin_id)
            .and_then(|id| inner.targets.get(id))
            .cloned())
    }

    async fn get_target_by_id(&self, id: i32) -> Result<Option<Target>> {
        Ok(self.inner.read().targets.get(&id).cloned())
    }

    async fn create_target(&self, new: NewTarget) -> Result<Target> {
        let mut inner = self.inner.write();
        if inner.targets_by_vcoin.contains_key(&new.vcoin_id) {
            return Err(Error::DbConflict(format!(
                "target already exists for vcoin_id {}",
                new.vcoin_id
            )));
        }

        let id = inner.next_target_id;
        inner.next_target_id += 1;

        let target = Target {
            id,
            vcoin_id: new.vcoin_id.clone(),
            contract: new.contract,
            price_precision: new.price_precision,
            qty_precision: new.qty_precision,
            actual_launch_time_ms: new.actual_launch_time_ms,
            actual_launch_utc: new.actual_launch_utc,
            discovered_at_utc: new.discovered_at_utc,
            hours_advance_notice: new.hours_advance_notice,
            intended_buy_amount_quote: new.intended_buy_amount_quote,
            order_params: new.order_params,
            execution_status: new.execution_status,
            execution_response: None,
            executed_at_utc: None,
        };

        inner.targets_by_vcoin.insert(new.vcoin_id, id);
        inner.targets.insert(id, target.clone());
        Ok(target)
    }

    async fn update_target_status(
        &self,
        id: i32,
        status: ExecutionStatus,
        response: Option<serde_json::Value>,
        executed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.targets.get_mut(&id) {
            Some(target) => {
                target.execution_status = status.to_string();
                target.execution_response = response;
                target.executed_at_utc = executed_at;
                Ok(())
            }
            None => Err(Error::Validation(format!("no target with id {id}"))),
        }
    }

    async fn list_pending_targets(&self) -> Result<Vec<Target>> {
        Ok(self
            .inner
            .read()
            .targets
            .values()
            .filter(|t| {
                matches!(
                    t.execution_status(),
                    ExecutionStatus::Pending | ExecutionStatus::Scheduled
                )
            })
            .cloned()
            .collect())
    }

    async fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let mut inner = self.inner.write();
        let id = inner.next_history_id;
        inner.next_history_id += 1;

        let row = HistoryEntry {
            id,
            vcoin_id: entry.vcoin_id,
            contract: entry.contract,
            execution_timestamp_utc: entry.execution_timestamp_utc,
            execution_type: entry.execution_type,
            buy_amount_quote: entry.buy_amount_quote,
            success: entry.success,
            order_id: entry.order_id,
            filled_qty: entry.filled_qty,
            avg_price: entry.avg_price,
            total_cost_quote: entry.total_cost_quote,
            duration_ms: entry.duration_ms,
            error_kind: entry.error_kind,
            error_message: entry.error_message,
        };
        inner.history.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CalendarEntry;

    fn sample_listing() -> NewListing {
        let entry = CalendarEntry {
            vcoin_id: "A".into(),
            symbol: "AUSDT".into(),
            project_name: "Alpha".into(),
            first_open_time_ms: 1_700_000_000_000,
        };
        NewListing::from_calendar_entry(&entry, Utc::now())
    }

    #[tokio::test]
    async fn create_listing_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.create_listing(sample_listing()).await.unwrap();
        let second = store.create_listing(sample_listing()).await.unwrap();
        assert_eq!(first.vcoin_id, second.vcoin_id);
        assert_eq!(store.list_monitoring().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_target_for_same_vcoin_conflicts() {
        let store = MemoryStore::new();
        store.create_listing(sample_listing()).await.unwrap();

        let new_target = NewTarget {
            vcoin_id: "A".into(),
            contract: "AUSDT".into(),
            price_precision: 8,
            qty_precision: 6,
            actual_launch_time_ms: 1_700_000_000_000,
            actual_launch_utc: Utc::now(),
            discovered_at_utc: Utc::now(),
            hours_advance_notice: 4.0,
            intended_buy_amount_quote: 100.0,
            order_params: serde_json::json!({"symbol": "AUSDT"}),
            execution_status: ExecutionStatus::Pending.to_string(),
        };

        store.create_target(new_target.clone()).await.unwrap();
        let conflict = store.create_target(new_target).await;
        assert!(matches!(conflict, Err(Error::DbConflict(_))));
    }
}
