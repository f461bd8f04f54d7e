use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::persistence::schema::{execution_history, listings, targets};
use crate::types::{ExecutionStatus, ExecutionType, ListingStatus};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = listings)]
#[diesel(primary_key(vcoin_id))]
pub struct Listing {
    pub vcoin_id: String,
    pub symbol_name: String,
    pub project_name: String,
    pub announced_launch_time_ms: i64,
    pub announced_launch_utc: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn status(&self) -> ListingStatus {
        parse_listing_status(&self.status)
    }

    pub async fn find_by_vcoin(
        conn: &mut diesel_async::AsyncPgConnection,
        vcoin_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        listings::table
            .find(vcoin_id)
            .first(conn)
            .await
            .optional()
    }

    pub async fn list_monitoring(
        conn: &mut diesel_async::AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        listings::table
            .filter(listings::status.eq(ListingStatus::Monitoring.to_string()))
            .load(conn)
            .await
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = listings)]
pub struct NewListing {
    pub vcoin_id: String,
    pub symbol_name: String,
    pub project_name: String,
    pub announced_launch_time_ms: i64,
    pub announced_launch_utc: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewListing {
    pub fn from_calendar_entry(entry: &crate::types::CalendarEntry, now: DateTime<Utc>) -> Self {
        Self {
            vcoin_id: entry.vcoin_id.clone(),
            symbol_name: entry.symbol.clone(),
            project_name: entry.project_name.clone(),
            announced_launch_time_ms: entry.first_open_time_ms,
            announced_launch_utc: entry.launch_time(),
            status: ListingStatus::Monitoring.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = targets)]
pub struct Target {
    pub id: i32,
    pub vcoin_id: String,
    pub contract: String,
    pub price_precision: i32,
    pub qty_precision: i32,
    pub actual_launch_time_ms: i64,
    pub actual_launch_utc: DateTime<Utc>,
    pub discovered_at_utc: DateTime<Utc>,
    pub hours_advance_notice: f64,
    pub intended_buy_amount_quote: f64,
    pub order_params: serde_json::Value,
    pub execution_status: String,
    pub execution_response: Option<serde_json::Value>,
    pub executed_at_utc: Option<DateTime<Utc>>,
}

impl Target {
    pub fn execution_status(&self) -> ExecutionStatus {
        parse_execution_status(&self.execution_status)
    }

    pub async fn find_by_vcoin(
        conn: &mut diesel_async::AsyncPgConnection,
        vcoin_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        targets::table
            .filter(targets::vcoin_id.eq(vcoin_id))
            .first(conn)
            .await
            .optional()
    }

    pub async fn find_by_id(
        conn: &mut diesel_async::AsyncPgConnection,
        id: i32,
    ) -> Result<Option<Self>, diesel::result::Error> {
        targets::table.find(id).first(conn).await.optional()
    }

    pub async fn list_pending(
        conn: &mut diesel_async::AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        targets::table
            .filter(
                targets::execution_status
                    .eq(ExecutionStatus::Pending.to_string())
                    .or(targets::execution_status.eq(ExecutionStatus::Scheduled.to_string())),
            )
            .load(conn)
            .await
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = targets)]
pub struct NewTarget {
    pub vcoin_id: String,
    pub contract: String,
    pub price_precision: i32,
    pub qty_precision: i32,
    pub actual_launch_time_ms: i64,
    pub actual_launch_utc: DateTime<Utc>,
    pub discovered_at_utc: DateTime<Utc>,
    pub hours_advance_notice: f64,
    pub intended_buy_amount_quote: f64,
    pub order_params: serde_json::Value,
    pub execution_status: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = execution_history)]
pub struct HistoryEntry {
    pub id: i32,
    pub vcoin_id: String,
    pub contract: String,
    pub execution_timestamp_utc: DateTime<Utc>,
    pub execution_type: String,
    pub buy_amount_quote: f64,
    pub success: bool,
    pub order_id: Option<String>,
    pub filled_qty: Option<f64>,
    pub avg_price: Option<f64>,
    pub total_cost_quote: Option<f64>,
    pub duration_ms: Option<i64>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = execution_history)]
pub struct NewHistoryEntry {
    pub vcoin_id: String,
    pub contract: String,
    pub execution_timestamp_utc: DateTime<Utc>,
    pub execution_type: String,
    pub buy_amount_quote: f64,
    pub success: bool,
    pub order_id: Option<String>,
    pub filled_qty: Option<f64>,
    pub avg_price: Option<f64>,
    pub total_cost_quote: Option<f64>,
    pub duration_ms: Option<i64>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl NewHistoryEntry {
    pub fn execution_type_enum(&self) -> ExecutionType {
        match self.execution_type.as_str() {
            "manual" => ExecutionType::Manual,
            "test" => ExecutionType::Test,
            _ => ExecutionType::Snipe,
        }
    }
}

fn parse_listing_status(s: &str) -> ListingStatus {
    match s {
        "ready" => ListingStatus::Ready,
        "scheduled" => ListingStatus::Scheduled,
        "executed_success" => ListingStatus::ExecutedSuccess,
        "executed_failed" => ListingStatus::ExecutedFailed,
        "missed" => ListingStatus::Missed,
        "error" => ListingStatus::Error,
        _ => ListingStatus::Monitoring,
    }
}

fn parse_execution_status(s: &str) -> ExecutionStatus {
    match s {
        "scheduled" => ExecutionStatus::Scheduled,
        "executing" => ExecutionStatus::Executing,
        "success" => ExecutionStatus::Success,
        "failed" => ExecutionStatus::Failed,
        "cancelled" => ExecutionStatus::Cancelled,
        "missed" => ExecutionStatus::Missed,
        _ => ExecutionStatus::Pending,
    }
}
