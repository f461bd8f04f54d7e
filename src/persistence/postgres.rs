use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::error::{Error, Result};
use crate::persistence::models::{HistoryEntry, Listing, NewHistoryEntry, NewListing, NewTarget, Target};
use crate::persistence::schema::{execution_history, listings, targets};
use crate::persistence::Store;
use crate::types::{ExecutionStatus, ListingStatus};

pub type DbPool = Pool<AsyncPgConnection>;

/// Postgres-backed implementation of [`Store`], pooled via `bb8`.
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| Error::DbUnavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.map_err(Error::from)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_listing_by_vcoin(&self, vcoin_id: &str) -> Result<Option<Listing>> {
        let mut conn = self.conn().await?;
        Ok(Listing::find_by_vcoin(&mut conn, vcoin_id).await?)
    }

    async fn create_listing(&self, new: NewListing) -> Result<Listing> {
        let mut conn = self.conn().await?;

        if let Some(existing) = Listing::find_by_vcoin(&mut conn, &new.vcoin_id).await? {
            return Ok(existing);
        }

        let result = diesel::insert_into(listings::table)
            .values(&new)
            .get_result(&mut conn)
            .await;

        match result {
            Ok(listing) => Ok(listing),
            Err(diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)) => {
                // Lost the creation race — the winner's row is the source of truth.
                Listing::find_by_vcoin(&mut conn, &new.vcoin_id)
                    .await?
                    .ok_or_else(|| Error::Internal("listing vanished after unique violation".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_monitoring(&self) -> Result<Vec<Listing>> {
        let mut conn = self.conn().await?;
        Ok(Listing::list_monitoring(&mut conn).await?)
    }

    async fn update_listing_status(&self, vcoin_id: &str, status: ListingStatus) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(listings::table.filter(listings::vcoin_id.eq(vcoin_id)))
            .set((
                listings::status.eq(status.to_string()),
                listings::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_target_by_vcoin(&self, vcoin_id: &str) -> Result<Option<Target>> {
        let mut conn = self.conn().await?;
        Ok(Target::find_by_vcoin(&mut conn, vcoin_id).await?)
    }

    async fn get_target_by_id(&self, id: i32) -> Result<Option<Target>> {
        let mut conn = self.conn().await?;
        Ok(Target::find_by_id(&mut conn, id).await?)
    }

    async fn create_target(&self, new: NewTarget) -> Result<Target> {
        let mut conn = self.conn().await?;

        if Target::find_by_vcoin(&mut conn, &new.vcoin_id).await?.is_some() {
            return Err(Error::DbConflict(format!(
                "target already exists for vcoin_id {}",
                new.vcoin_id
            )));
        }

        diesel::insert_into(targets::table)
            .values(&new)
            .get_result(&mut conn)
            .await
            .map_err(Error::from)
    }

    async fn update_target_status(
        &self,
        id: i32,
        status: ExecutionStatus,
        response: Option<serde_json::Value>,
        executed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(targets::table.find(id))
            .set((
                targets::execution_status.eq(status.to_string()),
                targets::execution_response.eq(response),
                targets::executed_at_utc.eq(executed_at),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_pending_targets(&self) -> Result<Vec<Target>> {
        let mut conn = self.conn().await?;
        Ok(Target::list_pending(&mut conn).await?)
    }

    async fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let mut conn = self.conn().await?;
        diesel::insert_into(execution_history::table)
            .values(&entry)
            .get_result(&mut conn)
            .await
            .map_err(Error::from)
    }
}
