//! PostgreSQL adapter for e-waste storage.
//!
//! Compound writes run in one transaction. Rows that a write depends on are
//! locked with `SELECT ... FOR UPDATE`, always item first, then request, so
//! concurrent approvals and status advances on the same item serialize on
//! the item row. Partial unique indexes back the two ledger invariants:
//! one pending request per (item, vendor) and one active claim per item.

use crate::model::{
    Approval, ApprovalOutcome, DeletedItem, ItemFilter, Rejection, RequestFilter, StatusChange,
    StatusTransition,
};
use crate::traits::{CatalogStore, ItemStore, PickupStore, QueryWindow, StatusLogStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ewaste_types::{
    Category, CategoryId, Department, DepartmentId, Disposition, Item, ItemId, ItemStatus,
    PickupCoordinates, PickupRequest, PrincipalId, RequestId, RequestStatus, StatusLogEntry,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

const ACTIVE_CLAIM_INDEX: &str = "ewaste_requests_active_claim";

const ITEM_COLUMNS: &str = "id, name, serial_number, category_id, department_id, reported_at, \
     purchase_date, status, weight_kg, disposition, price, notes, photo, reported_by";

const REQUEST_COLUMNS: &str = "id, item_id, vendor_id, reporter_id, status, requested_at, \
     approved_at, rejected_at, completed_at, vendor_notes, user_notes, pickup_location, \
     latitude, longitude";

const LOG_COLUMNS: &str = "id, item_id, from_status, to_status, remarks, changed_by, changed_at";

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresEwasteStorage {
    pool: PgPool,
    retry_attempts: u32,
}

impl PostgresEwasteStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5, 3).await
    }

    /// Connect with explicit pool and retry parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
        retry_attempts: u32,
    ) -> StorageResult<Self> {
        let options = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs));

        let mut attempt = 0;
        let pool = loop {
            match options.clone().connect(database_url).await {
                Ok(pool) => break pool,
                Err(e) => {
                    let err = map_sqlx(e);
                    if !err.is_transient() || attempt >= retry_attempts {
                        return Err(err);
                    }
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "postgres connect failed, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        };

        let store = Self {
            pool,
            retry_attempts,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self {
            pool,
            retry_attempts: 3,
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS ewaste_categories (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                description TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ewaste_departments (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ewaste_items (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                serial_number TEXT UNIQUE,
                category_id UUID NOT NULL REFERENCES ewaste_categories (id),
                department_id UUID NOT NULL REFERENCES ewaste_departments (id),
                reported_at TIMESTAMPTZ NOT NULL,
                purchase_date DATE,
                status TEXT NOT NULL,
                weight_kg DOUBLE PRECISION,
                disposition TEXT NOT NULL,
                price DOUBLE PRECISION,
                notes TEXT,
                photo TEXT,
                reported_by UUID NOT NULL,
                CONSTRAINT ewaste_items_price_iff_selling
                    CHECK ((disposition = 'selling') = (price IS NOT NULL))
            )
            "#,
            "CREATE INDEX IF NOT EXISTS ewaste_items_reported_by ON ewaste_items (reported_by)",
            r#"
            CREATE TABLE IF NOT EXISTS ewaste_pickup_requests (
                id UUID PRIMARY KEY,
                item_id UUID NOT NULL REFERENCES ewaste_items (id) ON DELETE CASCADE,
                vendor_id UUID NOT NULL,
                reporter_id UUID NOT NULL,
                status TEXT NOT NULL,
                requested_at TIMESTAMPTZ NOT NULL,
                approved_at TIMESTAMPTZ,
                rejected_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                vendor_notes TEXT,
                user_notes TEXT,
                pickup_location TEXT,
                latitude DOUBLE PRECISION,
                longitude DOUBLE PRECISION
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS ewaste_requests_pending_per_vendor
                ON ewaste_pickup_requests (item_id, vendor_id)
                WHERE status = 'pending'
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS ewaste_requests_active_claim
                ON ewaste_pickup_requests (item_id)
                WHERE status IN ('approved', 'completed')
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ewaste_status_log (
                seq BIGSERIAL PRIMARY KEY,
                id UUID NOT NULL UNIQUE,
                item_id UUID NOT NULL REFERENCES ewaste_items (id) ON DELETE CASCADE,
                from_status TEXT,
                to_status TEXT NOT NULL,
                remarks TEXT NOT NULL,
                changed_by UUID NOT NULL,
                changed_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS ewaste_status_log_item ON ewaste_status_log (item_id, changed_at DESC)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    /// Run `op`, retrying transient failures with a short backoff.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> StorageResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StorageResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if err.is_transient() && attempt < self.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "transient storage failure, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                other => return other,
            }
        }
    }

    async fn begin(&self) -> StorageResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(map_sqlx)
    }

    async fn insert_request_once(&self, request: &PickupRequest) -> StorageResult<()> {
        let mut tx = self.begin().await?;
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM ewaste_items WHERE id = $1 FOR UPDATE")
                .bind(*request.item_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        let status = status
            .ok_or_else(|| StorageError::NotFound(format!("item {} not found", request.item_id)))?;
        let status = parse_item_status(&status)?;
        if !status.is_claim_eligible() {
            return Err(StorageError::InvariantViolation(format!(
                "item {} is {} and no longer accepts pickup requests",
                request.item_id, status
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO ewaste_pickup_requests ({REQUEST_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(*request.id.as_uuid())
        .bind(*request.item_id.as_uuid())
        .bind(*request.vendor_id.as_uuid())
        .bind(*request.reporter_id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.completed_at)
        .bind(request.vendor_notes.as_deref())
        .bind(request.user_notes.as_deref())
        .bind(request.pickup_location.as_deref())
        .bind(request.pickup_coordinates.map(|c| c.latitude()))
        .bind(request.pickup_coordinates.map(|c| c.longitude()))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)
    }

    async fn approve_once(&self, approval: &Approval) -> StorageResult<ApprovalOutcome> {
        let item_id: Option<Uuid> =
            sqlx::query_scalar("SELECT item_id FROM ewaste_pickup_requests WHERE id = $1")
                .bind(*approval.request_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        let item_id = item_id.ok_or_else(|| {
            StorageError::NotFound(format!("request {} not found", approval.request_id))
        })?;

        let mut tx = self.begin().await?;
        let item = lock_item(&mut tx, item_id).await?;
        if item.status != ItemStatus::Reported {
            return Err(StorageError::InvariantViolation(format!(
                "item {} is {}, expected REPORTED",
                item.id, item.status
            )));
        }
        let request = lock_request(&mut tx, approval.request_id).await?;
        if request.status != RequestStatus::Pending {
            return Err(StorageError::InvariantViolation(format!(
                "request {} is {}, expected pending",
                request.id, request.status
            )));
        }
        let claimed: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM ewaste_pickup_requests \
             WHERE item_id = $1 AND status IN ('approved', 'completed') LIMIT 1",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        if let Some(claim) = claimed {
            return Err(StorageError::InvariantViolation(format!(
                "item {} already claimed by request {}",
                item.id,
                RequestId::from_uuid(claim)
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE ewaste_pickup_requests \
                SET status = 'approved', approved_at = $2, user_notes = $3, \
                    pickup_location = $4, latitude = $5, longitude = $6 \
              WHERE id = $1 AND status = 'pending' \
          RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(*approval.request_id.as_uuid())
        .bind(approval.approved_at)
        .bind(approval.user_notes.as_deref())
        .bind(approval.pickup_location.as_deref())
        .bind(approval.pickup_coordinates.map(|c| c.latitude()))
        .bind(approval.pickup_coordinates.map(|c| c.longitude()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| {
            StorageError::InvariantViolation(format!(
                "request {} was decided concurrently",
                approval.request_id
            ))
        })?;
        let request = request_from_row(&row)?;

        let item = set_item_status(&mut tx, item.id, ItemStatus::Reported, ItemStatus::Collected)
            .await?;
        let entry = StatusLogEntry::new(
            item.id,
            Some(ItemStatus::Reported),
            ItemStatus::Collected,
            approval.remarks.clone(),
            approval.approved_by,
            approval.approved_at,
        );
        insert_log_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(ApprovalOutcome {
            request,
            item,
            entry,
        })
    }

    async fn advance_once(&self, change: &StatusChange) -> StorageResult<StatusTransition> {
        let mut tx = self.begin().await?;
        let item = lock_item(&mut tx, *change.item_id.as_uuid()).await?;
        let claim = lock_request(&mut tx, change.claim_id).await.map_err(|e| match e {
            StorageError::NotFound(msg) => StorageError::InvariantViolation(msg),
            other => other,
        })?;
        if claim.item_id != change.item_id
            || claim.vendor_id != change.changed_by
            || !claim.is_active_claim()
        {
            return Err(StorageError::InvariantViolation(format!(
                "request {} is not an active claim of {} on item {}",
                change.claim_id, change.changed_by, change.item_id
            )));
        }
        let from = item.status;
        if !from.permits_advance_to(change.to_status) {
            return Err(StorageError::InvariantViolation(format!(
                "item {} cannot move from {} to {}",
                change.item_id, from, change.to_status
            )));
        }

        let completes = change.to_status == ItemStatus::Collected
            && claim.status == RequestStatus::Approved;
        let notes = (!change.remarks.trim().is_empty()).then_some(change.remarks.as_str());
        let row = sqlx::query(&format!(
            "UPDATE ewaste_pickup_requests \
                SET status = CASE WHEN $2 THEN 'completed' ELSE status END, \
                    completed_at = CASE WHEN $2 THEN $3 ELSE completed_at END, \
                    vendor_notes = COALESCE($4, vendor_notes) \
              WHERE id = $1 AND status IN ('approved', 'completed') \
          RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(*change.claim_id.as_uuid())
        .bind(completes)
        .bind(change.changed_at)
        .bind(notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| {
            StorageError::InvariantViolation(format!(
                "claim {} was withdrawn concurrently",
                change.claim_id
            ))
        })?;
        let claim = request_from_row(&row)?;

        let item = set_item_status(&mut tx, item.id, from, change.to_status).await?;
        let entry = StatusLogEntry::new(
            item.id,
            Some(from),
            change.to_status,
            change.remarks.clone(),
            change.changed_by,
            change.changed_at,
        );
        insert_log_entry(&mut tx, &entry).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(StatusTransition { item, claim, entry })
    }

    async fn delete_once(&self, id: &ItemId) -> StorageResult<Option<DeletedItem>> {
        let mut tx = self.begin().await?;
        let item = match lock_item(&mut tx, *id.as_uuid()).await {
            Ok(item) => item,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let requests_removed = sqlx::query("DELETE FROM ewaste_pickup_requests WHERE item_id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();
        let log_entries_removed = sqlx::query("DELETE FROM ewaste_status_log WHERE item_id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();
        sqlx::query("DELETE FROM ewaste_items WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        Ok(Some(DeletedItem {
            item,
            requests_removed: to_usize(requests_removed),
            log_entries_removed: to_usize(log_entries_removed),
        }))
    }
}

#[async_trait]
impl CatalogStore for PostgresEwasteStorage {
    async fn insert_category(&self, category: Category) -> StorageResult<()> {
        self.with_retry(|| async {
            sqlx::query(
                "INSERT INTO ewaste_categories (id, name, kind, description) VALUES ($1, $2, $3, $4)",
            )
            .bind(*category.id.as_uuid())
            .bind(&category.name)
            .bind(category.kind.as_str())
            .bind(category.description.as_deref())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(())
        })
        .await
    }

    async fn get_category(&self, id: &CategoryId) -> StorageResult<Option<Category>> {
        let row = self
            .with_retry(|| async {
                sqlx::query("SELECT id, name, kind, description FROM ewaste_categories WHERE id = $1")
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx)
            })
            .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        let rows = self
            .with_retry(|| async {
                sqlx::query("SELECT id, name, kind, description FROM ewaste_categories ORDER BY name")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx)
            })
            .await?;
        rows.iter().map(category_from_row).collect()
    }

    async fn insert_department(&self, department: Department) -> StorageResult<()> {
        self.with_retry(|| async {
            sqlx::query("INSERT INTO ewaste_departments (id, name, description) VALUES ($1, $2, $3)")
                .bind(*department.id.as_uuid())
                .bind(&department.name)
                .bind(department.description.as_deref())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(())
        })
        .await
    }

    async fn get_department(&self, id: &DepartmentId) -> StorageResult<Option<Department>> {
        let row = self
            .with_retry(|| async {
                sqlx::query("SELECT id, name, description FROM ewaste_departments WHERE id = $1")
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx)
            })
            .await?;
        row.as_ref().map(department_from_row).transpose()
    }

    async fn list_departments(&self) -> StorageResult<Vec<Department>> {
        let rows = self
            .with_retry(|| async {
                sqlx::query("SELECT id, name, description FROM ewaste_departments ORDER BY name")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx)
            })
            .await?;
        rows.iter().map(department_from_row).collect()
    }
}

#[async_trait]
impl ItemStore for PostgresEwasteStorage {
    async fn insert_item(&self, item: Item) -> StorageResult<()> {
        self.with_retry(|| async {
            sqlx::query(&format!(
                "INSERT INTO ewaste_items ({ITEM_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
            ))
            .bind(*item.id.as_uuid())
            .bind(&item.name)
            .bind(item.serial_number.as_deref())
            .bind(*item.category_id.as_uuid())
            .bind(*item.department_id.as_uuid())
            .bind(item.reported_at)
            .bind(item.purchase_date)
            .bind(item.status.as_str())
            .bind(item.weight_kg)
            .bind(item.disposition.kind())
            .bind(item.disposition.price())
            .bind(item.notes.as_deref())
            .bind(item.photo.as_deref())
            .bind(*item.reported_by.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(())
        })
        .await
    }

    async fn get_item(&self, id: &ItemId) -> StorageResult<Option<Item>> {
        let row = self
            .with_retry(|| async {
                sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM ewaste_items WHERE id = $1"))
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx)
            })
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Item>> {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
        let ids: Vec<Uuid> = filter.ids.iter().map(|id| *id.as_uuid()).collect();
        let (limit, offset) = window_bounds(window)?;
        let rows = self
            .with_retry(|| async {
                sqlx::query(&format!(
                    "SELECT {ITEM_COLUMNS} FROM ewaste_items \
                      WHERE ($1::UUID IS NULL OR reported_by = $1) \
                        AND (cardinality($2::TEXT[]) = 0 OR status = ANY($2)) \
                        AND (cardinality($3::UUID[]) = 0 OR id = ANY($3)) \
                        AND ($4::TEXT IS NULL OR photo = $4) \
                   ORDER BY reported_at DESC, id ASC \
                      LIMIT $5 OFFSET $6"
                ))
                .bind(filter.reported_by.map(|p| *p.as_uuid()))
                .bind(&statuses)
                .bind(&ids)
                .bind(filter.photo.as_deref())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)
            })
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn delete_item(&self, id: &ItemId) -> StorageResult<Option<DeletedItem>> {
        self.with_retry(|| self.delete_once(id)).await
    }
}

#[async_trait]
impl PickupStore for PostgresEwasteStorage {
    async fn insert_request(&self, request: PickupRequest) -> StorageResult<()> {
        self.with_retry(|| self.insert_request_once(&request)).await
    }

    async fn get_request(&self, id: &RequestId) -> StorageResult<Option<PickupRequest>> {
        let row = self
            .with_retry(|| async {
                sqlx::query(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM ewaste_pickup_requests WHERE id = $1"
                ))
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)
            })
            .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<PickupRequest>> {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
        let (limit, offset) = window_bounds(window)?;
        let rows = self
            .with_retry(|| async {
                sqlx::query(&format!(
                    "SELECT {REQUEST_COLUMNS} FROM ewaste_pickup_requests \
                      WHERE ($1::UUID IS NULL OR item_id = $1) \
                        AND ($2::UUID IS NULL OR vendor_id = $2) \
                        AND ($3::UUID IS NULL OR reporter_id = $3) \
                        AND (cardinality($4::TEXT[]) = 0 OR status = ANY($4)) \
                   ORDER BY requested_at DESC, id ASC \
                      LIMIT $5 OFFSET $6"
                ))
                .bind(filter.item_id.map(|id| *id.as_uuid()))
                .bind(filter.vendor_id.map(|id| *id.as_uuid()))
                .bind(filter.reporter_id.map(|id| *id.as_uuid()))
                .bind(&statuses)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)
            })
            .await?;
        rows.iter().map(request_from_row).collect()
    }

    async fn approve_request(&self, approval: Approval) -> StorageResult<ApprovalOutcome> {
        self.with_retry(|| self.approve_once(&approval)).await
    }

    async fn reject_request(&self, rejection: Rejection) -> StorageResult<PickupRequest> {
        let row = self
            .with_retry(|| async {
                sqlx::query(&format!(
                    "UPDATE ewaste_pickup_requests \
                        SET status = 'rejected', rejected_at = $2, user_notes = $3 \
                      WHERE id = $1 AND status = 'pending' \
                  RETURNING {REQUEST_COLUMNS}"
                ))
                .bind(*rejection.request_id.as_uuid())
                .bind(rejection.rejected_at)
                .bind(rejection.user_notes.as_deref())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)
            })
            .await?;
        match row {
            Some(row) => request_from_row(&row),
            None => match self.get_request(&rejection.request_id).await? {
                Some(current) => Err(StorageError::InvariantViolation(format!(
                    "request {} is {}, expected pending",
                    current.id, current.status
                ))),
                None => Err(StorageError::NotFound(format!(
                    "request {} not found",
                    rejection.request_id
                ))),
            },
        }
    }

    async fn reject_pending_for_item(
        &self,
        item_id: &ItemId,
        user_notes: Option<String>,
        rejected_at: DateTime<Utc>,
    ) -> StorageResult<Vec<PickupRequest>> {
        if self.get_item(item_id).await?.is_none() {
            return Err(StorageError::NotFound(format!("item {item_id} not found")));
        }
        let rows = self
            .with_retry(|| async {
                sqlx::query(&format!(
                    "UPDATE ewaste_pickup_requests \
                        SET status = 'rejected', rejected_at = $2, user_notes = $3 \
                      WHERE item_id = $1 AND status = 'pending' \
                  RETURNING {REQUEST_COLUMNS}"
                ))
                .bind(*item_id.as_uuid())
                .bind(rejected_at)
                .bind(user_notes.as_deref())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)
            })
            .await?;
        let mut rejected = rows
            .iter()
            .map(request_from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        rejected.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rejected)
    }
}

#[async_trait]
impl StatusLogStore for PostgresEwasteStorage {
    async fn advance_status(&self, change: StatusChange) -> StorageResult<StatusTransition> {
        self.with_retry(|| self.advance_once(&change)).await
    }

    async fn list_status_log(
        &self,
        item_id: &ItemId,
        window: QueryWindow,
    ) -> StorageResult<Vec<StatusLogEntry>> {
        let (limit, offset) = window_bounds(window)?;
        let rows = self
            .with_retry(|| async {
                sqlx::query(&format!(
                    "SELECT {LOG_COLUMNS} FROM ewaste_status_log \
                      WHERE item_id = $1 \
                   ORDER BY changed_at DESC, seq DESC \
                      LIMIT $2 OFFSET $3"
                ))
                .bind(*item_id.as_uuid())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)
            })
            .await?;
        rows.iter().map(log_entry_from_row).collect()
    }
}

async fn lock_item(tx: &mut Transaction<'static, Postgres>, id: Uuid) -> StorageResult<Item> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM ewaste_items WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx)?
    .ok_or_else(|| StorageError::NotFound(format!("item {} not found", ItemId::from_uuid(id))))?;
    item_from_row(&row)
}

async fn lock_request(
    tx: &mut Transaction<'static, Postgres>,
    id: RequestId,
) -> StorageResult<PickupRequest> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM ewaste_pickup_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(*id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx)?
    .ok_or_else(|| StorageError::NotFound(format!("request {id} not found")))?;
    request_from_row(&row)
}

async fn set_item_status(
    tx: &mut Transaction<'static, Postgres>,
    id: ItemId,
    expected: ItemStatus,
    to: ItemStatus,
) -> StorageResult<Item> {
    let row = sqlx::query(&format!(
        "UPDATE ewaste_items SET status = $3 WHERE id = $1 AND status = $2 RETURNING {ITEM_COLUMNS}"
    ))
    .bind(*id.as_uuid())
    .bind(expected.as_str())
    .bind(to.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx)?
    .ok_or_else(|| {
        StorageError::InvariantViolation(format!("item {id} left {expected} concurrently"))
    })?;
    item_from_row(&row)
}

async fn insert_log_entry(
    tx: &mut Transaction<'static, Postgres>,
    entry: &StatusLogEntry,
) -> StorageResult<()> {
    sqlx::query(&format!(
        "INSERT INTO ewaste_status_log ({LOG_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    ))
    .bind(*entry.id.as_uuid())
    .bind(*entry.item_id.as_uuid())
    .bind(entry.from_status.map(ItemStatus::as_str))
    .bind(entry.to_status.as_str())
    .bind(&entry.remarks)
    .bind(*entry.changed_by.as_uuid())
    .bind(entry.changed_at)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

fn category_from_row(row: &PgRow) -> StorageResult<Category> {
    let kind: String = get(row, "kind")?;
    Ok(Category {
        id: CategoryId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        kind: kind
            .parse()
            .map_err(|e: ewaste_types::ParseError| StorageError::Serialization(e.to_string()))?,
        description: get(row, "description")?,
    })
}

fn department_from_row(row: &PgRow) -> StorageResult<Department> {
    Ok(Department {
        id: DepartmentId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
    })
}

fn item_from_row(row: &PgRow) -> StorageResult<Item> {
    let disposition: String = get(row, "disposition")?;
    let price: Option<f64> = get(row, "price")?;
    let disposition = match (disposition.as_str(), price) {
        ("selling", Some(price)) => Disposition::Selling { price },
        ("disposed", None) => Disposition::Disposed,
        (other, price) => {
            return Err(StorageError::Serialization(format!(
                "inconsistent disposition '{other}' with price {price:?}"
            )))
        }
    };
    let status: String = get(row, "status")?;
    Ok(Item {
        id: ItemId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        serial_number: get(row, "serial_number")?,
        category_id: CategoryId::from_uuid(get(row, "category_id")?),
        department_id: DepartmentId::from_uuid(get(row, "department_id")?),
        reported_at: get(row, "reported_at")?,
        purchase_date: get(row, "purchase_date")?,
        status: parse_item_status(&status)?,
        weight_kg: get(row, "weight_kg")?,
        disposition,
        notes: get(row, "notes")?,
        photo: get(row, "photo")?,
        reported_by: PrincipalId::from_uuid(get(row, "reported_by")?),
    })
}

fn request_from_row(row: &PgRow) -> StorageResult<PickupRequest> {
    let status: String = get(row, "status")?;
    let latitude: Option<f64> = get(row, "latitude")?;
    let longitude: Option<f64> = get(row, "longitude")?;
    let pickup_coordinates = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(
            PickupCoordinates::new(lat, lon)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        ),
        _ => None,
    };
    Ok(PickupRequest {
        id: RequestId::from_uuid(get(row, "id")?),
        item_id: ItemId::from_uuid(get(row, "item_id")?),
        vendor_id: PrincipalId::from_uuid(get(row, "vendor_id")?),
        reporter_id: PrincipalId::from_uuid(get(row, "reporter_id")?),
        status: status
            .parse::<RequestStatus>()
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        requested_at: get(row, "requested_at")?,
        approved_at: get(row, "approved_at")?,
        rejected_at: get(row, "rejected_at")?,
        completed_at: get(row, "completed_at")?,
        vendor_notes: get(row, "vendor_notes")?,
        user_notes: get(row, "user_notes")?,
        pickup_location: get(row, "pickup_location")?,
        pickup_coordinates,
    })
}

fn log_entry_from_row(row: &PgRow) -> StorageResult<StatusLogEntry> {
    let from_status: Option<String> = get(row, "from_status")?;
    let to_status: String = get(row, "to_status")?;
    Ok(StatusLogEntry {
        id: ewaste_types::LogEntryId::from_uuid(get(row, "id")?),
        item_id: ItemId::from_uuid(get(row, "item_id")?),
        from_status: from_status.as_deref().map(parse_item_status).transpose()?,
        to_status: parse_item_status(&to_status)?,
        remarks: get(row, "remarks")?,
        changed_by: PrincipalId::from_uuid(get(row, "changed_by")?),
        changed_at: get(row, "changed_at")?,
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::Serialization(format!("column {column}: {e}")))
}

fn parse_item_status(raw: &str) -> StorageResult<ItemStatus> {
    raw.parse()
        .map_err(|e: ewaste_types::ParseError| StorageError::Serialization(e.to_string()))
}

fn map_sqlx(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            match code.as_deref() {
                Some("23505") if db_err.constraint() == Some(ACTIVE_CLAIM_INDEX) => {
                    StorageError::InvariantViolation(db_err.message().to_string())
                }
                Some("23505") => StorageError::Conflict(db_err.message().to_string()),
                Some("23503") | Some("23514") => {
                    StorageError::InvalidInput(db_err.message().to_string())
                }
                // Serialization failure, deadlock, connection exception class.
                Some("40001") | Some("40P01") => StorageError::Unavailable(err.to_string()),
                Some(c) if c.starts_with("08") => StorageError::Unavailable(err.to_string()),
                _ => StorageError::Backend(err.to_string()),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => StorageError::Unavailable(err.to_string()),
        _ => StorageError::Backend(err.to_string()),
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(50 * 2u64.pow(attempt.min(6)))
}

fn window_bounds(window: QueryWindow) -> StorageResult<(Option<i64>, i64)> {
    let limit = if window.limit == 0 {
        None
    } else {
        Some(to_i64(window.limit)?)
    };
    Ok((limit, to_i64(window.offset)?))
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
