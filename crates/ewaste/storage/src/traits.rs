use crate::model::{
    Approval, ApprovalOutcome, DeletedItem, ItemFilter, Rejection, RequestFilter, StatusChange,
    StatusTransition,
};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ewaste_types::{
    Category, CategoryId, Department, DepartmentId, Item, ItemId, PickupRequest, RequestId,
    StatusLogEntry,
};

/// Generic query window for paged reads. A zero limit means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// Storage interface for categories and departments.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a category. Names are unique.
    async fn insert_category(&self, category: Category) -> StorageResult<()>;
    async fn get_category(&self, id: &CategoryId) -> StorageResult<Option<Category>>;
    /// List categories ordered by name.
    async fn list_categories(&self) -> StorageResult<Vec<Category>>;

    /// Insert a department. Names are unique.
    async fn insert_department(&self, department: Department) -> StorageResult<()>;
    async fn get_department(&self, id: &DepartmentId) -> StorageResult<Option<Department>>;
    /// List departments ordered by name.
    async fn list_departments(&self) -> StorageResult<Vec<Department>>;
}

/// Storage interface for the item registry.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new item. Fails with `Conflict` on a duplicate serial number.
    async fn insert_item(&self, item: Item) -> StorageResult<()>;

    async fn get_item(&self, id: &ItemId) -> StorageResult<Option<Item>>;

    /// List matching items, most recently reported first.
    async fn list_items(&self, filter: &ItemFilter, window: QueryWindow)
        -> StorageResult<Vec<Item>>;

    /// Delete an item together with its pickup requests and status history.
    /// Returns `None` when the item does not exist.
    async fn delete_item(&self, id: &ItemId) -> StorageResult<Option<DeletedItem>>;
}

/// Storage interface for the pickup request ledger.
#[async_trait]
pub trait PickupStore: Send + Sync {
    /// Insert a pending request.
    ///
    /// Atomically checks that the item exists (`NotFound`), is still open to
    /// claims (`InvariantViolation`) and that the vendor has no other pending
    /// request on it (`Conflict`).
    async fn insert_request(&self, request: PickupRequest) -> StorageResult<()>;

    async fn get_request(&self, id: &RequestId) -> StorageResult<Option<PickupRequest>>;

    /// List matching requests, most recent first.
    async fn list_requests(
        &self,
        filter: &RequestFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<PickupRequest>>;

    /// Approve a pending request, collect its item and log the transition.
    ///
    /// Fails with `InvariantViolation` if the request is no longer pending,
    /// the item has left `REPORTED`, or another active claim exists.
    async fn approve_request(&self, approval: Approval) -> StorageResult<ApprovalOutcome>;

    /// Reject a pending request. The item is untouched.
    async fn reject_request(&self, rejection: Rejection) -> StorageResult<PickupRequest>;

    /// Reject every request on the item that is still pending and return them.
    async fn reject_pending_for_item(
        &self,
        item_id: &ItemId,
        user_notes: Option<String>,
        rejected_at: DateTime<Utc>,
    ) -> StorageResult<Vec<PickupRequest>>;
}

/// Storage interface for item status transitions and their append-only log.
#[async_trait]
pub trait StatusLogStore: Send + Sync {
    /// Apply a claim holder's status change and append exactly one log entry.
    ///
    /// A change to `COLLECTED` also completes an approved claim. Fails with
    /// `InvariantViolation` if the claim is no longer active for this vendor
    /// and item, or the item's current status does not permit the target.
    async fn advance_status(&self, change: StatusChange) -> StorageResult<StatusTransition>;

    /// Read an item's history, newest first.
    async fn list_status_log(
        &self,
        item_id: &ItemId,
        window: QueryWindow,
    ) -> StorageResult<Vec<StatusLogEntry>>;
}

/// Unified storage bundle used by the workflow coordinator.
pub trait EwasteStorage: CatalogStore + ItemStore + PickupStore + StatusLogStore + Send + Sync {}

impl<T> EwasteStorage for T where T: CatalogStore + ItemStore + PickupStore + StatusLogStore + Send + Sync
{}
