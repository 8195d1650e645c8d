//! In-memory reference implementation of the e-waste storage traits.
//!
//! Every collection sits behind one async lock so that multi-record
//! operations (approval, status advance, cascade delete) observe and mutate
//! a consistent snapshot. This adapter is deterministic and test-friendly;
//! deployments that need durability use the PostgreSQL adapter.

use crate::model::{
    Approval, ApprovalOutcome, DeletedItem, ItemFilter, Rejection, RequestFilter, StatusChange,
    StatusTransition,
};
use crate::traits::{CatalogStore, ItemStore, PickupStore, QueryWindow, StatusLogStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ewaste_types::{
    Category, CategoryId, Department, DepartmentId, Item, ItemId, ItemStatus, PickupRequest,
    RequestId, RequestStatus, StatusLogEntry,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    categories: HashMap<CategoryId, Category>,
    departments: HashMap<DepartmentId, Department>,
    items: HashMap<ItemId, Item>,
    requests: HashMap<RequestId, PickupRequest>,
    status_log: Vec<StatusLogEntry>,
}

impl Collections {
    fn active_claim_for(&self, item_id: &ItemId) -> Option<&PickupRequest> {
        self.requests
            .values()
            .find(|r| r.item_id == *item_id && r.is_active_claim())
    }
}

/// In-memory e-waste storage adapter.
#[derive(Default)]
pub struct InMemoryEwasteStorage {
    state: RwLock<Collections>,
}

impl InMemoryEwasteStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryEwasteStorage {
    async fn insert_category(&self, category: Category) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.categories.contains_key(&category.id) {
            return Err(StorageError::Conflict(format!(
                "category {} already exists",
                category.id
            )));
        }
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StorageError::Conflict(format!(
                "category name '{}' already in use",
                category.name
            )));
        }
        state.categories.insert(category.id, category);
        Ok(())
    }

    async fn get_category(&self, id: &CategoryId) -> StorageResult<Option<Category>> {
        Ok(self.state.read().await.categories.get(id).cloned())
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut values = state.categories.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(values)
    }

    async fn insert_department(&self, department: Department) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.departments.contains_key(&department.id) {
            return Err(StorageError::Conflict(format!(
                "department {} already exists",
                department.id
            )));
        }
        if state.departments.values().any(|d| d.name == department.name) {
            return Err(StorageError::Conflict(format!(
                "department name '{}' already in use",
                department.name
            )));
        }
        state.departments.insert(department.id, department);
        Ok(())
    }

    async fn get_department(&self, id: &DepartmentId) -> StorageResult<Option<Department>> {
        Ok(self.state.read().await.departments.get(id).cloned())
    }

    async fn list_departments(&self) -> StorageResult<Vec<Department>> {
        let state = self.state.read().await;
        let mut values = state.departments.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(values)
    }
}

#[async_trait]
impl ItemStore for InMemoryEwasteStorage {
    async fn insert_item(&self, item: Item) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.items.contains_key(&item.id) {
            return Err(StorageError::Conflict(format!("item {} already exists", item.id)));
        }
        if let Some(serial) = item.serial_number.as_deref() {
            if state
                .items
                .values()
                .any(|existing| existing.serial_number.as_deref() == Some(serial))
            {
                return Err(StorageError::Conflict(format!(
                    "serial number '{serial}' already registered"
                )));
            }
        }
        state.items.insert(item.id, item);
        Ok(())
    }

    async fn get_item(&self, id: &ItemId) -> StorageResult<Option<Item>> {
        Ok(self.state.read().await.items.get(id).cloned())
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Item>> {
        let state = self.state.read().await;
        let mut values = state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            b.reported_at
                .cmp(&a.reported_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(apply_window(values, window))
    }

    async fn delete_item(&self, id: &ItemId) -> StorageResult<Option<DeletedItem>> {
        let mut state = self.state.write().await;
        let Some(item) = state.items.remove(id) else {
            return Ok(None);
        };

        let before_requests = state.requests.len();
        state.requests.retain(|_, r| r.item_id != *id);
        let requests_removed = before_requests - state.requests.len();

        let before_log = state.status_log.len();
        state.status_log.retain(|e| e.item_id != *id);
        let log_entries_removed = before_log - state.status_log.len();

        Ok(Some(DeletedItem {
            item,
            requests_removed,
            log_entries_removed,
        }))
    }
}

#[async_trait]
impl PickupStore for InMemoryEwasteStorage {
    async fn insert_request(&self, request: PickupRequest) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let item = state.items.get(&request.item_id).ok_or_else(|| {
            StorageError::NotFound(format!("item {} not found", request.item_id))
        })?;
        if !item.status.is_claim_eligible() {
            return Err(StorageError::InvariantViolation(format!(
                "item {} is {} and no longer accepts pickup requests",
                item.id, item.status
            )));
        }
        if state.requests.contains_key(&request.id) {
            return Err(StorageError::Conflict(format!(
                "request {} already exists",
                request.id
            )));
        }
        let duplicate = state.requests.values().any(|r| {
            r.item_id == request.item_id
                && r.vendor_id == request.vendor_id
                && r.status == RequestStatus::Pending
        });
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "vendor {} already has a pending request for item {}",
                request.vendor_id, request.item_id
            )));
        }
        state.requests.insert(request.id, request);
        Ok(())
    }

    async fn get_request(&self, id: &RequestId) -> StorageResult<Option<PickupRequest>> {
        Ok(self.state.read().await.requests.get(id).cloned())
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<PickupRequest>> {
        let state = self.state.read().await;
        let mut values = state
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(apply_window(values, window))
    }

    async fn approve_request(&self, approval: Approval) -> StorageResult<ApprovalOutcome> {
        let mut state = self.state.write().await;
        let request = state.requests.get(&approval.request_id).ok_or_else(|| {
            StorageError::NotFound(format!("request {} not found", approval.request_id))
        })?;
        if request.status != RequestStatus::Pending {
            return Err(StorageError::InvariantViolation(format!(
                "request {} is {}, expected pending",
                request.id, request.status
            )));
        }
        let item_id = request.item_id;
        let item = state
            .items
            .get(&item_id)
            .ok_or_else(|| StorageError::NotFound(format!("item {item_id} not found")))?;
        if item.status != ItemStatus::Reported {
            return Err(StorageError::InvariantViolation(format!(
                "item {} is {}, expected REPORTED",
                item_id, item.status
            )));
        }
        if let Some(claim) = state.active_claim_for(&item_id) {
            return Err(StorageError::InvariantViolation(format!(
                "item {} already claimed by request {}",
                item_id, claim.id
            )));
        }

        let entry = StatusLogEntry::new(
            item_id,
            Some(ItemStatus::Reported),
            ItemStatus::Collected,
            approval.remarks,
            approval.approved_by,
            approval.approved_at,
        );

        let request = state
            .requests
            .get_mut(&approval.request_id)
            .ok_or_else(|| StorageError::NotFound(format!("request {} not found", approval.request_id)))?;
        request.status = RequestStatus::Approved;
        request.approved_at = Some(approval.approved_at);
        request.user_notes = approval.user_notes;
        request.pickup_location = approval.pickup_location;
        request.pickup_coordinates = approval.pickup_coordinates;
        let request = request.clone();

        let item = state
            .items
            .get_mut(&item_id)
            .ok_or_else(|| StorageError::NotFound(format!("item {item_id} not found")))?;
        item.status = ItemStatus::Collected;
        let item = item.clone();

        state.status_log.push(entry.clone());

        Ok(ApprovalOutcome {
            request,
            item,
            entry,
        })
    }

    async fn reject_request(&self, rejection: Rejection) -> StorageResult<PickupRequest> {
        let mut state = self.state.write().await;
        let request = state.requests.get_mut(&rejection.request_id).ok_or_else(|| {
            StorageError::NotFound(format!("request {} not found", rejection.request_id))
        })?;
        if request.status != RequestStatus::Pending {
            return Err(StorageError::InvariantViolation(format!(
                "request {} is {}, expected pending",
                request.id, request.status
            )));
        }
        request.status = RequestStatus::Rejected;
        request.rejected_at = Some(rejection.rejected_at);
        request.user_notes = rejection.user_notes;
        Ok(request.clone())
    }

    async fn reject_pending_for_item(
        &self,
        item_id: &ItemId,
        user_notes: Option<String>,
        rejected_at: DateTime<Utc>,
    ) -> StorageResult<Vec<PickupRequest>> {
        let mut state = self.state.write().await;
        if !state.items.contains_key(item_id) {
            return Err(StorageError::NotFound(format!("item {item_id} not found")));
        }
        let mut rejected = Vec::new();
        for request in state.requests.values_mut() {
            if request.item_id == *item_id && request.status == RequestStatus::Pending {
                request.status = RequestStatus::Rejected;
                request.rejected_at = Some(rejected_at);
                request.user_notes = user_notes.clone();
                rejected.push(request.clone());
            }
        }
        rejected.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rejected)
    }
}

#[async_trait]
impl StatusLogStore for InMemoryEwasteStorage {
    async fn advance_status(&self, change: StatusChange) -> StorageResult<StatusTransition> {
        let mut state = self.state.write().await;
        let item = state.items.get(&change.item_id).ok_or_else(|| {
            StorageError::NotFound(format!("item {} not found", change.item_id))
        })?;
        let from = item.status;

        let claim = state.requests.get(&change.claim_id).ok_or_else(|| {
            StorageError::InvariantViolation(format!("claim {} no longer exists", change.claim_id))
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
        if !from.permits_advance_to(change.to_status) {
            return Err(StorageError::InvariantViolation(format!(
                "item {} cannot move from {} to {}",
                change.item_id, from, change.to_status
            )));
        }

        let entry = StatusLogEntry::new(
            change.item_id,
            Some(from),
            change.to_status,
            change.remarks.clone(),
            change.changed_by,
            change.changed_at,
        );

        let claim = state.requests.get_mut(&change.claim_id).ok_or_else(|| {
            StorageError::InvariantViolation(format!("claim {} no longer exists", change.claim_id))
        })?;
        if change.to_status == ItemStatus::Collected && claim.status == RequestStatus::Approved {
            claim.status = RequestStatus::Completed;
            claim.completed_at = Some(change.changed_at);
        }
        if !change.remarks.trim().is_empty() {
            claim.vendor_notes = Some(change.remarks);
        }
        let claim = claim.clone();

        let item = state.items.get_mut(&change.item_id).ok_or_else(|| {
            StorageError::NotFound(format!("item {} not found", change.item_id))
        })?;
        item.status = change.to_status;
        let item = item.clone();

        state.status_log.push(entry.clone());

        Ok(StatusTransition { item, claim, entry })
    }

    async fn list_status_log(
        &self,
        item_id: &ItemId,
        window: QueryWindow,
    ) -> StorageResult<Vec<StatusLogEntry>> {
        let state = self.state.read().await;
        let mut values = state
            .status_log
            .iter()
            .rev()
            .filter(|e| e.item_id == *item_id)
            .cloned()
            .collect::<Vec<_>>();
        // Stable sort keeps reverse append order among equal timestamps.
        values.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(apply_window(values, window))
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ewaste_types::{Disposition, PrincipalId};

    fn item(owner: PrincipalId, serial: Option<&str>) -> Item {
        Item {
            id: ItemId::generate(),
            name: "CRT monitor".to_string(),
            serial_number: serial.map(str::to_string),
            category_id: CategoryId::generate(),
            department_id: DepartmentId::generate(),
            reported_at: Utc::now(),
            purchase_date: None,
            status: ItemStatus::Reported,
            weight_kg: Some(12.5),
            disposition: Disposition::Disposed,
            notes: None,
            photo: None,
            reported_by: owner,
        }
    }

    fn approval(request_id: RequestId, owner: PrincipalId) -> Approval {
        Approval {
            request_id,
            approved_by: owner,
            user_notes: Some("back door".to_string()),
            pickup_location: Some("Dock 4".to_string()),
            pickup_coordinates: None,
            remarks: "Pickup request approved".to_string(),
            approved_at: Utc::now(),
        }
    }

    async fn seeded() -> (InMemoryEwasteStorage, Item, PrincipalId) {
        let storage = InMemoryEwasteStorage::new();
        let owner = PrincipalId::generate();
        let item = item(owner, Some("SN-1"));
        storage.insert_item(item.clone()).await.unwrap();
        (storage, item, owner)
    }

    #[tokio::test]
    async fn duplicate_serial_number_conflicts() {
        let (storage, _, owner) = seeded().await;
        let err = storage
            .insert_item(item(owner, Some("SN-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        // Items without serial numbers never collide.
        storage.insert_item(item(owner, None)).await.unwrap();
        storage.insert_item(item(owner, None)).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_category_name_conflicts() {
        let storage = InMemoryEwasteStorage::new();
        storage
            .insert_category(Category::new("Laptops", ewaste_types::CategoryKind::Reusable))
            .await
            .unwrap();
        let err = storage
            .insert_category(Category::new("Laptops", ewaste_types::CategoryKind::Hazardous))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn pending_request_is_unique_per_vendor() {
        let (storage, item, _) = seeded().await;
        let vendor = PrincipalId::generate();
        storage
            .insert_request(PickupRequest::pending(&item, vendor, None, Utc::now()))
            .await
            .unwrap();
        let err = storage
            .insert_request(PickupRequest::pending(&item, vendor, None, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        storage
            .insert_request(PickupRequest::pending(
                &item,
                PrincipalId::generate(),
                None,
                Utc::now(),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn approval_collects_item_and_logs_once() {
        let (storage, item, owner) = seeded().await;
        let request = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        storage.insert_request(request.clone()).await.unwrap();

        let outcome = storage
            .approve_request(approval(request.id, owner))
            .await
            .unwrap();
        assert_eq!(outcome.request.status, RequestStatus::Approved);
        assert_eq!(outcome.item.status, ItemStatus::Collected);
        assert_eq!(outcome.entry.from_status, Some(ItemStatus::Reported));
        assert_eq!(outcome.request.pickup_location.as_deref(), Some("Dock 4"));

        let log = storage
            .list_status_log(&item.id, QueryWindow::all())
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].changed_by, owner);
    }

    #[tokio::test]
    async fn second_approval_on_same_item_is_refused() {
        let (storage, item, owner) = seeded().await;
        let first = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        let second = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        storage.insert_request(first.clone()).await.unwrap();
        storage.insert_request(second.clone()).await.unwrap();

        storage.approve_request(approval(first.id, owner)).await.unwrap();
        let err = storage
            .approve_request(approval(second.id, owner))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation(_)));

        let untouched = storage.get_request(&second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, RequestStatus::Pending);
        let log = storage
            .list_status_log(&item.id, QueryWindow::all())
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn collected_item_refuses_new_requests() {
        let (storage, item, owner) = seeded().await;
        let request = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        storage.insert_request(request.clone()).await.unwrap();
        storage.approve_request(approval(request.id, owner)).await.unwrap();

        let err = storage
            .insert_request(PickupRequest::pending(
                &item,
                PrincipalId::generate(),
                None,
                Utc::now(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn advance_requires_active_claim_of_caller() {
        let (storage, item, owner) = seeded().await;
        let vendor = PrincipalId::generate();
        let request = PickupRequest::pending(&item, vendor, None, Utc::now());
        storage.insert_request(request.clone()).await.unwrap();
        storage.approve_request(approval(request.id, owner)).await.unwrap();

        let err = storage
            .advance_status(StatusChange {
                item_id: item.id,
                claim_id: request.id,
                changed_by: PrincipalId::generate(),
                to_status: ItemStatus::InStorage,
                remarks: String::new(),
                changed_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation(_)));

        let transition = storage
            .advance_status(StatusChange {
                item_id: item.id,
                claim_id: request.id,
                changed_by: vendor,
                to_status: ItemStatus::InStorage,
                remarks: "shelf B".to_string(),
                changed_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(transition.item.status, ItemStatus::InStorage);
        assert_eq!(transition.claim.vendor_notes.as_deref(), Some("shelf B"));
        assert_eq!(transition.claim.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn collected_target_completes_claim() {
        let (storage, item, owner) = seeded().await;
        let vendor = PrincipalId::generate();
        let request = PickupRequest::pending(&item, vendor, None, Utc::now());
        storage.insert_request(request.clone()).await.unwrap();
        storage.approve_request(approval(request.id, owner)).await.unwrap();

        let transition = storage
            .advance_status(StatusChange {
                item_id: item.id,
                claim_id: request.id,
                changed_by: vendor,
                to_status: ItemStatus::Collected,
                remarks: String::new(),
                changed_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(transition.claim.status, RequestStatus::Completed);
        assert!(transition.claim.completed_at.is_some());
        assert_eq!(transition.entry.from_status, Some(ItemStatus::Collected));
        assert_eq!(transition.claim.vendor_notes, None);
    }

    #[tokio::test]
    async fn backward_move_is_refused() {
        let (storage, item, owner) = seeded().await;
        let vendor = PrincipalId::generate();
        let request = PickupRequest::pending(&item, vendor, None, Utc::now());
        storage.insert_request(request.clone()).await.unwrap();
        storage.approve_request(approval(request.id, owner)).await.unwrap();

        let change = |to| StatusChange {
            item_id: item.id,
            claim_id: request.id,
            changed_by: vendor,
            to_status: to,
            remarks: String::new(),
            changed_at: Utc::now(),
        };
        storage.advance_status(change(ItemStatus::SentToVendor)).await.unwrap();
        let err = storage
            .advance_status(change(ItemStatus::InStorage))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation(_)));
        let stored = storage.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::SentToVendor);
    }

    #[tokio::test]
    async fn delete_cascades_requests_and_history() {
        let (storage, item, owner) = seeded().await;
        let request = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        let other = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        storage.insert_request(request.clone()).await.unwrap();
        storage.insert_request(other).await.unwrap();
        storage.approve_request(approval(request.id, owner)).await.unwrap();

        let deleted = storage.delete_item(&item.id).await.unwrap().unwrap();
        assert_eq!(deleted.requests_removed, 2);
        assert_eq!(deleted.log_entries_removed, 1);
        assert!(storage.get_item(&item.id).await.unwrap().is_none());
        assert!(storage
            .list_requests(&RequestFilter::for_item(item.id), QueryWindow::all())
            .await
            .unwrap()
            .is_empty());
        assert!(storage.delete_item(&item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reject_pending_leaves_decided_requests_alone() {
        let (storage, item, owner) = seeded().await;
        let winner = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        let loser = PickupRequest::pending(&item, PrincipalId::generate(), None, Utc::now());
        storage.insert_request(winner.clone()).await.unwrap();
        storage.insert_request(loser.clone()).await.unwrap();
        storage.approve_request(approval(winner.id, owner)).await.unwrap();

        let rejected = storage
            .reject_pending_for_item(&item.id, Some("claimed".to_string()), Utc::now())
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, loser.id);
        let winner = storage.get_request(&winner.id).await.unwrap().unwrap();
        assert_eq!(winner.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_windowed() {
        let storage = InMemoryEwasteStorage::new();
        let owner = PrincipalId::generate();
        let base = Utc::now();
        for offset in 0..5 {
            let mut it = item(owner, None);
            it.reported_at = base + Duration::seconds(offset);
            storage.insert_item(it).await.unwrap();
        }
        let page = storage
            .list_items(&ItemFilter::reported_by(owner), QueryWindow { limit: 2, offset: 1 })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].reported_at, base + Duration::seconds(3));
        assert_eq!(page[1].reported_at, base + Duration::seconds(2));

        let none = storage
            .list_items(
                &ItemFilter::reported_by(PrincipalId::generate()),
                QueryWindow::all(),
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
