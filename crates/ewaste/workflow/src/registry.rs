//! Item registry operations: reporting, status advance, deletion and reads.

use crate::authz::{active_claim_of, require_owner, require_user, require_vendor};
use crate::coordinator::WorkflowCoordinator;
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{non_empty, ItemDetail, ItemQuery, NewItem};
use chrono::Utc;
use ewaste_storage::{
    DeletedItem, ItemFilter, QueryWindow, RequestFilter, StatusChange, StatusTransition,
};
use ewaste_types::{
    Disposition, Item, ItemId, ItemStatus, PickupRequest, Principal, RequestStatus,
};
use tracing::{debug, info, warn};

/// Most history entries shown on the detail view.
pub const DETAIL_HISTORY_LIMIT: usize = 50;

/// Validate the disposition kind and its price together.
///
/// Selling requires a finite positive price. A price sent with a disposed
/// item is dropped.
pub fn validate_disposition(kind: Option<&str>, price: Option<f64>) -> WorkflowResult<Disposition> {
    match kind.map(str::trim) {
        Some("selling") => match price {
            Some(price) if price.is_finite() && price > 0.0 => Ok(Disposition::Selling { price }),
            Some(price) => Err(WorkflowError::Validation(format!(
                "selling price must be greater than 0, got {price}"
            ))),
            None => Err(WorkflowError::Validation(
                "a selling price is required for items being sold".to_string(),
            )),
        },
        Some("disposed") => Ok(Disposition::Disposed),
        Some(other) => Err(WorkflowError::Validation(format!(
            "disposition must be 'selling' or 'disposed', got '{other}'"
        ))),
        None => Err(WorkflowError::Validation(
            "disposition is required".to_string(),
        )),
    }
}

/// Parse a vendor-supplied target status.
pub fn parse_target_status(raw: &str) -> WorkflowResult<ItemStatus> {
    let status: ItemStatus = raw
        .trim()
        .to_ascii_uppercase()
        .parse()
        .map_err(|e: ewaste_types::ParseError| WorkflowError::Validation(e.to_string()))?;
    if !status.is_advance_target() {
        return Err(WorkflowError::Validation(format!(
            "{status} is set only when an item is reported"
        )));
    }
    Ok(status)
}

impl WorkflowCoordinator {
    /// Report a new item. Only regular users may do this.
    pub async fn create_item(&self, principal: &Principal, input: NewItem) -> WorkflowResult<Item> {
        let user = require_user(principal, "report items")?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(WorkflowError::Validation("item name is required".to_string()));
        }
        let disposition = validate_disposition(input.disposition.as_deref(), input.price)?;
        if let Some(weight) = input.weight_kg {
            if !weight.is_finite() || weight < 0.0 {
                return Err(WorkflowError::Validation(format!(
                    "weight must be a non-negative number of kilograms, got {weight}"
                )));
            }
        }

        if self.storage.get_category(&input.category_id).await?.is_none() {
            return Err(WorkflowError::NotFound(format!(
                "category {} not found",
                input.category_id
            )));
        }
        if self
            .storage
            .get_department(&input.department_id)
            .await?
            .is_none()
        {
            return Err(WorkflowError::NotFound(format!(
                "department {} not found",
                input.department_id
            )));
        }

        let item = Item {
            id: ItemId::generate(),
            name,
            serial_number: non_empty(input.serial_number),
            category_id: input.category_id,
            department_id: input.department_id,
            reported_at: Utc::now(),
            purchase_date: input.purchase_date,
            status: ItemStatus::Reported,
            weight_kg: input.weight_kg,
            disposition,
            notes: non_empty(input.notes),
            photo: non_empty(input.photo),
            reported_by: user.id,
        };
        self.storage.insert_item(item.clone()).await?;

        info!(
            item_id = %item.id,
            reported_by = %user.id,
            disposition = item.disposition.kind(),
            "item reported"
        );
        Ok(item)
    }

    /// Record a real-world handling step reported by the claim holder.
    ///
    /// Stages may be skipped and the current stage may be re-reported;
    /// nothing moves backward and terminal items never move.
    pub async fn advance_item_status(
        &self,
        principal: &Principal,
        item_id: ItemId,
        target: ItemStatus,
        remarks: &str,
    ) -> WorkflowResult<StatusTransition> {
        let vendor = require_vendor(principal, "update item status")?;
        if !target.is_advance_target() {
            return Err(WorkflowError::Validation(format!(
                "{target} is set only when an item is reported"
            )));
        }

        let item = self.load_item(item_id).await?;
        let requests = self
            .storage
            .list_requests(
                &RequestFilter::for_item(item_id).with_vendor(vendor.id),
                QueryWindow::all(),
            )
            .await?;
        let claim = active_claim_of(vendor, &requests).ok_or_else(|| {
            WorkflowError::Unauthorized(format!(
                "{} holds no approved pickup for item {}",
                vendor.id, item_id
            ))
        })?;

        if !item.status.permits_advance_to(target) {
            return Err(WorkflowError::InvalidState(format!(
                "item {} cannot move from {} to {}",
                item_id, item.status, target
            )));
        }

        let transition = self
            .storage
            .advance_status(StatusChange {
                item_id,
                claim_id: claim.id,
                changed_by: vendor.id,
                to_status: target,
                remarks: remarks.trim().to_string(),
                changed_at: Utc::now(),
            })
            .await
            .map_err(|e| {
                let err = WorkflowError::from(e);
                if matches!(err, WorkflowError::InvalidState(_)) {
                    warn!(item_id = %item_id, vendor = %vendor.id, error = %err, "status advance lost a race");
                }
                err
            })?;

        info!(
            item_id = %item_id,
            vendor = %vendor.id,
            from = %item.status,
            to = %target,
            claim = %transition.claim.status,
            "item status advanced"
        );
        Ok(transition)
    }

    /// Delete an item with its requests and history, then drop its photo.
    ///
    /// Allowed for the owner, or for a vendor whose request on the item is
    /// currently approved.
    pub async fn delete_item(&self, principal: &Principal, item_id: ItemId) -> WorkflowResult<DeletedItem> {
        let item = self.load_item(item_id).await?;
        match principal {
            Principal::User(user) => require_owner(user, &item)?,
            Principal::Vendor(vendor) => {
                let approved = self
                    .storage
                    .list_requests(
                        &RequestFilter::for_item(item_id)
                            .with_vendor(vendor.id)
                            .with_statuses([RequestStatus::Approved]),
                        QueryWindow::first(1),
                    )
                    .await?;
                if approved.is_empty() {
                    return Err(WorkflowError::Unauthorized(format!(
                        "{} holds no approved pickup for item {}",
                        vendor.id, item_id
                    )));
                }
            }
        }

        let deleted = self
            .storage
            .delete_item(&item_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("item {item_id} not found")))?;

        if let Some(photo) = deleted.item.photo.as_deref() {
            self.release_photo(item_id, photo).await;
        }

        info!(
            item_id = %item_id,
            deleted_by = %principal.id(),
            requests_removed = deleted.requests_removed,
            log_entries_removed = deleted.log_entries_removed,
            "item deleted"
        );
        Ok(deleted)
    }

    /// Item with its references, active claim and recent history.
    pub async fn item_detail(&self, principal: &Principal, item_id: ItemId) -> WorkflowResult<ItemDetail> {
        let item = self.load_item(item_id).await?;
        self.authorize_view(principal, &item).await?;

        let category = self.storage.get_category(&item.category_id).await?;
        let department = self.storage.get_department(&item.department_id).await?;
        let active_claim = self
            .storage
            .list_requests(
                &RequestFilter::for_item(item_id)
                    .with_statuses([RequestStatus::Approved, RequestStatus::Completed]),
                QueryWindow::first(1),
            )
            .await?
            .into_iter()
            .next();
        let history = self
            .storage
            .list_status_log(&item_id, QueryWindow::first(DETAIL_HISTORY_LIMIT))
            .await?;

        Ok(ItemDetail {
            item,
            category,
            department,
            active_claim,
            history,
        })
    }

    /// The caller's own reported items, newest first.
    pub async fn list_items(&self, principal: &Principal, query: &ItemQuery) -> WorkflowResult<Vec<Item>> {
        let user = require_user(principal, "list reported items; use the vendor board")?;
        let mut filter = ItemFilter::reported_by(user.id);
        if let Some(status) = query.status {
            filter = filter.with_statuses([status]);
        }
        let items = self.storage.list_items(&filter, QueryWindow::all()).await?;

        let fragment = query
            .search
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty());
        Ok(match fragment {
            Some(fragment) => items
                .into_iter()
                .filter(|item| item.id.to_string().to_ascii_lowercase().contains(&fragment))
                .collect(),
            None => items,
        })
    }

    /// Remove a deleted item's photo unless another item still references it.
    async fn release_photo(&self, item_id: ItemId, photo: &str) {
        let holders = match self
            .storage
            .list_items(&ItemFilter::default().with_photo(photo), QueryWindow::first(1))
            .await
        {
            Ok(holders) => holders,
            Err(e) => {
                warn!(item_id = %item_id, photo, error = %e, "photo left in place; holder lookup failed");
                return;
            }
        };
        if let Some(holder) = holders.first() {
            debug!(item_id = %item_id, photo, holder = %holder.id, "photo still referenced, kept");
            return;
        }
        if let Err(e) = self.media.remove(photo).await {
            warn!(item_id = %item_id, photo, error = %e, "failed to remove item photo");
        }
    }

    pub(crate) async fn load_item(&self, item_id: ItemId) -> WorkflowResult<Item> {
        self.storage
            .get_item(&item_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("item {item_id} not found")))
    }

    /// Owners and active claim holders may view an item.
    pub(crate) async fn authorize_view(
        &self,
        principal: &Principal,
        item: &Item,
    ) -> WorkflowResult<Option<PickupRequest>> {
        match principal {
            Principal::User(user) => require_owner(user, item).map(|_| None),
            Principal::Vendor(vendor) => {
                let requests = self
                    .storage
                    .list_requests(
                        &RequestFilter::for_item(item.id).with_vendor(vendor.id),
                        QueryWindow::all(),
                    )
                    .await?;
                active_claim_of(vendor, &requests)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| {
                        WorkflowError::Unauthorized(format!(
                            "{} may not view item {}",
                            vendor.id, item.id
                        ))
                    })
            }
        }
    }
}
