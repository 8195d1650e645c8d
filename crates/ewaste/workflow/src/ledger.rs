//! Pickup request ledger operations.
//!
//! Several vendors may hold pending requests on the same item; the first
//! approval wins. Losing requests stay pending until the owner calls
//! [`WorkflowCoordinator::reject_stale_requests`]. Nothing rejects them
//! implicitly.

use crate::authz::{require_owner, require_request_owner, require_user, require_vendor};
use crate::coordinator::WorkflowCoordinator;
use crate::error::{WorkflowError, WorkflowResult};
use crate::model::{non_empty, ApprovalInput, VendorBoard};
use chrono::Utc;
use ewaste_storage::{Approval, ApprovalOutcome, ItemFilter, QueryWindow, Rejection, RequestFilter};
use ewaste_types::{
    ItemId, ItemStatus, PickupCoordinates, PickupRequest, Principal, RequestId, RequestStatus,
};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

const APPROVAL_REMARKS: &str = "pickup request approved";

/// Both coordinates or neither.
pub fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> WorkflowResult<Option<PickupCoordinates>> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(lat), Some(lon)) => PickupCoordinates::new(lat, lon)
            .map(Some)
            .map_err(|e| WorkflowError::Validation(e.to_string())),
        _ => Err(WorkflowError::Validation(
            "latitude and longitude must be given together".to_string(),
        )),
    }
}

impl WorkflowCoordinator {
    /// A vendor asks to collect a newly reported item.
    pub async fn create_pickup_request(
        &self,
        principal: &Principal,
        item_id: ItemId,
        notes: Option<String>,
    ) -> WorkflowResult<PickupRequest> {
        let vendor = require_vendor(principal, "request pickups")?;
        let item = self.load_item(item_id).await?;
        if !item.status.is_claim_eligible() {
            return Err(WorkflowError::InvalidState(format!(
                "item {} is {} and no longer open to pickup requests",
                item_id, item.status
            )));
        }

        let request = PickupRequest::pending(&item, vendor.id, non_empty(notes), Utc::now());
        self.storage.insert_request(request.clone()).await?;

        info!(
            request_id = %request.id,
            item_id = %item_id,
            vendor = %vendor.id,
            "pickup requested"
        );
        Ok(request)
    }

    /// The item's owner accepts a pending request; the item becomes COLLECTED.
    pub async fn approve_request(
        &self,
        principal: &Principal,
        request_id: RequestId,
        input: ApprovalInput,
    ) -> WorkflowResult<ApprovalOutcome> {
        let user = require_user(principal, "approve pickup requests")?;
        let coordinates = validate_coordinates(input.latitude, input.longitude)?;
        let request = self.load_request(request_id).await?;
        require_request_owner(user, &request)?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidState(format!(
                "request {} is already {}",
                request_id, request.status
            )));
        }

        let outcome = self
            .storage
            .approve_request(Approval {
                request_id,
                approved_by: user.id,
                user_notes: non_empty(input.user_notes),
                pickup_location: non_empty(input.pickup_location),
                pickup_coordinates: coordinates,
                remarks: APPROVAL_REMARKS.to_string(),
                approved_at: Utc::now(),
            })
            .await
            .map_err(|e| {
                let err = WorkflowError::from(e);
                if matches!(err, WorkflowError::InvalidState(_)) {
                    warn!(
                        request_id = %request_id,
                        item_id = %request.item_id,
                        error = %err,
                        "approval lost to a competing claim"
                    );
                }
                err
            })?;

        info!(
            request_id = %request_id,
            item_id = %outcome.item.id,
            vendor = %outcome.request.vendor_id,
            "pickup approved"
        );
        Ok(outcome)
    }

    /// The item's owner declines a pending request. The item is untouched.
    pub async fn reject_request(
        &self,
        principal: &Principal,
        request_id: RequestId,
        notes: Option<String>,
    ) -> WorkflowResult<PickupRequest> {
        let user = require_user(principal, "reject pickup requests")?;
        let request = self.load_request(request_id).await?;
        require_request_owner(user, &request)?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidState(format!(
                "request {} is already {}",
                request_id, request.status
            )));
        }

        let rejected = self
            .storage
            .reject_request(Rejection {
                request_id,
                user_notes: non_empty(notes),
                rejected_at: Utc::now(),
            })
            .await?;

        info!(request_id = %request_id, item_id = %rejected.item_id, "pickup rejected");
        Ok(rejected)
    }

    /// Reject every still-pending request on an item that has left REPORTED.
    pub async fn reject_stale_requests(
        &self,
        principal: &Principal,
        item_id: ItemId,
        notes: Option<String>,
    ) -> WorkflowResult<Vec<PickupRequest>> {
        let user = require_user(principal, "reject pickup requests")?;
        let item = self.load_item(item_id).await?;
        require_owner(user, &item)?;
        if item.status == ItemStatus::Reported {
            return Err(WorkflowError::InvalidState(format!(
                "item {item_id} is still open to claims; reject requests individually"
            )));
        }

        let rejected = self
            .storage
            .reject_pending_for_item(&item_id, non_empty(notes), Utc::now())
            .await?;

        info!(item_id = %item_id, rejected = rejected.len(), "stale pickup requests rejected");
        Ok(rejected)
    }

    /// Requests made by the calling vendor, newest first.
    pub async fn list_for_vendor(&self, principal: &Principal) -> WorkflowResult<Vec<PickupRequest>> {
        let vendor = require_vendor(principal, "list vendor pickup requests")?;
        Ok(self
            .storage
            .list_requests(&RequestFilter::for_vendor(vendor.id), QueryWindow::all())
            .await?)
    }

    /// Requests made against the calling user's items, newest first.
    pub async fn list_for_user(&self, principal: &Principal) -> WorkflowResult<Vec<PickupRequest>> {
        let user = require_user(principal, "list requests on reported items")?;
        Ok(self
            .storage
            .list_requests(&RequestFilter::for_reporter(user.id), QueryWindow::all())
            .await?)
    }

    /// Role-dispatched request listing.
    pub async fn list_requests(&self, principal: &Principal) -> WorkflowResult<Vec<PickupRequest>> {
        match principal {
            Principal::User(_) => self.list_for_user(principal).await,
            Principal::Vendor(_) => self.list_for_vendor(principal).await,
        }
    }

    /// Items the vendor can claim or is already handling.
    pub async fn vendor_board(&self, principal: &Principal) -> WorkflowResult<VendorBoard> {
        let vendor = require_vendor(principal, "view the pickup board")?;

        let mine = self
            .storage
            .list_requests(&RequestFilter::for_vendor(vendor.id), QueryWindow::all())
            .await?;
        let pending_item_ids: BTreeSet<ItemId> = mine
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .map(|r| r.item_id)
            .collect();
        let claimed_item_ids: BTreeSet<ItemId> = mine
            .iter()
            .filter(|r| r.is_active_claim())
            .map(|r| r.item_id)
            .collect();

        let mut items = self
            .storage
            .list_items(
                &ItemFilter::default().with_statuses([ItemStatus::Reported]),
                QueryWindow::all(),
            )
            .await?;
        if !claimed_item_ids.is_empty() {
            let claimed = self
                .storage
                .list_items(
                    &ItemFilter::default().with_ids(claimed_item_ids.iter().copied()),
                    QueryWindow::all(),
                )
                .await?;
            let mut seen: HashSet<ItemId> = items.iter().map(|i| i.id).collect();
            items.extend(claimed.into_iter().filter(|i| seen.insert(i.id)));
        }
        items.sort_by(|a, b| b.reported_at.cmp(&a.reported_at).then_with(|| a.id.cmp(&b.id)));

        Ok(VendorBoard {
            items,
            pending_item_ids,
            claimed_item_ids,
        })
    }

    async fn load_request(&self, request_id: RequestId) -> WorkflowResult<PickupRequest> {
        self.storage
            .get_request(&request_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("request {request_id} not found")))
    }
}
