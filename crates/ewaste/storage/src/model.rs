use chrono::{DateTime, Utc};
use serde::Serialize;
use ewaste_types::{
    Item, ItemId, ItemStatus, PickupCoordinates, PickupRequest, PrincipalId, RequestId,
    RequestStatus, StatusLogEntry,
};

/// Equality and set-membership filter over items. Empty sets match anything.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub reported_by: Option<PrincipalId>,
    pub statuses: Vec<ItemStatus>,
    pub ids: Vec<ItemId>,
    pub photo: Option<String>,
}

impl ItemFilter {
    pub fn reported_by(principal: PrincipalId) -> Self {
        Self {
            reported_by: Some(principal),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = ItemStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }

    /// Items holding exactly this photo reference.
    pub fn with_photo(mut self, reference: impl Into<String>) -> Self {
        self.photo = Some(reference.into());
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.reported_by.map_or(true, |owner| item.reported_by == owner)
            && (self.statuses.is_empty() || self.statuses.contains(&item.status))
            && (self.ids.is_empty() || self.ids.contains(&item.id))
            && self
                .photo
                .as_deref()
                .map_or(true, |photo| item.photo.as_deref() == Some(photo))
    }
}

/// Equality and set-membership filter over pickup requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub item_id: Option<ItemId>,
    pub vendor_id: Option<PrincipalId>,
    pub reporter_id: Option<PrincipalId>,
    pub statuses: Vec<RequestStatus>,
}

impl RequestFilter {
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Default::default()
        }
    }

    pub fn for_vendor(vendor_id: PrincipalId) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            ..Default::default()
        }
    }

    pub fn for_reporter(reporter_id: PrincipalId) -> Self {
        Self {
            reporter_id: Some(reporter_id),
            ..Default::default()
        }
    }

    pub fn with_vendor(mut self, vendor_id: PrincipalId) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = RequestStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn matches(&self, request: &PickupRequest) -> bool {
        self.item_id.map_or(true, |id| request.item_id == id)
            && self.vendor_id.map_or(true, |id| request.vendor_id == id)
            && self.reporter_id.map_or(true, |id| request.reporter_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&request.status))
    }
}

/// Approval of a pending request. Applied atomically with the item moving
/// from `REPORTED` to `COLLECTED` and the matching status log entry.
#[derive(Debug, Clone)]
pub struct Approval {
    pub request_id: RequestId,
    pub approved_by: PrincipalId,
    pub user_notes: Option<String>,
    pub pickup_location: Option<String>,
    pub pickup_coordinates: Option<PickupCoordinates>,
    pub remarks: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub request: PickupRequest,
    pub item: Item,
    pub entry: StatusLogEntry,
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub request_id: RequestId,
    pub user_notes: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

/// A claim holder reporting a new item status.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub item_id: ItemId,
    /// The active claim authorizing the change.
    pub claim_id: RequestId,
    pub changed_by: PrincipalId,
    pub to_status: ItemStatus,
    pub remarks: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusTransition {
    pub item: Item,
    pub claim: PickupRequest,
    pub entry: StatusLogEntry,
}

/// What a cascading item delete removed.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedItem {
    pub item: Item,
    pub requests_removed: usize,
    pub log_entries_removed: usize,
}
