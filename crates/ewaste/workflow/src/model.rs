use chrono::NaiveDate;
use ewaste_types::{
    Category, CategoryId, Department, DepartmentId, Item, ItemId, ItemStatus, PickupRequest,
    StatusLogEntry,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Raw attributes for a newly reported item, validated by `create_item`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub category_id: CategoryId,
    pub department_id: DepartmentId,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// `selling` or `disposed`.
    #[serde(default)]
    pub disposition: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Attached by the upload collaborator, never read from a request body.
    #[serde(skip)]
    pub photo: Option<String>,
}

impl NewItem {
    pub fn new(name: impl Into<String>, category_id: CategoryId, department_id: DepartmentId) -> Self {
        Self {
            name: name.into(),
            serial_number: None,
            category_id,
            department_id,
            purchase_date: None,
            weight_kg: None,
            disposition: None,
            price: None,
            notes: None,
            photo: None,
        }
    }

    pub fn selling(mut self, price: f64) -> Self {
        self.disposition = Some("selling".to_string());
        self.price = Some(price);
        self
    }

    pub fn disposed(mut self) -> Self {
        self.disposition = Some("disposed".to_string());
        self.price = None;
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn with_photo(mut self, reference: impl Into<String>) -> Self {
        self.photo = Some(reference.into());
        self
    }
}

/// The owner's decision details when approving a pickup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalInput {
    #[serde(default)]
    pub user_notes: Option<String>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Filters for a user's own item list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemQuery {
    /// Case-insensitive fragment of the item identifier.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
}

/// Everything shown on an item's detail view.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub item: Item,
    pub category: Option<Category>,
    pub department: Option<Department>,
    pub active_claim: Option<PickupRequest>,
    /// Newest first.
    pub history: Vec<StatusLogEntry>,
}

/// A vendor's working set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VendorBoard {
    /// Items open to claim plus items the vendor holds an active claim on.
    pub items: Vec<Item>,
    pub pending_item_ids: BTreeSet<ItemId>,
    pub claimed_item_ids: BTreeSet<ItemId>,
}

/// Trim free text; blank becomes absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
