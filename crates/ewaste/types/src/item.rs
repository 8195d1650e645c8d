//! The e-waste item record.

use crate::ids::{CategoryId, DepartmentId, ItemId, PrincipalId};
use crate::status::ItemStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What the reporting user intends to happen to the item.
///
/// The price lives inside the `Selling` variant, so an item carries a
/// price exactly when it is being sold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Disposition {
    Selling { price: f64 },
    Disposed,
}

impl Disposition {
    pub fn kind(&self) -> &'static str {
        match self {
            Disposition::Selling { .. } => "selling",
            Disposition::Disposed => "disposed",
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            Disposition::Selling { price } => Some(*price),
            Disposition::Disposed => None,
        }
    }
}

/// One physical e-waste unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub category_id: CategoryId,
    pub department_id: DepartmentId,
    pub reported_at: DateTime<Utc>,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    pub status: ItemStatus,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    pub disposition: Disposition,
    #[serde(default)]
    pub notes: Option<String>,
    /// Reference handed out by the media collaborator when the photo was stored.
    #[serde(default)]
    pub photo: Option<String>,
    pub reported_by: PrincipalId,
}

impl Item {
    pub fn is_owned_by(&self, principal: &PrincipalId) -> bool {
        self.reported_by == *principal
    }
}
