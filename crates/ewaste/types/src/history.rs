use crate::ids::{ItemId, LogEntryId, PrincipalId};
use crate::status::ItemStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one item status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub id: LogEntryId,
    pub item_id: ItemId,
    /// `None` only for an entry recorded before the item had a status.
    #[serde(default)]
    pub from_status: Option<ItemStatus>,
    pub to_status: ItemStatus,
    #[serde(default)]
    pub remarks: String,
    pub changed_by: PrincipalId,
    pub changed_at: DateTime<Utc>,
}

impl StatusLogEntry {
    pub fn new(
        item_id: ItemId,
        from_status: Option<ItemStatus>,
        to_status: ItemStatus,
        remarks: impl Into<String>,
        changed_by: PrincipalId,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LogEntryId::generate(),
            item_id,
            from_status,
            to_status,
            remarks: remarks.into(),
            changed_by,
            changed_at,
        }
    }
}
