//! Item lifecycle status and pickup request status.

use crate::errors::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an e-waste item.
///
/// `Reported` is the creation-time default. `Recycled` and `Disposed` are
/// terminal. Transitions never move to a lower rank, but intermediate
/// stages may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Reported,
    Collected,
    InStorage,
    SentToVendor,
    Recycled,
    Disposed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 6] = [
        ItemStatus::Reported,
        ItemStatus::Collected,
        ItemStatus::InStorage,
        ItemStatus::SentToVendor,
        ItemStatus::Recycled,
        ItemStatus::Disposed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Reported => "REPORTED",
            ItemStatus::Collected => "COLLECTED",
            ItemStatus::InStorage => "IN_STORAGE",
            ItemStatus::SentToVendor => "SENT_TO_VENDOR",
            ItemStatus::Recycled => "RECYCLED",
            ItemStatus::Disposed => "DISPOSED",
        }
    }

    /// Position along the lifecycle. Both terminal states share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            ItemStatus::Reported => 0,
            ItemStatus::Collected => 1,
            ItemStatus::InStorage => 2,
            ItemStatus::SentToVendor => 3,
            ItemStatus::Recycled | ItemStatus::Disposed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Recycled | ItemStatus::Disposed)
    }

    /// Whether a new pickup claim may be created against an item in this status.
    pub fn is_claim_eligible(self) -> bool {
        self == ItemStatus::Reported
    }

    /// Whether a vendor may report this status. `Reported` is only ever set at creation.
    pub fn is_advance_target(self) -> bool {
        self != ItemStatus::Reported
    }

    /// Whether an item currently in `self` may be moved to `target` by a claim holder.
    pub fn permits_advance_to(self, target: ItemStatus) -> bool {
        !self.is_terminal() && target.is_advance_target() && target.rank() >= self.rank()
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| ParseError::UnknownItemStatus(raw.to_string()))
    }
}

/// Status of a vendor's pickup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
        }
    }

    /// Approved and completed requests are the item's active claim.
    pub fn is_active_claim(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Completed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "completed" => Ok(RequestStatus::Completed),
            other => Err(ParseError::UnknownRequestStatus(other.to_string())),
        }
    }
}
