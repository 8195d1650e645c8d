//! Vendor pickup requests.

use crate::errors::ParseError;
use crate::ids::{ItemId, PrincipalId, RequestId};
use crate::item::Item;
use crate::status::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the vendor should collect the item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickupCoordinates {
    latitude: f64,
    longitude: f64,
}

impl PickupCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ParseError> {
        let in_range = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(ParseError::CoordinatesOutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// One vendor's claim of intent to collect one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRequest {
    pub id: RequestId,
    pub item_id: ItemId,
    pub vendor_id: PrincipalId,
    /// The item's reporting user, copied when the request is created.
    pub reporter_id: PrincipalId,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vendor_notes: Option<String>,
    #[serde(default)]
    pub user_notes: Option<String>,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub pickup_coordinates: Option<PickupCoordinates>,
}

impl PickupRequest {
    /// Build a fresh pending request from `vendor_id` against `item`.
    pub fn pending(
        item: &Item,
        vendor_id: PrincipalId,
        vendor_notes: Option<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            item_id: item.id,
            vendor_id,
            reporter_id: item.reported_by,
            status: RequestStatus::Pending,
            requested_at,
            approved_at: None,
            rejected_at: None,
            completed_at: None,
            vendor_notes,
            user_notes: None,
            pickup_location: None,
            pickup_coordinates: None,
        }
    }

    pub fn is_active_claim(&self) -> bool {
        self.status.is_active_claim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_range_checked() {
        assert!(PickupCoordinates::new(51.5, -0.12).is_ok());
        assert!(PickupCoordinates::new(91.0, 0.0).is_err());
        assert!(PickupCoordinates::new(0.0, -180.5).is_err());
        assert!(PickupCoordinates::new(f64::NAN, 0.0).is_err());
    }
}
