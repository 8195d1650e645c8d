//! E-waste tracker domain types.
//!
//! The vocabulary shared by every other crate in the workspace:
//!
//! - **Item**: one physical e-waste unit and its lifecycle status
//! - **PickupRequest**: a vendor's claim of intent to collect an item
//! - **StatusLogEntry**: an immutable record of one status transition
//! - **Principal**: the authenticated actor, normalized to exactly one role
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod catalog;
mod errors;
mod history;
mod ids;
mod item;
mod pickup;
mod principal;
mod status;

pub use catalog::{Category, CategoryKind, Department};
pub use errors::ParseError;
pub use history::StatusLogEntry;
pub use ids::{CategoryId, DepartmentId, ItemId, LogEntryId, PrincipalId, RequestId, VendorId};
pub use item::{Disposition, Item};
pub use pickup::{PickupCoordinates, PickupRequest};
pub use principal::{
    Principal, PrincipalClaims, PrincipalError, Role, UserPrincipal, VendorPrincipal,
};
pub use status::{ItemStatus, RequestStatus};
