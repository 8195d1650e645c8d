//! E-waste pickup and item status workflow.
//!
//! [`WorkflowCoordinator`] is the only writer of item status and pickup
//! request status. It exposes:
//!
//! - the item registry: report, advance status, delete, list, detail
//! - the pickup request ledger: request, approve, reject, board, cleanup
//! - the status history view
//! - reference data registration
//!
//! Callers arrive with a [`ewaste_types::Principal`] produced by an
//! [`IdentityResolver`]; role ambiguity is settled before any operation runs.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod authz;
mod catalog;
mod coordinator;
mod error;
mod history;
pub mod identity;
mod ledger;
pub mod media;
mod model;
mod registry;

pub use coordinator::WorkflowCoordinator;
pub use error::{WorkflowError, WorkflowResult};
pub use identity::{IdentityError, IdentityResolver, StaticIdentityResolver};
pub use ledger::validate_coordinates;
pub use media::{MediaError, MediaStore, NoMediaStore};
pub use model::{ApprovalInput, ItemDetail, ItemQuery, NewItem, VendorBoard};
pub use registry::{parse_target_status, validate_disposition, DETAIL_HISTORY_LIMIT};
