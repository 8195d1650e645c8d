//! E-waste persistent store contract.
//!
//! This crate defines what the workflow needs from a backing store:
//! - reference data (categories, departments)
//! - the item registry
//! - the pickup request ledger
//! - the append-only status history
//!
//! Every operation that touches more than one record (approval, status
//! advance, cascade delete, stale-request cleanup) is a single atomic unit
//! inside the adapter. The workflow layer never stitches multi-record writes
//! together itself.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{
    Approval, ApprovalOutcome, DeletedItem, ItemFilter, Rejection, RequestFilter, StatusChange,
    StatusTransition,
};
pub use traits::{CatalogStore, EwasteStorage, ItemStore, PickupStore, QueryWindow, StatusLogStore};
