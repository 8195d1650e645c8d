//! Role and relationship predicates shared by every workflow operation.
//!
//! Role checks yield `Forbidden`; relationship checks (ownership, claim
//! holding) yield `Unauthorized`.

use crate::error::{WorkflowError, WorkflowResult};
use ewaste_types::{Item, PickupRequest, Principal, UserPrincipal, VendorPrincipal};

pub fn require_user<'a>(principal: &'a Principal, action: &str) -> WorkflowResult<&'a UserPrincipal> {
    principal
        .as_user()
        .ok_or_else(|| WorkflowError::Forbidden(format!("vendors may not {action}")))
}

pub fn require_vendor<'a>(
    principal: &'a Principal,
    action: &str,
) -> WorkflowResult<&'a VendorPrincipal> {
    principal
        .as_vendor()
        .ok_or_else(|| WorkflowError::Forbidden(format!("only vendors may {action}")))
}

pub fn require_owner(user: &UserPrincipal, item: &Item) -> WorkflowResult<()> {
    if item.is_owned_by(&user.id) {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized(format!(
            "{} does not own item {}",
            user.id, item.id
        )))
    }
}

/// The reporting user recorded on the request decides it.
pub fn require_request_owner(user: &UserPrincipal, request: &PickupRequest) -> WorkflowResult<()> {
    if request.reporter_id == user.id {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized(format!(
            "{} may not decide request {}",
            user.id, request.id
        )))
    }
}

/// Find the vendor's active claim among the item's requests.
pub fn active_claim_of<'a>(
    vendor: &VendorPrincipal,
    requests: &'a [PickupRequest],
) -> Option<&'a PickupRequest> {
    requests
        .iter()
        .find(|r| r.vendor_id == vendor.id && r.is_active_claim())
}
