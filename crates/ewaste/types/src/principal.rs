//! Authenticated principals and role normalization.
//!
//! Credentials arrive carrying role information in up to three places: an
//! explicit role field, a kind tag naming the account type, and an optional
//! vendor affiliation. [`Principal::from_claims`] folds those signals into a
//! single [`Role`] once, at resolution time. Everything downstream matches on
//! the [`Principal`] variant and never looks at the raw claims again.

use crate::errors::ParseError;
use crate::ids::{DepartmentId, PrincipalId, VendorId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The two roles that take part in the pickup workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    RegularUser,
    VendorUser,
}

impl Role {
    /// Same spelling as the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::RegularUser => "REGULAR_USER",
            Role::VendorUser => "VENDOR_USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrincipal {
    pub id: PrincipalId,
    #[serde(default)]
    pub department: Option<DepartmentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPrincipal {
    pub id: PrincipalId,
    #[serde(default)]
    pub vendor: Option<VendorId>,
}

/// An authenticated actor with exactly one authoritative role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Principal {
    User(UserPrincipal),
    Vendor(VendorPrincipal),
}

impl Principal {
    pub fn user(id: PrincipalId) -> Self {
        Principal::User(UserPrincipal {
            id,
            department: None,
        })
    }

    pub fn vendor(id: PrincipalId) -> Self {
        Principal::Vendor(VendorPrincipal { id, vendor: None })
    }

    pub fn id(&self) -> PrincipalId {
        match self {
            Principal::User(user) => user.id,
            Principal::Vendor(vendor) => vendor.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Principal::User(_) => Role::RegularUser,
            Principal::Vendor(_) => Role::VendorUser,
        }
    }

    pub fn as_user(&self) -> Option<&UserPrincipal> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Vendor(_) => None,
        }
    }

    pub fn as_vendor(&self) -> Option<&VendorPrincipal> {
        match self {
            Principal::Vendor(vendor) => Some(vendor),
            Principal::User(_) => None,
        }
    }

    /// Normalize raw credential claims into a principal.
    ///
    /// Precedence: explicit role, then kind tag, then vendor affiliation,
    /// defaulting to a regular user. Signals that disagree are rejected.
    pub fn from_claims(claims: &PrincipalClaims) -> Result<Self, PrincipalError> {
        let id: PrincipalId = claims.subject.parse()?;
        let explicit = claims.role.as_deref().map(parse_role).transpose()?.flatten();
        let kind = claims.kind.as_deref().map(parse_kind).transpose()?.flatten();
        let vendor = non_empty(claims.vendor.as_deref())
            .map(str::parse::<VendorId>)
            .transpose()?;
        let department = non_empty(claims.department.as_deref())
            .map(str::parse::<DepartmentId>)
            .transpose()?;

        let role = match (explicit, kind) {
            (Some(Role::RegularUser), Some(Role::VendorUser)) | (Some(Role::VendorUser), Some(Role::RegularUser)) => {
                return Err(PrincipalError::AmbiguousRole(format!(
                    "role and kind disagree for {}",
                    claims.subject
                )));
            }
            (Some(role), _) | (None, Some(role)) => role,
            (None, None) if vendor.is_some() => Role::VendorUser,
            (None, None) => Role::RegularUser,
        };

        match role {
            Role::RegularUser if vendor.is_some() => Err(PrincipalError::AmbiguousRole(format!(
                "regular user {} carries a vendor affiliation",
                claims.subject
            ))),
            Role::RegularUser => Ok(Principal::User(UserPrincipal { id, department })),
            Role::VendorUser => Ok(Principal::Vendor(VendorPrincipal { id, vendor })),
        }
    }
}

/// Raw, possibly ambiguous identity claims delivered by a credential source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalClaims {
    pub subject: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrincipalError {
    #[error("ambiguous role: {0}")]
    AmbiguousRole(String),

    #[error("unsupported role: {0}")]
    UnsupportedRole(String),

    #[error("invalid reference in claims: {0}")]
    InvalidReference(#[from] ParseError),
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_role(raw: &str) -> Result<Option<Role>, PrincipalError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "user" => Ok(Some(Role::RegularUser)),
        "vendor" => Ok(Some(Role::VendorUser)),
        _ => Err(PrincipalError::UnsupportedRole(raw.to_string())),
    }
}

fn parse_kind(raw: &str) -> Result<Option<Role>, PrincipalError> {
    let folded: String = raw
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();
    match folded.as_str() {
        "" => Ok(None),
        "user" | "regularuser" => Ok(Some(Role::RegularUser)),
        "vendor" | "vendoruser" => Ok(Some(Role::VendorUser)),
        _ => Err(PrincipalError::UnsupportedRole(raw.to_string())),
    }
}
