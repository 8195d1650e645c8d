//! Strongly-typed identifiers for e-waste entities
//!
//! All IDs are UUID-based but wrapped in newtype structs for type safety.
//! The canonical text form is `<kind>:<uuid>`; parsing also accepts a bare
//! UUID so references written before the prefixed form still resolve.
//! Serialized values are always the bare UUID.

use crate::errors::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $kind, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                parse_reference(raw, $kind).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of an e-waste item.
    ItemId,
    "item"
);
uuid_id!(
    /// Identifier of a pickup request.
    RequestId,
    "request"
);
uuid_id!(
    /// Identifier of a status log entry.
    LogEntryId,
    "log"
);
uuid_id!(
    /// Identifier of an authenticated principal (regular user or vendor user).
    PrincipalId,
    "principal"
);
uuid_id!(CategoryId, "category");
uuid_id!(DepartmentId, "department");
uuid_id!(
    /// Identifier of a vendor organisation a vendor user is affiliated with.
    VendorId,
    "vendor"
);

/// Match a textual reference: canonical `<kind>:<uuid>` first, bare UUID second.
fn parse_reference(raw: &str, kind: &'static str) -> Result<Uuid, ParseError> {
    let raw = raw.trim();
    let malformed = || ParseError::MalformedId {
        kind,
        value: raw.to_string(),
    };

    if let Some((prefix, rest)) = raw.split_once(':') {
        if prefix == kind {
            return Uuid::parse_str(rest).map_err(|_| malformed());
        }
        if prefix.chars().all(|c| c.is_ascii_lowercase()) && Uuid::parse_str(rest).is_ok() {
            return Err(ParseError::WrongIdKind {
                expected: kind,
                found: prefix.to_string(),
            });
        }
    }

    Uuid::parse_str(raw).map_err(|_| malformed())
}
