//! Reference data: item categories and reporting departments.

use crate::errors::ParseError;
use crate::ids::{CategoryId, DepartmentId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryKind {
    Recyclable,
    Reusable,
    Hazardous,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Recyclable => "RECYCLABLE",
            CategoryKind::Reusable => "REUSABLE",
            CategoryKind::Hazardous => "HAZARDOUS",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "RECYCLABLE" => Ok(CategoryKind::Recyclable),
            "REUSABLE" => Ok(CategoryKind::Reusable),
            "HAZARDOUS" => Ok(CategoryKind::Hazardous),
            _ => Err(ParseError::UnknownCategoryKind(raw.to_string())),
        }
    }
}

/// A category an item is filed under. Names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub kind: CategoryKind,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            id: CategoryId::generate(),
            name: name.into(),
            kind,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A department items are reported from. Names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DepartmentId::generate(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
