//! API request handlers

mod catalog;
mod health;
mod items;
mod pickup;

pub use catalog::*;
pub use health::*;
pub use items::*;
pub use pickup::*;

use crate::error::{ApiError, ApiResult};
use std::fmt::Display;
use std::str::FromStr;

/// Parse a path identifier; malformed ids are a bad request, not a miss.
pub(crate) fn parse_id<T>(raw: &str) -> ApiResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid identifier '{raw}': {e}")))
}
