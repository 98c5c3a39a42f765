//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod expenses;
pub mod groups;
pub mod oauth;
pub mod testing;

// Re-export all handlers for use in router
pub use admin::*;
pub use auth::*;
pub use categories::*;
pub use expenses::*;
pub use groups::*;
pub use oauth::*;
pub use testing::*;

use serde::Deserialize;
use tally_core::models::SortOrder;

use crate::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

pub(crate) fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

/// Clamp pagination parameters into their allowed ranges
pub(crate) fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_PAGE_LIMIT), offset.max(0))
}

/// Sort direction from a query parameter, defaulting to descending
pub(crate) fn sort_order(order: Option<&str>) -> SortOrder {
    match order {
        Some("asc") | Some("ASC") => SortOrder::Asc,
        _ => SortOrder::Desc,
    }
}

/// Pagination query parameters for listings without extra filters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Sort direction (asc or desc, default desc)
    pub order: Option<String>,
}
