//! Expense category handlers

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{clamp_page, sort_order, PageQuery};
use crate::validate::check;
use crate::{ApiResponse, AppError, AppState, CurrentUser, Page};
use tally_core::models::ExpenseCategory;

/// GET /api/v1/categories - List categories visible to the caller
///
/// Visibility: system categories, public categories, and the caller's own.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<ExpenseCategory>>>, AppError> {
    let (limit, offset) = clamp_page(params.limit, params.offset);

    let items = state.db.list_categories(
        &user.id,
        limit,
        offset,
        sort_order(params.order.as_deref()),
    )?;
    let total = state.db.count_categories(&user.id)?;

    Ok(ApiResponse::ok(Page::new(items, total, limit, offset)))
}

/// Request body for creating a category
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(
        required(message = "name is required"),
        length(min = 1, message = "name must not be empty")
    )]
    pub name: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub is_public: bool,
}

/// POST /api/v1/categories - Create a user-owned category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<ApiResponse<ExpenseCategory>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: CreateCategoryRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    let id = state.db.create_category(
        req.name.as_deref().unwrap_or_default(),
        req.parent_id,
        &user.id,
        req.is_public,
    )?;
    let category = state
        .db
        .get_category(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Category not found after creation"))?;

    Ok(ApiResponse::ok(category))
}
