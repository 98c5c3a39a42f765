//! Liveness probe and unauthenticated demo lookups
//!
//! The `/expenses/test` endpoints skip authentication and operate on the
//! first user in the database. They exist for local testing against a fresh
//! deployment and are NOT for production use.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::{clamp_page, sort_order, PageQuery};
use crate::{ApiResponse, AppError, AppState, Page};
use tally_core::models::{Expense, ExpenseCategory, SortOrder, User};
use tally_core::ExpenseListFilter;

/// Response for the liveness probe
#[derive(Serialize)]
pub struct LivenessResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
}

/// GET /api/v1/test - Liveness probe
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        success: true,
        message: "Test endpoint working",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Payload for the demo expense listing
#[derive(Serialize)]
pub struct TestExpensesResponse {
    pub user: User,
    pub expenses: Page<Expense>,
}

/// GET /api/v1/expenses/test - Demo: first user's expenses, no auth
pub async fn test_expenses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<TestExpensesResponse>>, AppError> {
    let user = first_user(&state)?;
    let (limit, offset) = clamp_page(params.limit, params.offset);

    let items = state.db.list_expenses(
        &user.id,
        ExpenseListFilter::default(),
        None,
        sort_order(params.order.as_deref()),
        limit,
        offset,
    )?;
    let total = state
        .db
        .count_expenses(&user.id, ExpenseListFilter::default())?;

    Ok(ApiResponse::ok_with_message(
        TestExpensesResponse {
            expenses: Page::new(items, total, limit, offset),
            user,
        },
        "Test endpoint - not for production",
    ))
}

/// GET /api/v1/expenses/test/categories - Demo: first user's visible categories
pub async fn test_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<ExpenseCategory>>>, AppError> {
    let user = first_user(&state)?;
    let (limit, offset) = clamp_page(params.limit, params.offset);

    let items = state
        .db
        .list_categories(&user.id, limit, offset, SortOrder::Desc)?;
    let total = state.db.count_categories(&user.id)?;

    Ok(ApiResponse::ok_with_message(
        Page::new(items, total, limit, offset),
        "Test endpoint - not for production",
    ))
}

fn first_user(state: &AppState) -> Result<User, AppError> {
    state
        .db
        .first_user()?
        .ok_or_else(|| AppError::not_found("No users in database"))
}
