//! Expense CRUD handlers
//!
//! All operations are scoped to the authenticated owner; there is no shared
//! visibility beyond group balance aggregation.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use super::{clamp_page, default_limit, sort_order};
use crate::validate::check;
use crate::{ApiResponse, AppError, AppState, CurrentUser, Page};
use tally_core::models::{Expense, ExpenseUpdate, NewExpense};
use tally_core::ExpenseListFilter;

/// Query parameters for listing expenses
#[derive(Debug, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Sort field (created_at, amount, or expense_date)
    pub sort: Option<String>,
    /// Sort direction (asc or desc, default desc)
    pub order: Option<String>,
    pub category_id: Option<i64>,
    pub group_id: Option<i64>,
}

/// GET /api/v1/expenses - List the caller's expenses
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ExpenseQuery>,
) -> Result<Json<ApiResponse<Page<Expense>>>, AppError> {
    let (limit, offset) = clamp_page(params.limit, params.offset);
    let filter = ExpenseListFilter {
        category_id: params.category_id,
        group_id: params.group_id,
    };

    let items = state.db.list_expenses(
        &user.id,
        filter,
        params.sort.as_deref(),
        sort_order(params.order.as_deref()),
        limit,
        offset,
    )?;
    let total = state.db.count_expenses(&user.id, filter)?;

    Ok(ApiResponse::ok(Page::new(items, total, limit, offset)))
}

/// Request body for creating an expense
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(
        required(message = "description is required"),
        length(min = 1, message = "description must not be empty")
    )]
    pub description: Option<String>,
    #[validate(required(message = "amount is required"))]
    pub amount: Option<f64>,
    pub category_id: Option<i64>,
    pub group_id: Option<i64>,
    /// YYYY-MM-DD
    pub expense_date: Option<String>,
}

/// POST /api/v1/expenses - Create an expense
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<ApiResponse<Expense>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: CreateExpenseRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    // Shared expenses must target a group the caller belongs to
    if let Some(group_id) = req.group_id {
        if !state.db.is_group_member(group_id, &user.id)? {
            return Err(AppError::not_found(&format!("Group {} not found", group_id)));
        }
    }

    let expense_date = parse_expense_date(req.expense_date.as_deref())?;
    let expense = state.db.create_expense(&NewExpense {
        user_id: user.id.clone(),
        group_id: req.group_id,
        category_id: req.category_id,
        description: req.description.unwrap_or_default(),
        amount: req.amount.unwrap_or_default(),
        expense_date,
    })?;

    Ok(ApiResponse::ok(expense))
}

/// GET /api/v1/expenses/:id - Fetch one expense
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Expense>>, AppError> {
    let expense = state
        .db
        .get_expense(id, &user.id)?
        .ok_or_else(|| AppError::not_found(&format!("Expense {} not found", id)))?;
    Ok(ApiResponse::ok(expense))
}

/// Request body for updating an expense (all fields optional)
#[derive(Debug, Deserialize)]
pub struct UpdateExpenseRequest {
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category_id: Option<Option<i64>>,
    pub group_id: Option<Option<i64>>,
    pub expense_date: Option<Option<String>>,
}

/// PUT /api/v1/expenses/:id - Update an expense
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<ApiResponse<Expense>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: UpdateExpenseRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    if let Some(description) = &req.description {
        if description.trim().is_empty() {
            return Err(AppError::bad_request("description must not be empty"));
        }
    }
    if let Some(Some(group_id)) = req.group_id {
        if !state.db.is_group_member(group_id, &user.id)? {
            return Err(AppError::not_found(&format!("Group {} not found", group_id)));
        }
    }

    let expense_date = match &req.expense_date {
        None => None,
        Some(None) => Some(None),
        Some(Some(raw)) => Some(Some(parse_expense_date(Some(raw))?.ok_or_else(|| {
            AppError::bad_request("expense_date must be YYYY-MM-DD")
        })?)),
    };

    let expense = state.db.update_expense(
        id,
        &user.id,
        &ExpenseUpdate {
            description: req.description,
            amount: req.amount,
            category_id: req.category_id,
            group_id: req.group_id,
            expense_date,
        },
    )?;

    Ok(ApiResponse::ok(expense))
}

/// DELETE /api/v1/expenses/:id - Delete an expense
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    state.db.delete_expense(id, &user.id)?;
    Ok(ApiResponse::ok(serde_json::json!({ "deleted": id })))
}

fn parse_expense_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::bad_request("expense_date must be YYYY-MM-DD")),
    }
}
