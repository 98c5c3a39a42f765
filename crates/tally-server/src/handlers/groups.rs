//! Expense-sharing group handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::{clamp_page, PageQuery};
use crate::validate::check;
use crate::{ApiResponse, AppError, AppState, CurrentUser, Page};
use tally_core::models::{Group, GroupMember, MemberBalance};

/// GET /api/v1/groups - List groups the caller belongs to
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<Group>>>, AppError> {
    let (limit, offset) = clamp_page(params.limit, params.offset);

    let items = state.db.list_groups_for_user(&user.id, limit, offset)?;
    let total = state.db.count_groups_for_user(&user.id)?;

    Ok(ApiResponse::ok(Page::new(items, total, limit, offset)))
}

/// Request body for creating a group
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(
        required(message = "name is required"),
        length(min = 1, message = "name must not be empty")
    )]
    pub name: Option<String>,
}

/// POST /api/v1/groups - Create a group; the caller becomes its owner
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<ApiResponse<Group>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: CreateGroupRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    let group = state
        .db
        .create_group(req.name.as_deref().unwrap_or_default(), &user.id)?;
    info!(user = %user.email, group = group.id, "Group created");

    Ok(ApiResponse::ok(group))
}

/// Request body for joining a group by code
#[derive(Debug, Deserialize, Validate)]
pub struct JoinGroupRequest {
    #[validate(
        required(message = "join_code is required"),
        length(min = 1, message = "join_code must not be empty")
    )]
    pub join_code: Option<String>,
}

/// Response body after joining a group
#[derive(Serialize)]
pub struct JoinGroupResponse {
    pub group: Group,
    pub member_count: usize,
}

/// POST /api/v1/groups/join - Self-enroll into a group via its join code
pub async fn join_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
) -> Result<Json<ApiResponse<JoinGroupResponse>>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: JoinGroupRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;
    check(&req)?;

    let code = req.join_code.as_deref().unwrap_or_default().trim();
    let group = state
        .db
        .get_group_by_join_code(code)?
        .ok_or_else(|| AppError::not_found("No group with that join code"))?;

    state.db.add_group_member(group.id, &user.id)?;
    let members = state.db.list_group_members(group.id)?;
    info!(user = %user.email, group = group.id, "Joined group via join code");

    Ok(ApiResponse::ok(JoinGroupResponse {
        group,
        member_count: members.len(),
    }))
}

/// GET /api/v1/groups/:id - Fetch one group the caller belongs to
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Group>>, AppError> {
    let group = member_group(&state, id, &user.id)?;
    Ok(ApiResponse::ok(group))
}

/// GET /api/v1/groups/:id/members - List members of a group
pub async fn list_group_members(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<GroupMember>>>, AppError> {
    member_group(&state, id, &user.id)?;
    let members = state.db.list_group_members(id)?;
    Ok(ApiResponse::ok(members))
}

/// GET /api/v1/groups/:id/balances - Per-member balances (equal split)
pub async fn get_group_balances(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<MemberBalance>>>, AppError> {
    member_group(&state, id, &user.id)?;
    let balances = tally_core::compute_group_balances(&state.db, id)?;
    Ok(ApiResponse::ok(balances))
}

/// Fetch a group, treating non-membership the same as non-existence
fn member_group(state: &AppState, group_id: i64, user_id: &str) -> Result<Group, AppError> {
    let group = state
        .db
        .get_group(group_id)?
        .filter(|_| {
            state
                .db
                .is_group_member(group_id, user_id)
                .unwrap_or(false)
        })
        .ok_or_else(|| AppError::not_found(&format!("Group {} not found", group_id)))?;
    Ok(group)
}
