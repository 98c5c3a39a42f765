//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user mirrored from the identity provider
///
/// The provider owns the canonical record; this row is refreshed whenever a
/// bearer token is validated and exists so group membership and demo lookups
/// have something local to reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Provider-issued user id (UUID string)
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Whether the provider has confirmed the user's email
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

/// An expense record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    /// Owner (provider user id)
    pub user_id: String,
    /// Expense-sharing group, if the expense is shared
    pub group_id: Option<i64>,
    pub category_id: Option<i64>,
    pub description: String,
    pub amount: f64,
    /// Day the expense occurred (defaults to the creation day)
    pub expense_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An expense category
///
/// Categories form a hierarchy via `parent_id`. Visibility: system categories
/// and public categories are visible to everyone; user-owned categories only
/// to their owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub is_system: bool,
    pub is_public: bool,
    /// Owner for user-created categories; None for system/public ones
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An expense-sharing group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    /// Shareable code allowing self-enrollment
    pub join_code: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Membership of a user in a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: i64,
    pub user_id: String,
    pub email: Option<String>,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

/// Role of a member within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Owner,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for GroupRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            _ => Err(format!("Unknown group role: {}", s)),
        }
    }
}

/// Per-member balance within a group
///
/// `share` is the member's equal portion of the group total; `net` is what
/// they paid minus that share (positive means the group owes them).
#[derive(Debug, Clone, Serialize)]
pub struct MemberBalance {
    pub user_id: String,
    pub email: Option<String>,
    pub paid: f64,
    pub share: f64,
    pub net: f64,
}

/// Fields for creating an expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub user_id: String,
    pub group_id: Option<i64>,
    pub category_id: Option<i64>,
    pub description: String,
    pub amount: f64,
    pub expense_date: Option<NaiveDate>,
}

/// Fields for updating an expense (None = leave unchanged)
#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub group_id: Option<Option<i64>>,
    pub category_id: Option<Option<i64>>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub expense_date: Option<Option<NaiveDate>>,
}

/// Sort order for paginated listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}
