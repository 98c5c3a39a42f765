//! Tally Core Library
//!
//! Shared functionality for the Tally expense-tracking backend:
//! - Database access and migrations
//! - Identity-provider client (the auth delegate)
//! - Group balance computation
//! - Join-code derivation for expense-sharing groups

pub mod balances;
pub mod db;
pub mod error;
pub mod join_code;
pub mod models;
pub mod provider;

/// Test utilities including the mock identity provider
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use balances::compute_group_balances;
pub use db::{Database, ExpenseListFilter};
pub use error::{Error, Result};
pub use models::{
    Expense, ExpenseCategory, ExpenseUpdate, Group, GroupMember, GroupRole, MemberBalance,
    NewExpense, SortOrder, User,
};
pub use provider::{AuthProvider, ProviderUser, Session};
