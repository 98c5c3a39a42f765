//! Group balance computation
//!
//! Balances use an equal split: every member owes total / member_count, and a
//! member's net is what they paid minus that share. Positive net means the
//! group owes them.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::MemberBalance;

/// Compute per-member balances for a group
pub fn compute_group_balances(db: &Database, group_id: i64) -> Result<Vec<MemberBalance>> {
    db.get_group(group_id)?
        .ok_or_else(|| Error::NotFound(format!("Group {} not found", group_id)))?;

    let members = db.list_group_members(group_id)?;
    let paid_totals = db.group_paid_totals(group_id)?;

    let total: f64 = paid_totals.iter().map(|(_, paid)| paid).sum();
    let share = if members.is_empty() {
        0.0
    } else {
        total / members.len() as f64
    };

    let balances = members
        .iter()
        .map(|member| {
            let paid = paid_totals
                .iter()
                .find(|(user_id, _)| user_id == &member.user_id)
                .map(|(_, paid)| *paid)
                .unwrap_or(0.0);
            MemberBalance {
                user_id: member.user_id.clone(),
                email: member.email.clone(),
                paid,
                share,
                net: paid - share,
            }
        })
        .collect();

    Ok(balances)
}
