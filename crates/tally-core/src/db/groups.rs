//! Expense-sharing group and membership operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::join_code;
use crate::models::{Group, GroupMember, GroupRole};

const GROUP_COLUMNS: &str = "id, name, join_code, created_by, created_at";

impl Database {
    /// Create a group; the creator becomes its owner member
    ///
    /// Join codes are derived, not stored secrets; on the rare collision the
    /// derivation is retried with a new attempt counter.
    pub fn create_group(&self, name: &str, created_by: &str) -> Result<Group> {
        let conn = self.conn()?;

        let mut group_id = None;
        for attempt in 0..join_code::MAX_ATTEMPTS {
            let code = join_code::generate(name, created_by, attempt);
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO expense_groups (name, join_code, created_by) \
                 VALUES (?1, ?2, ?3)",
                params![name, code, created_by],
            )?;
            if inserted == 1 {
                group_id = Some(conn.last_insert_rowid());
                break;
            }
        }
        let group_id = group_id
            .ok_or_else(|| Error::InvalidData("Could not generate a unique join code".into()))?;

        conn.execute(
            "INSERT INTO group_members (group_id, user_id, role) VALUES (?1, ?2, 'owner')",
            params![group_id, created_by],
        )?;
        drop(conn);

        self.get_group(group_id)?
            .ok_or_else(|| Error::NotFound(format!("Group {} not found after insert", group_id)))
    }

    pub fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let conn = self.conn()?;
        let group = conn
            .query_row(
                &format!("SELECT {} FROM expense_groups WHERE id = ?1", GROUP_COLUMNS),
                params![id],
                row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    pub fn get_group_by_join_code(&self, join_code: &str) -> Result<Option<Group>> {
        let conn = self.conn()?;
        let group = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expense_groups WHERE join_code = ?1",
                    GROUP_COLUMNS
                ),
                params![join_code],
                row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    /// List groups the user belongs to, newest membership first
    pub fn list_groups_for_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Group>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT g.{} FROM expense_groups g \
             JOIN group_members m ON m.group_id = g.id \
             WHERE m.user_id = ?1 \
             ORDER BY m.joined_at DESC, g.id DESC LIMIT ?2 OFFSET ?3",
            GROUP_COLUMNS.replace(", ", ", g.")
        ))?;
        let groups = stmt
            .query_map(params![user_id, limit, offset], row_to_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn count_groups_for_user(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM group_members WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn is_group_member(&self, group_id: i64, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let member: bool = conn
            .query_row(
                "SELECT 1 FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
                |_| Ok(true),
            )
            .unwrap_or(false);
        Ok(member)
    }

    /// Add `user_id` to a group as a regular member
    ///
    /// Returns InvalidData if the user already belongs to the group.
    pub fn add_group_member(&self, group_id: i64, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, user_id, role) \
             VALUES (?1, ?2, 'member')",
            params![group_id, user_id],
        )?;
        if inserted == 0 {
            return Err(Error::InvalidData(
                "User is already a member of this group".into(),
            ));
        }
        Ok(())
    }

    /// List members of a group with their mirrored emails where known
    pub fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.group_id, m.user_id, u.email, m.role, m.joined_at \
             FROM group_members m \
             LEFT JOIN users u ON u.id = m.user_id \
             WHERE m.group_id = ?1 \
             ORDER BY m.joined_at, m.user_id",
        )?;
        let members = stmt
            .query_map(params![group_id], |row| {
                let role: String = row.get(3)?;
                Ok(GroupMember {
                    group_id: row.get(0)?,
                    user_id: row.get(1)?,
                    email: row.get(2)?,
                    role: role.parse().unwrap_or(GroupRole::Member),
                    joined_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }

    /// Total paid into the group per member (members with no expenses included)
    pub fn group_paid_totals(&self, group_id: i64) -> Result<Vec<(String, f64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.user_id, COALESCE(SUM(e.amount), 0.0) \
             FROM group_members m \
             LEFT JOIN expenses e ON e.group_id = m.group_id AND e.user_id = m.user_id \
             WHERE m.group_id = ?1 \
             GROUP BY m.user_id \
             ORDER BY m.user_id",
        )?;
        let totals = stmt
            .query_map(params![group_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(totals)
    }
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        join_code: row.get(2)?,
        created_by: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}
