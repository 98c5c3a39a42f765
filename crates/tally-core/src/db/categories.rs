//! Expense category operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ExpenseCategory, SortOrder};

const CATEGORY_COLUMNS: &str =
    "id, name, parent_id, is_system, is_public, user_id, created_at";

impl Database {
    /// Seed the system root categories (idempotent - skips existing ones)
    pub fn seed_system_categories(&self) -> Result<()> {
        let conn = self.conn()?;

        let roots = [
            "Housing",
            "Utilities",
            "Groceries",
            "Dining",
            "Transport",
            "Healthcare",
            "Shopping",
            "Entertainment",
            "Travel",
            "Other",
        ];

        for name in &roots {
            // NULL parent_id needs explicit handling in the uniqueness check
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM expense_categories \
                     WHERE name = ? AND parent_id IS NULL AND is_system = 1",
                    params![name],
                    |_| Ok(true),
                )
                .unwrap_or(false);

            if !exists {
                conn.execute(
                    "INSERT INTO expense_categories (name, parent_id, is_system, is_public) \
                     VALUES (?, NULL, 1, 1)",
                    params![name],
                )?;
            }
        }

        Ok(())
    }

    /// Create a user-owned category, optionally under a parent
    ///
    /// The parent must be visible to the same user.
    pub fn create_category(
        &self,
        name: &str,
        parent_id: Option<i64>,
        user_id: &str,
        is_public: bool,
    ) -> Result<i64> {
        let conn = self.conn()?;

        if let Some(parent) = parent_id {
            let visible: bool = conn
                .query_row(
                    "SELECT 1 FROM expense_categories \
                     WHERE id = ?1 AND (is_system = 1 OR is_public = 1 OR user_id = ?2)",
                    params![parent, user_id],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !visible {
                return Err(Error::NotFound(format!("Category {} not found", parent)));
            }
        }

        conn.execute(
            "INSERT INTO expense_categories (name, parent_id, is_system, is_public, user_id) \
             VALUES (?1, ?2, 0, ?3, ?4)",
            params![name, parent_id, is_public as i64, user_id],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Look up a single category if it is visible to `user_id`
    pub fn get_category(&self, id: i64, user_id: &str) -> Result<Option<ExpenseCategory>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expense_categories \
                     WHERE id = ?1 AND (is_system = 1 OR is_public = 1 OR user_id = ?2)",
                    CATEGORY_COLUMNS
                ),
                params![id, user_id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// List categories visible to `user_id` (system, public, or owned)
    pub fn list_categories(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
        order: SortOrder,
    ) -> Result<Vec<ExpenseCategory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM expense_categories \
             WHERE is_system = 1 OR is_public = 1 OR user_id = ?1 \
             ORDER BY created_at {}, id {} LIMIT ?2 OFFSET ?3",
            CATEGORY_COLUMNS,
            order.as_sql(),
            order.as_sql()
        ))?;

        let categories = stmt
            .query_map(params![user_id, limit, offset], row_to_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    /// Count categories visible to `user_id`
    pub fn count_categories(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM expense_categories \
             WHERE is_system = 1 OR is_public = 1 OR user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExpenseCategory> {
    Ok(ExpenseCategory {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        is_system: row.get::<_, i64>(3)? != 0,
        is_public: row.get::<_, i64>(4)? != 0,
        user_id: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}
