//! Expense CRUD and paginated listing

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Expense, ExpenseUpdate, NewExpense, SortOrder};

const EXPENSE_COLUMNS: &str = "id, user_id, group_id, category_id, description, amount, \
                               expense_date, created_at, updated_at";

/// Optional filters for expense listings
///
/// Shared between the list and count queries so both stay in sync.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpenseListFilter {
    pub category_id: Option<i64>,
    pub group_id: Option<i64>,
}

impl ExpenseListFilter {
    fn where_clause(&self) -> String {
        let mut clause = String::from("WHERE user_id = ?1");
        if self.category_id.is_some() {
            clause.push_str(" AND category_id = ?2");
        }
        if self.group_id.is_some() {
            // Parameter index depends on whether category_id is present
            if self.category_id.is_some() {
                clause.push_str(" AND group_id = ?3");
            } else {
                clause.push_str(" AND group_id = ?2");
            }
        }
        clause
    }

    fn params(&self, user_id: &str) -> Vec<Box<dyn rusqlite::ToSql>> {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];
        if let Some(category_id) = self.category_id {
            params.push(Box::new(category_id));
        }
        if let Some(group_id) = self.group_id {
            params.push(Box::new(group_id));
        }
        params
    }
}

/// Map a requested sort field onto a real column, defaulting to created_at
fn sort_column(field: Option<&str>) -> &'static str {
    match field {
        Some("amount") => "amount",
        Some("expense_date") => "expense_date",
        _ => "created_at",
    }
}

impl Database {
    /// Insert a new expense and return it
    pub fn create_expense(&self, new: &NewExpense) -> Result<Expense> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO expenses (user_id, group_id, category_id, description, amount, expense_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.user_id,
                new.group_id,
                new.category_id,
                new.description,
                new.amount,
                new.expense_date.map(|d| d.to_string()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_expense(id, &new.user_id)?
            .ok_or_else(|| Error::NotFound(format!("Expense {} not found after insert", id)))
    }

    /// Look up an expense owned by `user_id`
    pub fn get_expense(&self, id: i64, user_id: &str) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let expense = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2",
                    EXPENSE_COLUMNS
                ),
                params![id, user_id],
                row_to_expense,
            )
            .optional()?;
        Ok(expense)
    }

    /// List expenses owned by `user_id`, newest first by default
    pub fn list_expenses(
        &self,
        user_id: &str,
        filter: ExpenseListFilter,
        sort_field: Option<&str>,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Expense>> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {} FROM expenses {} ORDER BY {} {}, id {} LIMIT {} OFFSET {}",
            EXPENSE_COLUMNS,
            filter.where_clause(),
            sort_column(sort_field),
            order.as_sql(),
            order.as_sql(),
            limit,
            offset
        );

        let query_params = filter.params(user_id);
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let expenses = stmt
            .query_map(params_refs.as_slice(), row_to_expense)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(expenses)
    }

    /// Count expenses owned by `user_id` under the same filter as the listing
    pub fn count_expenses(&self, user_id: &str, filter: ExpenseListFilter) -> Result<i64> {
        let conn = self.conn()?;

        let sql = format!("SELECT COUNT(*) FROM expenses {}", filter.where_clause());
        let query_params = filter.params(user_id);
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let count = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Apply a partial update to an expense owned by `user_id`
    ///
    /// Returns the updated row, or NotFound if the expense does not exist or
    /// belongs to someone else.
    pub fn update_expense(&self, id: i64, user_id: &str, update: &ExpenseUpdate) -> Result<Expense> {
        let conn = self.conn()?;

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(description) = &update.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(amount) = update.amount {
            sets.push("amount = ?");
            values.push(Box::new(amount));
        }
        if let Some(category_id) = &update.category_id {
            sets.push("category_id = ?");
            values.push(Box::new(*category_id));
        }
        if let Some(group_id) = &update.group_id {
            sets.push("group_id = ?");
            values.push(Box::new(*group_id));
        }
        if let Some(expense_date) = &update.expense_date {
            sets.push("expense_date = ?");
            values.push(Box::new(expense_date.map(|d| d.to_string())));
        }

        if !sets.is_empty() {
            sets.push("updated_at = CURRENT_TIMESTAMP");
            let sql = format!(
                "UPDATE expenses SET {} WHERE id = ? AND user_id = ?",
                sets.join(", ")
            );
            values.push(Box::new(id));
            values.push(Box::new(user_id.to_string()));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                values.iter().map(|p| p.as_ref()).collect();
            let changed = conn.execute(&sql, params_refs.as_slice())?;
            if changed == 0 {
                return Err(Error::NotFound(format!("Expense {} not found", id)));
            }
        }
        drop(conn);

        self.get_expense(id, user_id)?
            .ok_or_else(|| Error::NotFound(format!("Expense {} not found", id)))
    }

    /// Delete an expense owned by `user_id`
    pub fn delete_expense(&self, id: i64, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Expense {} not found", id)));
        }
        Ok(())
    }
}

fn row_to_expense(row: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    let expense_date: Option<String> = row.get(6)?;
    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        group_id: row.get(2)?,
        category_id: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        expense_date: expense_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}
