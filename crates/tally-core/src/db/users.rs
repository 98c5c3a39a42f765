//! Mirrored provider user operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::User;

impl Database {
    /// Insert or refresh a user row from a validated provider session
    ///
    /// Called on every authenticated request, so it has to be cheap and
    /// conflict-safe. `created_at` keeps its original value on conflict.
    pub fn upsert_user(
        &self,
        id: &str,
        email: &str,
        full_name: Option<&str>,
        confirmed: bool,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO users (id, email, full_name, confirmed)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                full_name = COALESCE(excluded.full_name, users.full_name),
                confirmed = excluded.confirmed
            "#,
            params![id, email, full_name, confirmed as i64],
        )?;
        Ok(())
    }

    /// Look up a user by provider id
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, full_name, confirmed, created_at FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// The earliest-created user, if any
    ///
    /// Backs the unauthenticated demo endpoints; not used by production paths.
    pub fn first_user(&self) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, full_name, confirmed, created_at FROM users \
                 ORDER BY created_at, id LIMIT 1",
                [],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        confirmed: row.get::<_, i64>(3)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}
