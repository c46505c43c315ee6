use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::RecordId,
    protocol::{UserInput, UserRecord, UserRole},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Sortable columns of the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Id,
    Name,
    Email,
    Role,
    CreatedAt,
}

impl UserColumn {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "id" => Some(UserColumn::Id),
            "name" => Some(UserColumn::Name),
            "email" => Some(UserColumn::Email),
            "role" => Some(UserColumn::Role),
            "created_at" => Some(UserColumn::CreatedAt),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            UserColumn::Id => "id",
            UserColumn::Name => "name",
            UserColumn::Email => "email",
            UserColumn::Role => "role",
            UserColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSort {
    pub column: UserColumn,
    pub descending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring match on the name.
    pub name: Option<String>,
    pub role: Option<UserRole>,
    /// Applied in order; empty means primary-key order.
    pub sort: Vec<UserSort>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub rows: Vec<UserRecord>,
    pub total: u64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let in_memory = database_url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every in-memory connection is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_users_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_users_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL,
                email      TEXT NOT NULL UNIQUE,
                role       TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure users table exists")?;
        Ok(())
    }

    pub async fn create_user(&self, input: &UserInput) -> Result<UserRecord> {
        let row = sqlx::query(
            "INSERT INTO users (name, email, role, created_at) VALUES (?, ?, ?, ?)
             RETURNING id, name, email, role, created_at",
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(input.role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert user '{}'", input.email))?;
        user_from_row(&row)
    }

    pub async fn get_user(&self, id: RecordId) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, name, email, role, created_at FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn update_user(&self, id: RecordId, input: &UserInput) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            "UPDATE users SET name = ?, email = ?, role = ? WHERE id = ?
             RETURNING id, name, email, role, created_at",
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(input.role.as_str())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update user {}", id.0))?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn delete_user(&self, id: RecordId) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    pub async fn delete_users_by_role(&self, role: UserRole) -> Result<u64> {
        let affected = sqlx::query("DELETE FROM users WHERE role = ?")
            .bind(role.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    pub async fn list_users(&self, filter: &UserFilter) -> Result<UserPage> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        push_user_conditions(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .context("failed to count users")?;

        let mut select =
            QueryBuilder::<Sqlite>::new("SELECT id, name, email, role, created_at FROM users");
        push_user_conditions(&mut select, filter);
        select.push(" ORDER BY ");
        for sort in &filter.sort {
            select.push(sort.column.as_sql());
            select.push(if sort.descending { " DESC, " } else { " ASC, " });
        }
        select.push("id ASC LIMIT ");
        select.push_bind(i64::from(filter.limit));
        select.push(" OFFSET ");
        select.push_bind(i64::from(filter.offset));

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to list users")?;
        let rows = rows.iter().map(user_from_row).collect::<Result<Vec<_>>>()?;
        Ok(UserPage {
            rows,
            total: total.max(0) as u64,
        })
    }
}

fn push_user_conditions(builder: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    let mut separator = " WHERE ";
    if let Some(name) = filter.name.as_deref().filter(|name| !name.is_empty()) {
        builder.push(separator);
        builder.push("name LIKE ");
        builder.push_bind(format!("%{name}%"));
        separator = " AND ";
    }
    if let Some(role) = filter.role {
        builder.push(separator);
        builder.push("role = ");
        builder.push_bind(role.as_str());
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    let role: String = row.try_get("role")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(UserRecord {
        id: RecordId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: UserRole::parse(&role).ok_or_else(|| anyhow!("unknown role '{role}' in users table"))?,
        created_at,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
