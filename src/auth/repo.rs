use anyhow::Context;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, Role, User, UserRow};
use crate::ids::new_uid;

const USER_COLUMNS: &str = "id, uid, email, password_hash, first_name, last_name, role, \
     is_active, is_verified, last_login, created_at, updated_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    pub async fn find_by_uid(db: &PgPool, uid: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE uid = $1"
        ))
        .bind(uid)
        .fetch_optional(db)
        .await
        .context("find user by uid")?;
        row.map(User::try_from).transpose()
    }

    /// Create a new user. Runs on any executor so registration can insert the
    /// user and its profile in one transaction.
    pub async fn create<'e, E: PgExecutor<'e>>(db: E, new: &NewUser<'_>) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (uid, email, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new_uid("USR"))
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.role.as_str())
        .fetch_one(db)
        .await
        .context("insert user")?;
        User::try_from(row)
    }

    pub async fn touch_last_login(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("update last_login")?;
        Ok(())
    }

    /// Persist the mutable account fields.
    pub async fn save(&self, db: &PgPool) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET first_name = $2, last_name = $3, is_active = $4, is_verified = $5,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(self.is_active)
        .bind(self.is_verified)
        .fetch_one(db)
        .await
        .context("update user")?;
        User::try_from(row)
    }

    pub async fn set_active(db: &PgPool, id: Uuid, active: bool) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(db)
            .await
            .context("set user active flag")?;
        Ok(res.rows_affected() > 0)
    }

    /// Hard delete; profiles, appointments and reports cascade.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list(
        db: &PgPool,
        role: Option<Role>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE ($1::text IS NULL OR role = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(role.map(|r| r.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list users")?;
        rows.into_iter().map(User::try_from).collect()
    }
}
