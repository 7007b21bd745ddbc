use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::auth::dto::PublicUser;

/// User record in the database. Users are never hard-deleted; `is_active`
/// gates login and token validation instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, is_active, created_at";

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_active_by_email(
        db: &PgPool,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = true"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_active_by_id(db: &PgPool, id: i32) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = true"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(db)
        .await
    }
}

/// Persisted refresh token. Several can be live per user; logout deletes one.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: i32,
    pub user_id: i32,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl RefreshToken {
    pub async fn insert(
        db: &PgPool,
        user_id: i32,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn find_valid(db: &PgPool, token: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at
             FROM refresh_tokens
             WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(db)
        .await
    }

    /// Idempotent: deleting an unknown token simply removes zero rows.
    pub async fn delete(db: &PgPool, token: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
