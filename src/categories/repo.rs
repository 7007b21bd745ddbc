use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// Category row. Rows with a NULL `user_id` are the seeded defaults, visible
/// to every user but owned by none.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub monthly_budget: Option<Decimal>,
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const CATEGORY_COLUMNS: &str =
    "id, user_id, name, color, icon, monthly_budget, is_default, created_at";

impl Category {
    /// Everything the user can see: their own categories plus the defaults.
    pub async fn list_visible(db: &PgPool, user_id: i32) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
             WHERE user_id = $1 OR user_id IS NULL
             ORDER BY is_default DESC, name ASC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_visible(
        db: &PgPool,
        id: i32,
        user_id: i32,
    ) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
             WHERE id = $1 AND (user_id = $2 OR user_id IS NULL)"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        user_id: i32,
        name: &str,
        color: Option<&str>,
        icon: Option<&str>,
        monthly_budget: Option<Decimal>,
    ) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (user_id, name, color, icon, monthly_budget)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(user_id)
        .bind(name)
        .bind(color)
        .bind(icon)
        .bind(monthly_budget)
        .fetch_one(db)
        .await
    }

    /// Partial update over owned rows only; the seeded defaults never match.
    pub async fn update(
        db: &PgPool,
        id: i32,
        user_id: i32,
        name: Option<&str>,
        color: Option<&str>,
        icon: Option<&str>,
        monthly_budget: Option<Decimal>,
    ) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET
                 name = COALESCE($3, name),
                 color = COALESCE($4, color),
                 icon = COALESCE($5, icon),
                 monthly_budget = COALESCE($6, monthly_budget)
             WHERE id = $1 AND user_id = $2
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(color)
        .bind(icon)
        .bind(monthly_budget)
        .fetch_optional(db)
        .await
    }

    pub async fn set_budget(
        db: &PgPool,
        id: i32,
        user_id: i32,
        monthly_budget: Decimal,
    ) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET monthly_budget = $3
             WHERE id = $1 AND user_id = $2
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(monthly_budget)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: i32, user_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
