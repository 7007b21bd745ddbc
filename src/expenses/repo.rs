use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};

use crate::util;

/// Expense row. Category references are plain integers; the category service
/// owns that table and nothing here validates them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Expense {
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub amount: Decimal,
    pub description: Option<String>,
    #[serde(with = "util::date_fmt")]
    pub expense_date: Date,
    pub receipt_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Aggregates straight from Postgres, cast to FLOAT8 so sqlx can decode them
/// without knowing the NUMERIC precision.
#[derive(Debug, FromRow)]
pub struct StatsRow {
    pub expense_count: i64,
    pub total_amount: f64,
    pub average_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
}

const EXPENSE_COLUMNS: &str = "id, user_id, category_id, amount, description, expense_date, \
                               receipt_url, created_at, updated_at";

impl Expense {
    pub async fn create(
        db: &PgPool,
        user_id: i32,
        category_id: i32,
        amount: Decimal,
        description: Option<&str>,
        expense_date: Date,
        receipt_url: Option<&str>,
    ) -> Result<Expense, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "INSERT INTO expenses (user_id, category_id, amount, description, expense_date, receipt_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(category_id)
        .bind(amount)
        .bind(description)
        .bind(expense_date)
        .bind(receipt_url)
        .fetch_one(db)
        .await
    }

    /// Newest-first page of the user's expenses, with every filter optional.
    #[allow(clippy::too_many_arguments)]
    pub async fn list(
        db: &PgPool,
        user_id: i32,
        start: Option<Date>,
        end: Option<Date>,
        category_id: Option<i32>,
        min_amount: Option<Decimal>,
        max_amount: Option<Decimal>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Expense>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses
             WHERE user_id = $1
               AND ($2::date IS NULL OR expense_date >= $2)
               AND ($3::date IS NULL OR expense_date <= $3)
               AND ($4::int4 IS NULL OR category_id = $4)
               AND ($5::numeric IS NULL OR amount >= $5)
               AND ($6::numeric IS NULL OR amount <= $6)
             ORDER BY expense_date DESC, id DESC
             LIMIT $7 OFFSET $8"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(category_id)
        .bind(min_amount)
        .bind(max_amount)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn find(db: &PgPool, id: i32, user_id: i32) -> Result<Option<Expense>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn update(
        db: &PgPool,
        id: i32,
        user_id: i32,
        amount: Option<Decimal>,
        category_id: Option<i32>,
        description: Option<&str>,
        expense_date: Option<Date>,
        receipt_url: Option<&str>,
    ) -> Result<Option<Expense>, sqlx::Error> {
        sqlx::query_as::<_, Expense>(&format!(
            "UPDATE expenses SET
                 amount = COALESCE($3, amount),
                 category_id = COALESCE($4, category_id),
                 description = COALESCE($5, description),
                 expense_date = COALESCE($6, expense_date),
                 receipt_url = COALESCE($7, receipt_url),
                 updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(amount)
        .bind(category_id)
        .bind(description)
        .bind(expense_date)
        .bind(receipt_url)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: i32, user_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(
        db: &PgPool,
        user_id: i32,
        start: Option<Date>,
        end: Option<Date>,
        category_id: Option<i32>,
    ) -> Result<StatsRow, sqlx::Error> {
        sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS expense_count,
                    COALESCE(SUM(amount), 0)::FLOAT8 AS total_amount,
                    COALESCE(AVG(amount), 0)::FLOAT8 AS average_amount,
                    COALESCE(MIN(amount), 0)::FLOAT8 AS min_amount,
                    COALESCE(MAX(amount), 0)::FLOAT8 AS max_amount
             FROM expenses
             WHERE user_id = $1
               AND ($2::date IS NULL OR expense_date >= $2)
               AND ($3::date IS NULL OR expense_date <= $3)
               AND ($4::int4 IS NULL OR category_id = $4)",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(category_id)
        .fetch_one(db)
        .await
    }
}
