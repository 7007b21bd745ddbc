use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    error::ApiError,
    events::{EXPENSE_CREATED, EXPENSE_DELETED, EXPENSE_UPDATED},
    expenses::{
        dto::{
            CreateExpenseRequest, ListQuery, ListResponse, MessageResponse, Pagination,
            StatsQuery, StatsResponse, UpdateExpenseRequest,
        },
        repo::Expense,
    },
    extract::RequestUser,
    state::AppState,
};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list).post(create))
        .route("/expenses/stats", get(stats))
        .route(
            "/expenses/:id",
            get(get_by_id).put(update).delete(remove),
        )
}

/// Clamps page and limit to sane values and turns them into a SQL window.
fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).max(1);
    (page, limit, (page - 1) * limit)
}

/// Publishing is best-effort: the caches these events invalidate expire on
/// their own, so a broker hiccup must not fail the write.
async fn publish_event(state: &AppState, event: &str, data: serde_json::Value) {
    let Some(events) = &state.events else {
        return;
    };
    if let Err(error) = events.publish(event, data).await {
        warn!(%error, event, "event publish failed");
    }
}

fn event_data(expense: &Expense) -> serde_json::Value {
    let mut data = serde_json::to_value(expense).unwrap_or_else(|_| json!({}));
    data["userId"] = json!(expense.user_id);
    data
}

#[instrument(skip(state, caller, payload))]
pub async fn create(
    State(state): State<AppState>,
    caller: RequestUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    if payload.amount <= Decimal::ZERO {
        return Err(ApiError::Validation("Amount must be positive".into()));
    }

    let expense = Expense::create(
        &state.db,
        caller.user.id,
        payload.category_id,
        payload.amount,
        payload.description.as_deref(),
        payload.expense_date,
        payload.receipt_url.as_deref(),
    )
    .await?;

    publish_event(&state, EXPENSE_CREATED, event_data(&expense)).await;
    info!(expense_id = %expense.id, user_id = %caller.user.id, "expense created");
    Ok((StatusCode::CREATED, Json(expense)))
}

#[instrument(skip(state, caller))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    caller: RequestUser,
) -> Result<Json<ListResponse>, ApiError> {
    let (page, limit, offset) = page_window(query.page, query.limit);
    let expenses = Expense::list(
        &state.db,
        caller.user.id,
        query.start_date,
        query.end_date,
        query.category_id,
        query.min_amount,
        query.max_amount,
        limit,
        offset,
    )
    .await?;

    Ok(Json(ListResponse {
        expenses,
        pagination: Pagination { page, limit },
    }))
}

#[instrument(skip(state, caller))]
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
) -> Result<Json<Expense>, ApiError> {
    let expense = Expense::find(&state.db, id, caller.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Expense not found".into()))?;
    Ok(Json(expense))
}

#[instrument(skip(state, caller, payload))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
    Json(payload): Json<UpdateExpenseRequest>,
) -> Result<Json<Expense>, ApiError> {
    if payload.amount.is_some_and(|a| a <= Decimal::ZERO) {
        return Err(ApiError::Validation("Amount must be positive".into()));
    }

    let expense = Expense::update(
        &state.db,
        id,
        caller.user.id,
        payload.amount,
        payload.category_id,
        payload.description.as_deref(),
        payload.expense_date,
        payload.receipt_url.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Expense not found".into()))?;

    publish_event(&state, EXPENSE_UPDATED, event_data(&expense)).await;
    info!(expense_id = %id, user_id = %caller.user.id, "expense updated");
    Ok(Json(expense))
}

#[instrument(skip(state, caller))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if !Expense::delete(&state.db, id, caller.user.id).await? {
        return Err(ApiError::NotFound("Expense not found".into()));
    }

    publish_event(
        &state,
        EXPENSE_DELETED,
        json!({ "id": id, "userId": caller.user.id }),
    )
    .await;
    info!(expense_id = %id, user_id = %caller.user.id, "expense deleted");
    Ok(Json(MessageResponse {
        message: "Deleted".into(),
    }))
}

#[instrument(skip(state, caller))]
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
    caller: RequestUser,
) -> Result<Json<StatsResponse>, ApiError> {
    let row = Expense::stats(
        &state.db,
        caller.user.id,
        query.start_date,
        query.end_date,
        query.category_id,
    )
    .await?;

    Ok(Json(StatsResponse {
        total_expenses: row.expense_count,
        total_amount: row.total_amount,
        average_amount: row.average_amount,
        min_amount: row.min_amount,
        max_amount: row.max_amount,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults() {
        assert_eq!(page_window(None, None), (1, 10, 0));
    }

    #[test]
    fn page_window_offsets_by_page() {
        assert_eq!(page_window(Some(3), Some(25)), (3, 25, 50));
    }

    #[test]
    fn page_window_clamps_nonsense() {
        assert_eq!(page_window(Some(0), Some(-5)), (1, 1, 0));
    }

    #[test]
    fn event_data_carries_owner_in_camel_case() {
        use time::macros::{date, datetime};

        let expense = Expense {
            id: 5,
            user_id: 9,
            category_id: 2,
            amount: Decimal::new(1999, 2),
            description: Some("Lunch".into()),
            expense_date: date!(2026 - 08 - 15),
            receipt_url: None,
            created_at: datetime!(2026-08-15 12:00 UTC),
            updated_at: datetime!(2026-08-15 12:00 UTC),
        };
        let data = event_data(&expense);
        assert_eq!(data["userId"], json!(9));
        assert_eq!(data["id"], json!(5));
        assert_eq!(data["expense_date"], json!("2026-08-15"));
    }
}
