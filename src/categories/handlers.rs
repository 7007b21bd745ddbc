use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    categories::{
        dto::{
            BudgetRequest, CategoryListResponse, CreateCategoryRequest, MessageResponse,
            SpendingQuery, SpendingResponse, UpdateCategoryRequest,
        },
        repo::Category,
    },
    error::ApiError,
    extract::RequestUser,
    state::AppState,
    util,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route(
            "/categories/:id",
            get(get_by_id).put(update).delete(remove),
        )
        .route("/categories/:id/budget", put(set_budget))
        .route("/categories/:id/spending", get(get_spending))
}

#[instrument(skip(state, caller))]
pub async fn list(
    State(state): State<AppState>,
    caller: RequestUser,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = Category::list_visible(&state.db, caller.user.id).await?;
    Ok(Json(CategoryListResponse { categories }))
}

#[instrument(skip(state, caller))]
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
) -> Result<Json<Category>, ApiError> {
    let category = Category::find_visible(&state.db, id, caller.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".into()))?;
    Ok(Json(category))
}

#[instrument(skip(state, caller, payload))]
pub async fn create(
    State(state): State<AppState>,
    caller: RequestUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Category name is required".into()));
    }
    if payload.monthly_budget.is_some_and(|b| b < Decimal::ZERO) {
        return Err(ApiError::Validation("Budget must not be negative".into()));
    }

    let category = Category::create(
        &state.db,
        caller.user.id,
        name,
        payload.color.as_deref(),
        payload.icon.as_deref(),
        payload.monthly_budget,
    )
    .await?;

    info!(category_id = %category.id, user_id = %caller.user.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, caller, payload))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::Validation("Category name is required".into()));
    }
    if payload.monthly_budget.is_some_and(|b| b < Decimal::ZERO) {
        return Err(ApiError::Validation("Budget must not be negative".into()));
    }

    let category = Category::update(
        &state.db,
        id,
        caller.user.id,
        payload.name.as_deref().map(str::trim),
        payload.color.as_deref(),
        payload.icon.as_deref(),
        payload.monthly_budget,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Category not found".into()))?;

    info!(category_id = %id, user_id = %caller.user.id, "category updated");
    Ok(Json(category))
}

#[instrument(skip(state, caller))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if !Category::delete(&state.db, id, caller.user.id).await? {
        return Err(ApiError::NotFound("Category not found".into()));
    }
    info!(category_id = %id, user_id = %caller.user.id, "category deleted");
    Ok(Json(MessageResponse {
        message: "Deleted".into(),
    }))
}

#[instrument(skip(state, caller, payload))]
pub async fn set_budget(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    caller: RequestUser,
    Json(payload): Json<BudgetRequest>,
) -> Result<Json<Category>, ApiError> {
    if payload.monthly_budget < Decimal::ZERO {
        return Err(ApiError::Validation("Budget must not be negative".into()));
    }

    let category = Category::set_budget(&state.db, id, caller.user.id, payload.monthly_budget)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".into()))?;

    info!(category_id = %id, user_id = %caller.user.id, "budget set");
    Ok(Json(category))
}

#[instrument(skip(state, caller))]
pub async fn get_spending(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<SpendingQuery>,
    caller: RequestUser,
) -> Result<Json<SpendingResponse>, ApiError> {
    let (year, month) = match query.month.as_deref() {
        Some(raw) => {
            parse_year_month(raw).ok_or_else(|| ApiError::Validation("Invalid month".into()))?
        }
        None => {
            let today = OffsetDateTime::now_utc().date();
            (today.year(), u8::from(today.month()))
        }
    };
    let (start, end) =
        util::month_range(year, month).ok_or_else(|| ApiError::Validation("Invalid month".into()))?;

    let category = Category::find_visible(&state.db, id, caller.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".into()))?;

    let budget = category
        .monthly_budget
        .and_then(|b| b.to_f64())
        .unwrap_or(0.0);

    // The spending figure is advisory; if the expense service is down we
    // report zero spend rather than failing the whole request.
    let spent = match state
        .clients
        .expense_stats(&caller.authorization, Some(start), Some(end), Some(id))
        .await
    {
        Ok(stats) => stats.total_amount,
        Err(error) => {
            warn!(category_id = %id, %error, "expense stats unavailable, assuming zero spend");
            0.0
        }
    };

    let (remaining, percentage) = compute_spending(budget, spent);
    Ok(Json(SpendingResponse {
        category_id: id,
        budget,
        spent,
        remaining,
        percentage,
    }))
}

fn parse_year_month(raw: &str) -> Option<(i32, u8)> {
    let (year, month) = raw.split_once('-')?;
    Some((year.parse().ok()?, month.parse().ok()?))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Remaining budget and percent-used for a month. A zero budget reports zero
/// for both rather than dividing by zero; percent-used is capped at 100.
fn compute_spending(budget: f64, spent: f64) -> (f64, f64) {
    if budget <= 0.0 {
        return (0.0, 0.0);
    }
    let remaining = (budget - spent).max(0.0);
    let percentage = (spent / budget * 100.0).min(100.0);
    (round2(remaining), round2(percentage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spending_within_budget() {
        let (remaining, percentage) = compute_spending(200.0, 50.0);
        assert_eq!(remaining, 150.0);
        assert_eq!(percentage, 25.0);
    }

    #[test]
    fn spending_over_budget_caps_at_hundred_percent() {
        let (remaining, percentage) = compute_spending(100.0, 250.0);
        assert_eq!(remaining, 0.0);
        assert_eq!(percentage, 100.0);
    }

    #[test]
    fn zero_budget_reports_zeros() {
        let (remaining, percentage) = compute_spending(0.0, 42.0);
        assert_eq!(remaining, 0.0);
        assert_eq!(percentage, 0.0);
    }

    #[test]
    fn percentages_round_to_two_decimals() {
        let (_, percentage) = compute_spending(300.0, 100.0);
        assert_eq!(percentage, 33.33);
    }

    #[test]
    fn year_month_parsing() {
        assert_eq!(parse_year_month("2026-08"), Some((2026, 8)));
        assert_eq!(parse_year_month("2026-8"), Some((2026, 8)));
        assert_eq!(parse_year_month("2026"), None);
        assert_eq!(parse_year_month("august"), None);
    }
}
