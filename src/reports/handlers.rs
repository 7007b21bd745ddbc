use axum::{
    extract::{Query, State},
    http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    categories::repo::Category,
    error::ApiError,
    expenses::repo::Expense,
    extract::RequestUser,
    reports::{
        aggregate::{self, TrendPeriod},
        dto::{
            BudgetExceededRow, ByCategoryResponse, CategoryShareRow, CurrentMonth,
            DashboardResponse, MonthlyCategoryRow, MonthlyQuery, MonthlyReport, RangeQuery,
            TopCategory, TrendPointDto, TrendQuery, TrendResponse,
        },
        repo::GeneratedReport,
    },
    state::AppState,
    util,
};

const DASHBOARD_CACHE_TTL_SECS: u64 = 600;
const AUDIT_ROW_TTL: Duration = Duration::days(1);

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports/monthly", get(monthly))
        .route("/reports/trend", get(trend))
        .route("/reports/category", get(by_category))
        .route("/reports/export", post(export))
        .route("/reports/dashboard", get(dashboard))
}

pub fn dashboard_cache_key(user_id: i32) -> String {
    format!("reports:dashboard:{user_id}")
}

pub fn monthly_cache_key(user_id: i32) -> String {
    format!("reports:monthly:{user_id}")
}

fn dec(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Reports are built from whatever the expense service can provide; if it is
/// down the report degrades to an empty expense set rather than failing.
async fn fetch_expenses(
    state: &AppState,
    authorization: &str,
    start: Option<Date>,
    end: Option<Date>,
) -> Vec<Expense> {
    match state
        .clients
        .list_expenses(authorization, start, end)
        .await
    {
        Ok(expenses) => expenses,
        Err(error) => {
            warn!(%error, "expense service unavailable, reporting on empty set");
            Vec::new()
        }
    }
}

async fn fetch_categories(state: &AppState, authorization: &str) -> Vec<Category> {
    match state.clients.list_categories(authorization).await {
        Ok(categories) => categories,
        Err(error) => {
            warn!(%error, "category service unavailable, omitting budget data");
            Vec::new()
        }
    }
}

#[instrument(skip(state, caller))]
pub async fn monthly(
    State(state): State<AppState>,
    Query(query): Query<MonthlyQuery>,
    caller: RequestUser,
) -> Result<impl IntoResponse, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or(u8::from(today.month()));
    let (start, end) =
        util::month_range(year, month).ok_or_else(|| ApiError::Validation("Invalid month".into()))?;

    let expenses = fetch_expenses(&state, &caller.authorization, Some(start), Some(end)).await;
    let categories = fetch_categories(&state, &caller.authorization).await;

    let totals = aggregate::group_by_category(&expenses);
    let report = MonthlyReport {
        total_spent: dec(aggregate::total_spent(&expenses)),
        expense_count: expenses.len(),
        by_category: totals
            .iter()
            .map(|t| MonthlyCategoryRow {
                category_id: t.category_id,
                amount: dec(t.amount),
            })
            .collect(),
        budget_exceeded: aggregate::budget_exceeded(&totals, &categories)
            .into_iter()
            .map(|o| BudgetExceededRow {
                category_id: o.category_id,
                name: o.name,
                icon: o.icon,
                color: o.color,
                budget: dec(o.budget),
                spent: dec(o.spent),
                exceeded_by: dec(o.exceeded_by),
            })
            .collect(),
    };

    // Audit trail only; a failed insert never fails the report.
    if let Ok(data) = serde_json::to_value(&report) {
        let expires_at = OffsetDateTime::now_utc() + AUDIT_ROW_TTL;
        if let Err(error) = GeneratedReport::insert(
            &state.db,
            caller.user.id,
            "monthly",
            &data,
            Some(start),
            Some(end),
            expires_at,
        )
        .await
        {
            warn!(%error, user_id = %caller.user.id, "report audit insert failed");
        }
    }

    info!(user_id = %caller.user.id, year, month, "monthly report generated");
    Ok((
        [(CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        Json(report),
    ))
}

#[instrument(skip(state, caller))]
pub async fn trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
    caller: RequestUser,
) -> Result<Json<TrendResponse>, ApiError> {
    let period = resolve_interval(query.interval.as_deref())?;

    // Absent dates mean an unbounded range, not a synthesized window.
    let expenses =
        fetch_expenses(&state, &caller.authorization, query.start_date, query.end_date).await;
    let data = aggregate::trend_buckets(&expenses, period)
        .into_iter()
        .map(|p| TrendPointDto {
            date: p.date,
            amount: dec(p.amount),
        })
        .collect();

    Ok(Json(TrendResponse { data }))
}

fn resolve_interval(raw: Option<&str>) -> Result<TrendPeriod, ApiError> {
    match raw {
        None => Ok(TrendPeriod::Monthly),
        Some(raw) => {
            TrendPeriod::parse(raw).ok_or_else(|| ApiError::Validation("Invalid interval".into()))
        }
    }
}

#[instrument(skip(state, caller))]
pub async fn by_category(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
    caller: RequestUser,
) -> Result<Json<ByCategoryResponse>, ApiError> {
    let expenses =
        fetch_expenses(&state, &caller.authorization, query.start_date, query.end_date).await;
    let total = aggregate::total_spent(&expenses);
    let categories = aggregate::group_by_category(&expenses)
        .into_iter()
        .map(|t| CategoryShareRow {
            category_id: t.category_id,
            amount: dec(t.amount),
            percentage: aggregate::share_percentage(t.amount, total),
        })
        .collect();

    Ok(Json(ByCategoryResponse { categories }))
}

#[instrument(skip(state, caller, payload))]
pub async fn export(
    State(state): State<AppState>,
    caller: RequestUser,
    Json(payload): Json<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let expenses =
        fetch_expenses(&state, &caller.authorization, payload.start_date, payload.end_date).await;
    let csv = aggregate::to_csv(&expenses);

    info!(user_id = %caller.user.id, rows = expenses.len(), "expenses exported");
    Ok((
        [
            (CONTENT_TYPE, "text/csv"),
            (CONTENT_DISPOSITION, "attachment; filename=\"expenses.csv\""),
        ],
        csv,
    ))
}

#[instrument(skip(state, caller))]
pub async fn dashboard(
    State(state): State<AppState>,
    caller: RequestUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let key = dashboard_cache_key(caller.user.id);
    if let Some(cached) = state.cache.get_json::<DashboardResponse>(&key).await {
        return Ok(Json(cached));
    }

    // The recent list covers the user's whole history, so the fetch is
    // unbounded; the month and trend sections are carved out locally.
    let expenses = fetch_expenses(&state, &caller.authorization, None, None).await;
    let response = build_dashboard(&expenses, OffsetDateTime::now_utc().date());

    state
        .cache
        .put_json(&key, &response, DASHBOARD_CACHE_TTL_SECS)
        .await;
    Ok(Json(response))
}

/// Assembles the dashboard from the user's full expense history, newest
/// first. Only the trend is limited to the trailing six calendar months; the
/// recent list may reach arbitrarily far back.
fn build_dashboard(expenses: &[Expense], today: Date) -> DashboardResponse {
    let (month_start, month_end) =
        util::month_range(today.year(), u8::from(today.month())).unwrap_or((today, today));
    let window_start = util::months_back(today, 5).unwrap_or(month_start);

    let current: Vec<Expense> = expenses
        .iter()
        .filter(|e| e.expense_date >= month_start && e.expense_date <= month_end)
        .cloned()
        .collect();
    let windowed: Vec<Expense> = expenses
        .iter()
        .filter(|e| e.expense_date >= window_start)
        .cloned()
        .collect();

    DashboardResponse {
        current_month: CurrentMonth {
            spent: dec(aggregate::total_spent(&current)),
            expense_count: current.len(),
        },
        top_categories: aggregate::group_by_category(&current)
            .into_iter()
            .take(5)
            .map(|t| TopCategory {
                category_id: t.category_id,
                amount: dec(t.amount),
            })
            .collect(),
        recent_expenses: expenses.iter().take(10).cloned().collect(),
        monthly_trend: aggregate::trend_buckets(&windowed, TrendPeriod::Monthly)
            .into_iter()
            .map(|p| TrendPointDto {
                date: p.date,
                amount: dec(p.amount),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn cache_keys_are_per_user() {
        assert_eq!(dashboard_cache_key(7), "reports:dashboard:7");
        assert_eq!(monthly_cache_key(7), "reports:monthly:7");
    }

    #[test]
    fn missing_interval_defaults_to_monthly() {
        assert!(matches!(resolve_interval(None), Ok(TrendPeriod::Monthly)));
        assert!(matches!(
            resolve_interval(Some("daily")),
            Ok(TrendPeriod::Daily)
        ));
        assert!(resolve_interval(Some("hourly")).is_err());
    }

    fn expense(id: i32, category_id: i32, amount: &str, day: time::Date) -> Expense {
        use time::macros::datetime;

        let stamp = datetime!(2026-08-01 00:00 UTC);
        Expense {
            id,
            user_id: 1,
            category_id,
            amount: amount.parse().unwrap(),
            description: None,
            expense_date: day,
            receipt_url: None,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[test]
    fn dashboard_recents_reach_past_the_trend_window() {
        let today = date!(2026 - 08 - 29);
        let rows = vec![
            expense(2, 2, "10.00", date!(2026 - 08 - 10)),
            expense(1, 1, "40.00", date!(2025 - 09 - 01)),
        ];
        let dash = build_dashboard(&rows, today);

        assert_eq!(dash.recent_expenses.len(), 2);
        assert_eq!(dash.recent_expenses[1].id, 1);
        assert_eq!(dash.current_month.spent, 10.0);
        assert_eq!(dash.current_month.expense_count, 1);
        assert_eq!(dash.top_categories.len(), 1);
        assert_eq!(dash.top_categories[0].category_id, 2);
        // Trend covers the trailing six calendar months only.
        assert!(dash.monthly_trend.iter().all(|p| p.date.as_str() >= "2026-03"));
    }
}
