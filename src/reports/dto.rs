use serde::{Deserialize, Serialize};
use time::Date;

use crate::expenses::repo::Expense;
use crate::util;

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    pub interval: Option<String>,
    #[serde(default, with = "util::date_fmt::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "util::date_fmt::option")]
    pub end_date: Option<Date>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    #[serde(default, with = "util::date_fmt::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "util::date_fmt::option")]
    pub end_date: Option<Date>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyCategoryRow {
    pub category_id: i32,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct BudgetExceededRow {
    pub category_id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub budget: f64,
    pub spent: f64,
    #[serde(rename = "exceededBy")]
    pub exceeded_by: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub total_spent: f64,
    pub expense_count: usize,
    pub by_category: Vec<MonthlyCategoryRow>,
    pub budget_exceeded: Vec<BudgetExceededRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShareRow {
    pub category_id: i32,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct ByCategoryResponse {
    pub categories: Vec<CategoryShareRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendPointDto {
    pub date: String,
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendResponse {
    pub data: Vec<TrendPointDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMonth {
    pub spent: f64,
    pub expense_count: usize,
}

/// Keeps the snake_case `category_id` key, like the monthly report rows.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopCategory {
    pub category_id: i32,
    pub amount: f64,
}

/// Cached under `reports:dashboard:{user_id}`, so it round-trips through JSON.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub current_month: CurrentMonth,
    pub top_categories: Vec<TopCategory>,
    pub recent_expenses: Vec<Expense>,
    pub monthly_trend: Vec<TrendPointDto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_category_keeps_snake_case_key() {
        let entry = TopCategory {
            category_id: 3,
            amount: 10.0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("category_id").is_some());
        assert!(json.get("categoryId").is_none());
    }

    #[test]
    fn dashboard_sections_use_camel_case() {
        let dash = DashboardResponse {
            current_month: CurrentMonth {
                spent: 0.0,
                expense_count: 0,
            },
            top_categories: Vec::new(),
            recent_expenses: Vec::new(),
            monthly_trend: Vec::new(),
        };
        let json = serde_json::to_value(&dash).unwrap();
        assert!(json.get("currentMonth").is_some());
        assert!(json.get("topCategories").is_some());
        assert!(json.get("recentExpenses").is_some());
        assert!(json.get("monthlyTrend").is_some());
    }
}
