use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::categories::repo::Category;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub monthly_budget: Option<Decimal>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub monthly_budget: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub monthly_budget: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SpendingQuery {
    /// Calendar month as `YYYY-MM`; defaults to the current month.
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Budget-vs-actual snapshot for one category in one calendar month.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpendingResponse {
    pub category_id: i32,
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percentage: f64,
}
