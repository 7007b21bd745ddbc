use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::expenses::repo::Expense;
use crate::util;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub amount: Decimal,
    pub category_id: i32,
    pub description: Option<String>,
    #[serde(with = "util::date_fmt")]
    pub expense_date: Date,
    pub receipt_url: Option<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseRequest {
    pub amount: Option<Decimal>,
    pub category_id: Option<i32>,
    pub description: Option<String>,
    #[serde(default, with = "util::date_fmt::option")]
    pub expense_date: Option<Date>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default, with = "util::date_fmt::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "util::date_fmt::option")]
    pub end_date: Option<Date>,
    pub category_id: Option<i32>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default, with = "util::date_fmt::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "util::date_fmt::option")]
    pub end_date: Option<Date>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub expenses: Vec<Expense>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Aggregate figures over a filtered expense set. Also deserialized by the
/// category and report services when they call the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_expenses: i64,
    pub total_amount: f64,
    pub average_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn create_request_accepts_string_and_numeric_amounts() {
        let from_string: CreateExpenseRequest = serde_json::from_str(
            r#"{"amount":"12.50","categoryId":3,"expenseDate":"2026-08-01"}"#,
        )
        .unwrap();
        assert_eq!(from_string.amount, Decimal::new(1250, 2));
        assert_eq!(from_string.category_id, 3);
        assert_eq!(from_string.expense_date, date!(2026 - 08 - 01));

        let from_number: CreateExpenseRequest = serde_json::from_str(
            r#"{"amount":12.5,"categoryId":3,"expenseDate":"2026-08-01"}"#,
        )
        .unwrap();
        assert_eq!(from_number.amount, from_string.amount);
    }

    #[test]
    fn update_request_treats_empty_date_as_absent() {
        let req: UpdateExpenseRequest =
            serde_json::from_str(r#"{"expenseDate":"","amount":"3.00"}"#).unwrap();
        assert!(req.expense_date.is_none());
        assert_eq!(req.amount, Some(Decimal::new(300, 2)));
    }

    #[test]
    fn stats_response_uses_camel_case() {
        let stats = StatsResponse {
            total_expenses: 2,
            total_amount: 30.0,
            average_amount: 15.0,
            min_amount: 10.0,
            max_amount: 20.0,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("totalExpenses").is_some());
        assert!(json.get("averageAmount").is_some());
        let back: StatsResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_expenses, 2);
    }
}
