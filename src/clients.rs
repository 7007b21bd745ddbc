use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use axum::http::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use time::Date;

use crate::auth::dto::PublicUser;
use crate::categories::repo::Category;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::expenses::dto::StatsResponse;
use crate::expenses::repo::Expense;
use crate::util;

/// Aggregation fetches are unpaginated from the caller's point of view, so ask
/// the expense service for one large page instead of its 10-row default.
const FETCH_LIMIT: i64 = 10_000;

/// HTTP clients for the other services, built once at startup and injected
/// through `AppState` rather than held as process globals.
#[derive(Clone)]
pub struct ServiceClients {
    http: reqwest::Client,
    config: Arc<AppConfig>,
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    valid: bool,
    user: PublicUser,
}

#[derive(Debug, Deserialize)]
struct ExpenseListBody {
    expenses: Vec<Expense>,
}

#[derive(Debug, Deserialize)]
struct CategoryListBody {
    categories: Vec<Category>,
}

fn upstream_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

async fn upstream_error(resp: reqwest::Response) -> ApiError {
    let status = upstream_status(resp.status());
    let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| "External service error".to_string());
    ApiError::Upstream(status, message)
}

impl ServiceClients {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Resolve the caller behind a bearer header via the auth service.
    pub async fn validate_token(&self, authorization: &str) -> Result<PublicUser, ApiError> {
        let url = format!("{}/api/v1/auth/validate-token", self.config.auth_service_url);
        let resp = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("auth service unreachable: {e}")))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized("Invalid or expired token".into()));
        }
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }

        let body: ValidateBody = resp
            .json()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("invalid auth service response: {e}")))?;
        if !body.valid {
            return Err(ApiError::Unauthorized("Invalid token".into()));
        }
        Ok(body.user)
    }

    pub async fn expense_stats(
        &self,
        authorization: &str,
        start: Option<Date>,
        end: Option<Date>,
        category_id: Option<i32>,
    ) -> Result<StatsResponse, ApiError> {
        let url = format!("{}/api/v1/expenses/stats", self.config.expense_service_url);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(start) = start {
            params.push(("startDate", util::format_date(start)));
        }
        if let Some(end) = end {
            params.push(("endDate", util::format_date(end)));
        }
        if let Some(category_id) = category_id {
            params.push(("categoryId", category_id.to_string()));
        }

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .query(&params)
            .send()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("expense service unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        resp.json()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("invalid expense stats response: {e}")))
    }

    pub async fn list_expenses(
        &self,
        authorization: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<Vec<Expense>, ApiError> {
        let url = format!("{}/api/v1/expenses", self.config.expense_service_url);
        let mut params: Vec<(&str, String)> = vec![
            ("page", "1".to_string()),
            ("limit", FETCH_LIMIT.to_string()),
        ];
        if let Some(start) = start {
            params.push(("startDate", util::format_date(start)));
        }
        if let Some(end) = end {
            params.push(("endDate", util::format_date(end)));
        }

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .query(&params)
            .send()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("expense service unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        let body: ExpenseListBody = resp
            .json()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("invalid expense list response: {e}")))?;
        Ok(body.expenses)
    }

    pub async fn list_categories(&self, authorization: &str) -> Result<Vec<Category>, ApiError> {
        let url = format!("{}/api/v1/categories", self.config.category_service_url);
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("category service unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        let body: CategoryListBody = resp
            .json()
            .await
            .map_err(|e| ApiError::Internal(anyhow!("invalid category list response: {e}")))?;
        Ok(body.categories)
    }
}
