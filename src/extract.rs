use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::dto::PublicUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity for the category, expense and report services.
///
/// These services do not hold the JWT secret; they forward the bearer header
/// to the auth service's validate-token endpoint. The raw header is kept so
/// fan-out calls can pass the caller's credentials along.
pub struct RequestUser {
    pub user: PublicUser,
    pub authorization: String,
}

#[async_trait]
impl FromRequestParts<AppState> for RequestUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Authentication token required".into()))?
            .to_string();

        let user = state.clients.validate_token(&authorization).await?;
        Ok(Self {
            user,
            authorization,
        })
    }
}
