use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, ProfileResponse, PublicUser, RefreshRequest,
            RefreshResponse, RegisterRequest, RegisterResponse, ValidateResponse,
        },
        repo::{RefreshToken, User},
        services::{hash_password, is_valid_email, verify_password, AuthUser, JwtKeys},
    },
    error::ApiError,
    state::AppState,
};

/// TTL for the `user:{id}` profile snapshot.
const PROFILE_CACHE_TTL_SECS: u64 = 900;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/validate-token", post(validate_token))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

fn profile_key(user_id: i32) -> String {
    format!("user:{user_id}")
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.email,
        &hash,
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: user.public(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_active_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown or inactive user");
            ApiError::Unauthorized("Invalid credentials".into())
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::seconds(keys.refresh_ttl.as_secs() as i64);
    RefreshToken::insert(&state.db, user.id, &refresh_token, expires_at).await?;

    let public = user.public();
    state
        .cache
        .put_json(&profile_key(user.id), &public, PROFILE_CACHE_TTL_SECS)
        .await;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = payload
        .refresh_token
        .ok_or_else(|| ApiError::Validation("Refresh token required".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&token)
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token".into()))?;

    // The signed token alone is not enough; it must still be in the persisted
    // set and unexpired. No rotation happens here.
    if RefreshToken::find_valid(&state.db, &token).await?.is_none() {
        warn!(user_id = %claims.sub, "refresh token not in persisted set");
        return Err(ApiError::Unauthorized("Invalid refresh token".into()));
    }

    let access_token = keys.sign_access(claims.sub)?;
    Ok(Json(RefreshResponse { access_token }))
}

#[instrument(skip(state))]
pub async fn validate_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ValidateResponse>, ApiError> {
    let key = profile_key(user_id);
    if let Some(user) = state.cache.get_json::<PublicUser>(&key).await {
        return Ok(Json(ValidateResponse { valid: true, user }));
    }

    let user = User::find_active_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let public = user.public();
    state
        .cache
        .put_json(&key, &public, PROFILE_CACHE_TTL_SECS)
        .await;
    Ok(Json(ValidateResponse {
        valid: true,
        user: public,
    }))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(token) = payload.refresh_token {
        let removed = RefreshToken::delete(&state.db, &token).await?;
        info!(removed, "logout");
    }
    Ok(Json(
        serde_json::json!({ "message": "Logged out successfully" }),
    ))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_active_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ProfileResponse {
        id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        created_at: user.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_serializes_camel_case() {
        let user = PublicUser {
            id: 1,
            email: "test@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("firstName"));
        assert!(json.contains("lastName"));
        assert!(json.contains("test@example.com"));
    }

    #[test]
    fn auth_response_shape() {
        let body = AuthResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            user: PublicUser {
                id: 1,
                email: "x@y.z".into(),
                first_name: None,
                last_name: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("accessToken").is_some());
        assert!(json.get("refreshToken").is_some());
        assert!(json.get("user").is_some());
    }
}
