use axum::{
    Extension, Form, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use bazaar_auth::accounts;
use bazaar_types::api::{
    LogoutRequest, RefreshRequest, RegisterRequest, RegisterResponse, TokenForm, TokenResponse,
    UserResponse,
};
use bazaar_types::models::User;

use crate::AppState;
use crate::error::ApiError;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.phone.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("phone and password required".into()));
    }

    // Argon2 is CPU-bound; keep it off the request workers.
    let worker_state = state.clone();
    let user = tokio::task::spawn_blocking(move || {
        accounts::register(
            &worker_state.db,
            &worker_state.credentials,
            &req.phone,
            &req.password,
            req.full_name.as_deref(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(None)
    })?
    .map_err(|e| state.auth_err(e))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            phone: user.phone,
            role: user.role,
        }),
    ))
}

/// OAuth2 password-grant shaped login: `username` carries the phone.
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<impl IntoResponse, ApiError> {
    let fingerprint = form.device_fingerprint.clone();

    let worker_state = state.clone();
    let (user, access_token) = tokio::task::spawn_blocking(move || {
        accounts::login(
            &worker_state.db,
            &worker_state.credentials,
            &worker_state.tokens,
            &form.username,
            &form.password,
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(None)
    })?
    .map_err(|e| state.auth_err(e))?;

    // A session is only tracked when the client identifies its device.
    let refresh_token = match fingerprint.as_deref() {
        Some(fp) if !fp.is_empty() => {
            let user_id = user.id.to_string();
            let device = state
                .sessions
                .register_device(&state.db, &user_id, fp)
                .map_err(|e| state.auth_err(e))?;
            Some(
                state
                    .tokens
                    .mint_refresh(&state.db, &user_id, &device.id.to_string())
                    .map_err(|e| state.auth_err(e))?,
            )
        }
        _ => None,
    };

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
        refresh_token,
    }))
}

/// Exchange a refresh token for a rotated pair. Reuse of a retired token
/// fails here with the same 401 as any other invalid token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rotated = state
        .tokens
        .rotate_refresh(&state.db, &req.refresh_token)
        .map_err(|e| state.auth_err(e))?;

    let access_token = state
        .tokens
        .mint_access(&rotated.user_id)
        .map_err(|e| state.auth_err(e))?;
    state
        .sessions
        .touch_device(&state.db, &rotated.device_id)
        .map_err(|e| state.auth_err(e))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
        refresh_token: Some(rotated.refresh_token),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(_user): Extension<User>,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .tokens
        .revoke_refresh(&state.db, &req.refresh_token)
        .map_err(|e| state.auth_err(e))?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(UserResponse {
        id: user.id,
        phone: user.phone,
        full_name: user.full_name,
        role: user.role,
        created_at: user.created_at,
    })
}
