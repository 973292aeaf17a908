use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use bazaar_auth::accounts;

use crate::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer token, load the account, and reject
/// blacklisted users before any handler logic runs. Missing, malformed
/// and expired tokens all yield the same 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let subject = state
        .tokens
        .validate_access(token)
        .map_err(|_| ApiError::Unauthorized)?;

    // Role and blacklist state are read per request: a change binds on
    // the next call, not retroactively on already-issued tokens.
    let user = accounts::get_user(&state.db, &subject)
        .map_err(|e| state.auth_err(e))?
        .ok_or(ApiError::Unauthorized)?;

    if user.blacklisted {
        return Err(ApiError::Forbidden);
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
