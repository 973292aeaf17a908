use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use bazaar_auth::{ADMIN_COMMAND_ROLES, AuditFilter, CommandContext};
use bazaar_types::api::{ActionQuery, CommandRequest};
use bazaar_types::models::User;

use crate::AppState;
use crate::error::ApiError;

pub async fn command(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CommandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = CommandContext {
        db: &state.db,
        sessions: &state.sessions,
    };

    let reply = state
        .dispatcher
        .dispatch(&ctx, &user, &req.cmd, &req.args)
        .map_err(|e| state.auth_err(e))?;

    Ok(Json(reply))
}

pub async fn list_actions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ActionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .authority
        .check_global(&user, ADMIN_COMMAND_ROLES)
        .map_err(|e| state.auth_err(e))?;

    let admin_id = query.admin_id.map(|id| id.to_string());
    let filter = AuditFilter {
        admin_id: admin_id.as_deref(),
        action: query.action.as_deref(),
        since: query.since,
        until: query.until,
    };

    let records = state
        .audit
        .list(&state.db, &filter)
        .map_err(|e| state.auth_err(e))?;

    Ok(Json(records))
}
