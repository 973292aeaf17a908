use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use bazaar_auth::accounts;
use bazaar_types::api::AddMemberRequest;
use bazaar_types::models::{ChatRole, User};

use crate::AppState;
use crate::error::ApiError;

/// Add a user to a chat or change their role. Only the chat's owner or a
/// moderator may do this; the caller's global role does not help here.
pub async fn add_member(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_id = chat_id.to_string();

    state
        .authority
        .check_chat(
            &state.db,
            &user,
            &chat_id,
            &[ChatRole::Owner, ChatRole::Moderator],
        )
        .map_err(|e| state.auth_err(e))?;

    let target_id = req.user_id.to_string();
    accounts::get_user(&state.db, &target_id)
        .map_err(|e| state.auth_err(e))?
        .ok_or_else(|| ApiError::NotFound(format!("No such user: {}", req.user_id)))?;

    state
        .sessions
        .upsert_membership(&state.db, &chat_id, &target_id, req.role)
        .map_err(|e| state.auth_err(e))?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
