pub mod admin;
pub mod auth;
pub mod chats;
pub mod error;
pub mod middleware;

use std::sync::Arc;

use bazaar_auth::{
    AuditLog, AuthError, CommandDispatcher, Config, CredentialStore, RoleAuthority,
    SessionRegistry, TokenService,
};
use bazaar_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

/// Shared immutable state: the storage handle plus the access-control
/// components, all constructed once in main.
pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub credentials: CredentialStore,
    pub tokens: TokenService,
    pub sessions: SessionRegistry,
    pub authority: RoleAuthority,
    pub audit: AuditLog,
    pub dispatcher: CommandDispatcher,
}

impl AppStateInner {
    /// Map a core error to its HTTP form, gating internal detail on the
    /// environment.
    pub fn auth_err(&self, err: AuthError) -> ApiError {
        ApiError::from_auth(err, self.config.expose_errors())
    }
}
