use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use bazaar_api::middleware::require_auth;
use bazaar_api::{AppState, AppStateInner, admin, auth, chats};
use bazaar_auth::{
    AuditLog, CommandDispatcher, Config, CredentialStore, RoleAuthority, SessionRegistry,
    TokenService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug,tower_http=debug".into()),
        )
        .init();

    // Config: read once, injected everywhere.
    let config = Config::from_env()?;
    let db_path = std::env::var("BAZAAR_DB_PATH").unwrap_or_else(|_| "bazaar.db".into());
    let host = std::env::var("BAZAAR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BAZAAR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = bazaar_db::Database::open(&PathBuf::from(&db_path))?;

    // Components
    let tokens = TokenService::new(&config)?;
    let authority = RoleAuthority;
    let audit = AuditLog;
    let dispatcher = CommandDispatcher::new(authority.clone(), audit.clone());

    let state: AppState = Arc::new(AppStateInner {
        db,
        config,
        credentials: CredentialStore,
        tokens,
        sessions: SessionRegistry,
        authority,
        audit,
        dispatcher,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/token", post(auth::token))
        .route("/auth/refresh", post(auth::refresh))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/chats/{chat_id}/members", post(chats::add_member))
        .route("/admin/command", post(admin::command))
        .route("/admin/actions", get(admin::list_actions))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Bazaar server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
