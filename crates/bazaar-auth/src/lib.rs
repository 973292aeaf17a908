pub mod accounts;
pub mod audit;
pub mod authority;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod sessions;
pub mod tokens;

pub use audit::{AuditFilter, AuditLog};
pub use authority::RoleAuthority;
pub use commands::{ADMIN_COMMAND_ROLES, CommandContext, CommandDispatcher};
pub use config::Config;
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use sessions::SessionRegistry;
pub use tokens::{TokenError, TokenService};
