use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use bazaar_db::{Database, format_ts};
use bazaar_types::api::CommandReply;
use bazaar_types::models::{Role, User};

use crate::audit::AuditLog;
use crate::authority::RoleAuthority;
use crate::error::AuthError;
use crate::sessions::SessionRegistry;

/// Global roles allowed to dispatch admin commands. Leader passes through
/// the superuser rule in `check_global`.
pub const ADMIN_COMMAND_ROLES: &[Role] = &[Role::Admin];

/// Everything a command handler may touch.
pub struct CommandContext<'a> {
    pub db: &'a Database,
    pub sessions: &'a SessionRegistry,
}

type Handler = fn(&CommandContext, &Value) -> Result<CommandReply, AuthError>;

/// Fixed allow-list of admin operations, gated on the caller's global
/// role and mirrored into the audit trail. Built once at startup; there
/// is no runtime registration.
pub struct CommandDispatcher {
    authority: RoleAuthority,
    audit: AuditLog,
    commands: HashMap<&'static str, Handler>,
}

impl CommandDispatcher {
    pub fn new(authority: RoleAuthority, audit: AuditLog) -> Self {
        let mut commands: HashMap<&'static str, Handler> = HashMap::new();
        commands.insert("backup", cmd_backup);
        commands.insert("reindex", cmd_reindex);
        commands.insert("set_role", cmd_set_role);
        commands.insert("blacklist", cmd_blacklist);
        commands.insert("revoke_sessions", cmd_revoke_sessions);
        Self {
            authority,
            audit,
            commands,
        }
    }

    /// Unknown commands and forbidden callers produce no audit record.
    /// Once a handler runs, exactly one record is written (success or
    /// failure) before the reply is returned.
    pub fn dispatch(
        &self,
        ctx: &CommandContext,
        caller: &User,
        cmd: &str,
        args: &Value,
    ) -> Result<CommandReply, AuthError> {
        let Some(handler) = self.commands.get(cmd) else {
            return Err(AuthError::BadRequest("Unknown command".into()));
        };

        self.authority.check_global(caller, ADMIN_COMMAND_ROLES)?;

        let result = handler(ctx, args);

        let details = match &result {
            Ok(reply) => serde_json::json!({
                "outcome": "success",
                "args": args,
                "msg": reply.msg,
            }),
            Err(e) => serde_json::json!({
                "outcome": "failure",
                "args": args,
                "error": e.to_string(),
            }),
        };
        let target_user_id = args.get("user_id").and_then(Value::as_str);
        let target_phone = args.get("phone").and_then(Value::as_str);
        self.audit.append(
            ctx.db,
            &caller.id.to_string(),
            cmd,
            target_user_id,
            target_phone,
            &details,
        )?;

        info!("Admin command '{}' dispatched by {}", cmd, caller.id);
        result
    }
}

/// Maintenance jobs are fire-and-forget: the dispatcher replies once the
/// job is queued, not when it finishes.
fn cmd_backup(_ctx: &CommandContext, _args: &Value) -> Result<CommandReply, AuthError> {
    tokio::spawn(async {
        // The snapshot itself runs in the ops tooling; this end only
        // queues the job and leaves a trace in the logs.
        info!("Backup job queued");
    });
    Ok(CommandReply {
        ok: true,
        msg: "Backup started".into(),
    })
}

fn cmd_reindex(_ctx: &CommandContext, _args: &Value) -> Result<CommandReply, AuthError> {
    tokio::spawn(async {
        info!("Reindex job queued");
    });
    Ok(CommandReply {
        ok: true,
        msg: "Reindex scheduled".into(),
    })
}

fn cmd_set_role(ctx: &CommandContext, args: &Value) -> Result<CommandReply, AuthError> {
    let user_id = require_str(args, "user_id")?;
    let role_name = require_str(args, "role")?;
    let role = Role::parse(role_name)
        .ok_or_else(|| AuthError::BadRequest(format!("Unknown role: {}", role_name)))?;

    let updated = ctx
        .db
        .set_user_role(user_id, role.as_str(), &format_ts(chrono::Utc::now()))
        .map_err(AuthError::Internal)?;
    if !updated {
        return Err(AuthError::NotFound(format!("No such user: {}", user_id)));
    }

    Ok(CommandReply {
        ok: true,
        msg: format!("Role set to {}", role.as_str()),
    })
}

fn cmd_blacklist(ctx: &CommandContext, args: &Value) -> Result<CommandReply, AuthError> {
    let user_id = require_str(args, "user_id")?;
    let blacklisted = args
        .get("blacklisted")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let updated = ctx
        .db
        .set_user_blacklisted(user_id, blacklisted, &format_ts(chrono::Utc::now()))
        .map_err(AuthError::Internal)?;
    if !updated {
        return Err(AuthError::NotFound(format!("No such user: {}", user_id)));
    }

    if blacklisted {
        // A blacklisted account keeps no live sessions.
        ctx.sessions.revoke_user(ctx.db, user_id)?;
    }

    Ok(CommandReply {
        ok: true,
        msg: if blacklisted {
            "User blacklisted".into()
        } else {
            "User removed from blacklist".into()
        },
    })
}

fn cmd_revoke_sessions(ctx: &CommandContext, args: &Value) -> Result<CommandReply, AuthError> {
    let user_id = require_str(args, "user_id")?;
    let revoked = ctx.sessions.revoke_user(ctx.db, user_id)?;
    Ok(CommandReply {
        ok: true,
        msg: format!("Revoked {} refresh tokens", revoked),
    })
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, AuthError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::BadRequest(format!("Missing argument: {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use chrono::Utc;
    use uuid::Uuid;

    fn caller(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            phone: "+1999".into(),
            password_hash: None,
            full_name: None,
            role,
            blacklisted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fixture() -> (Database, SessionRegistry, CommandDispatcher) {
        let db = Database::open_in_memory().unwrap();
        db.create_user("6a1f0b52-0000-4000-8000-000000000001", "+1555", None, None, "client")
            .unwrap();
        let dispatcher = CommandDispatcher::new(RoleAuthority, AuditLog);
        (db, SessionRegistry, dispatcher)
    }

    fn audit_count(db: &Database) -> usize {
        AuditLog.list(db, &AuditFilter::default()).unwrap().len()
    }

    const TARGET: &str = "6a1f0b52-0000-4000-8000-000000000001";

    #[tokio::test]
    async fn unknown_command_leaves_no_trace() {
        let (db, sessions, dispatcher) = fixture();
        let ctx = CommandContext { db: &db, sessions: &sessions };

        let err = dispatcher
            .dispatch(&ctx, &caller(Role::Admin), "drop_tables", &Value::Null)
            .unwrap_err();
        assert!(matches!(err, AuthError::BadRequest(_)));
        assert_eq!(audit_count(&db), 0);
    }

    #[tokio::test]
    async fn forbidden_caller_leaves_no_trace() {
        let (db, sessions, dispatcher) = fixture();
        let ctx = CommandContext { db: &db, sessions: &sessions };

        let err = dispatcher
            .dispatch(&ctx, &caller(Role::Worker), "backup", &Value::Null)
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
        assert_eq!(audit_count(&db), 0);
    }

    #[tokio::test]
    async fn success_writes_exactly_one_record() {
        let (db, sessions, dispatcher) = fixture();
        let ctx = CommandContext { db: &db, sessions: &sessions };
        let admin = caller(Role::Admin);

        let args = serde_json::json!({"user_id": TARGET, "role": "worker"});
        let reply = dispatcher.dispatch(&ctx, &admin, "set_role", &args).unwrap();
        assert!(reply.ok);

        let records = AuditLog.list(&db, &AuditFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "set_role");
        assert_eq!(records[0].admin_id, admin.id);
        assert_eq!(records[0].target_user_id.unwrap().to_string(), TARGET);
        assert_eq!(records[0].details["outcome"], "success");

        let row = db.get_user_by_id(TARGET).unwrap().unwrap();
        assert_eq!(row.role, "worker");
    }

    #[tokio::test]
    async fn handler_failure_is_audited_as_failure() {
        let (db, sessions, dispatcher) = fixture();
        let ctx = CommandContext { db: &db, sessions: &sessions };

        let args = serde_json::json!({
            "user_id": "6a1f0b52-0000-4000-8000-00000000dead",
            "role": "worker",
        });
        let err = dispatcher
            .dispatch(&ctx, &caller(Role::Admin), "set_role", &args)
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));

        let records = AuditLog.list(&db, &AuditFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].details["outcome"], "failure");
    }

    #[tokio::test]
    async fn leader_bypasses_the_admin_allow_list() {
        let (db, sessions, dispatcher) = fixture();
        let ctx = CommandContext { db: &db, sessions: &sessions };

        let reply = dispatcher
            .dispatch(&ctx, &caller(Role::Leader), "backup", &Value::Null)
            .unwrap();
        assert_eq!(reply.msg, "Backup started");
        assert_eq!(audit_count(&db), 1);
    }

    #[tokio::test]
    async fn blacklisting_revokes_the_target_sessions() {
        let (db, sessions, dispatcher) = fixture();
        let ctx = CommandContext { db: &db, sessions: &sessions };

        db.upsert_device("d1", TARGET, "fp", "2026-01-01T00:00:00Z").unwrap();
        db.insert_refresh_token("t1", TARGET, "d1", "h1", "2030-01-01T00:00:00Z")
            .unwrap();

        let args = serde_json::json!({"user_id": TARGET});
        dispatcher.dispatch(&ctx, &caller(Role::Admin), "blacklist", &args).unwrap();

        let row = db.get_user_by_id(TARGET).unwrap().unwrap();
        assert!(row.blacklisted);
        assert_eq!(
            db.get_refresh_token_by_hash("h1").unwrap().unwrap().status,
            "revoked"
        );
    }
}
