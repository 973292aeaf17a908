use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account-wide privilege level, ordered from least to most privileged.
/// `Leader` is the single superuser: it satisfies every global role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Worker,
    Admin,
    Leader,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Worker => "worker",
            Role::Admin => "admin",
            Role::Leader => "leader",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "client" => Some(Role::Client),
            "worker" => Some(Role::Worker),
            "admin" => Some(Role::Admin),
            "leader" => Some(Role::Leader),
            _ => None,
        }
    }
}

/// Privilege scoped to a single chat. Independent of the global hierarchy:
/// holding `Role::Leader` grants nothing here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Member,
    Moderator,
    Owner,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::Member => "member",
            ChatRole::Moderator => "moderator",
            ChatRole::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<ChatRole> {
        match s {
            "member" => Some(ChatRole::Member),
            "moderator" => Some(ChatRole::Moderator),
            "owner" => Some(ChatRole::Owner),
            _ => None,
        }
    }
}

/// An account. `password_hash` never serializes out (responses use the
/// dedicated types in `api`) and may be absent entirely: passwordless
/// accounts exist and cannot log in with credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint: String,
    pub trusted: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One (chat, user) membership row. Absence of a row means no role in
/// that chat, never a default one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMembership {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub role: ChatRole,
    pub joined_at: DateTime<Utc>,
}

/// One entry of the admin audit trail. Created exactly once per dispatched
/// command and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminActionRecord {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub target_user_id: Option<Uuid>,
    pub target_phone: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
