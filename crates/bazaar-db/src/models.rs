/// Database row types — these map directly to SQLite rows.
/// Distinct from the bazaar-types API models to keep the storage layer
/// independent of wire concerns.

pub struct UserRow {
    pub id: String,
    pub phone: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub role: String,
    pub blacklisted: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct DeviceRow {
    pub id: String,
    pub user_id: String,
    pub fingerprint: String,
    pub trusted: bool,
    pub last_seen: String,
    pub created_at: String,
}

pub struct RefreshTokenRow {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub token_hash: String,
    pub status: String,
    pub expires_at: String,
    pub created_at: String,
}

pub struct ChatMemberRow {
    pub chat_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
}

pub struct AdminActionRow {
    pub id: String,
    pub admin_id: String,
    pub action: String,
    pub target_user_id: Option<String>,
    pub target_phone: Option<String>,
    pub details: String,
    pub created_at: String,
}

/// Result of the atomic refresh-token rotation step.
pub enum RotateOutcome {
    /// The old token was active: it is now rotated and a replacement row
    /// exists, bound to the same user and device.
    Rotated { user_id: String, device_id: String },
    /// No row matches the presented hash.
    NotFound,
    /// The old token had already been rotated or revoked. Every active
    /// token of the user was revoked inside the same transaction.
    Reused { user_id: String },
    /// The old token's ttl had elapsed; the row is now marked expired.
    Expired,
}
