use chrono::Utc;
use uuid::Uuid;

use bazaar_db::models::{ChatMemberRow, DeviceRow};
use bazaar_db::{Database, format_ts, parse_ts};
use bazaar_types::models::{ChatMembership, ChatRole, Device};

use crate::error::AuthError;

/// Tracks devices, their refresh-token bindings, and chat memberships.
/// Stateless: every operation takes the storage handle explicitly.
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry;

impl SessionRegistry {
    /// Upsert on (user, fingerprint): a known device only refreshes
    /// last_seen, a new one starts untrusted.
    pub fn register_device(
        &self,
        db: &Database,
        user_id: &str,
        fingerprint: &str,
    ) -> Result<Device, AuthError> {
        let row = db
            .upsert_device(
                &Uuid::new_v4().to_string(),
                user_id,
                fingerprint,
                &format_ts(Utc::now()),
            )
            .map_err(AuthError::Internal)?;
        device_from_row(row)
    }

    pub fn touch_device(&self, db: &Database, device_id: &str) -> Result<(), AuthError> {
        db.touch_device(device_id, &format_ts(Utc::now()))
            .map_err(AuthError::Internal)
    }

    /// Revocation cascades: every active refresh token bound to the
    /// device dies. Returns how many were revoked.
    pub fn revoke_device(&self, db: &Database, device_id: &str) -> Result<usize, AuthError> {
        db.revoke_refresh_tokens_for_device(device_id)
            .map_err(AuthError::Internal)
    }

    pub fn revoke_user(&self, db: &Database, user_id: &str) -> Result<usize, AuthError> {
        db.revoke_refresh_tokens_for_user(user_id)
            .map_err(AuthError::Internal)
    }

    /// Update role and joined_at if the (chat, user) row exists, insert
    /// otherwise.
    pub fn upsert_membership(
        &self,
        db: &Database,
        chat_id: &str,
        user_id: &str,
        role: ChatRole,
    ) -> Result<(), AuthError> {
        db.upsert_chat_member(chat_id, user_id, role.as_str(), &format_ts(Utc::now()))
            .map_err(AuthError::Internal)
    }

    pub fn membership(
        &self,
        db: &Database,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Option<ChatMembership>, AuthError> {
        match db
            .get_chat_member(chat_id, user_id)
            .map_err(AuthError::Internal)?
        {
            Some(row) => Ok(Some(membership_from_row(row)?)),
            None => Ok(None),
        }
    }
}

fn device_from_row(row: DeviceRow) -> Result<Device, AuthError> {
    Ok(Device {
        id: parse_uuid("device id", &row.id)?,
        user_id: parse_uuid("device user id", &row.user_id)?,
        fingerprint: row.fingerprint,
        trusted: row.trusted,
        last_seen: parse_ts(&row.last_seen).map_err(AuthError::Internal)?,
        created_at: parse_ts(&row.created_at).map_err(AuthError::Internal)?,
    })
}

fn membership_from_row(row: ChatMemberRow) -> Result<ChatMembership, AuthError> {
    let role = ChatRole::parse(&row.role).ok_or_else(|| {
        AuthError::Internal(anyhow::anyhow!("Corrupt chat role in storage: {}", row.role))
    })?;
    Ok(ChatMembership {
        chat_id: parse_uuid("chat id", &row.chat_id)?,
        user_id: parse_uuid("member user id", &row.user_id)?,
        role,
        joined_at: parse_ts(&row.joined_at).map_err(AuthError::Internal)?,
    })
}

pub(crate) fn parse_uuid(what: &str, raw: &str) -> Result<Uuid, AuthError> {
    raw.parse()
        .map_err(|_| AuthError::Internal(anyhow::anyhow!("Corrupt {} in storage: {}", what, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const U1: &str = "6a1f0b52-0000-4000-8000-000000000001";
    const U2: &str = "6a1f0b52-0000-4000-8000-000000000002";
    const CHAT: &str = "6a1f0b52-0000-4000-8000-00000000c4a7";

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(U1, "+1555", None, None, "client").unwrap();
        db.create_user(U2, "+1666", None, None, "client").unwrap();
        db
    }

    #[test]
    fn repeated_registration_reuses_the_device_row() {
        let sessions = SessionRegistry;
        let db = seeded_db();

        let first = sessions.register_device(&db, U1, "fp-alpha").unwrap();
        assert!(!first.trusted);

        let again = sessions.register_device(&db, U1, "fp-alpha").unwrap();
        assert_eq!(again.id, first.id);
        assert!(again.last_seen >= first.last_seen);
    }

    #[test]
    fn revoking_a_user_kills_every_bound_token() {
        let sessions = SessionRegistry;
        let db = seeded_db();

        let device = sessions.register_device(&db, U1, "fp").unwrap();
        let device_id = device.id.to_string();
        db.insert_refresh_token("t1", U1, &device_id, "h1", "2030-01-01T00:00:00Z").unwrap();
        db.insert_refresh_token("t2", U1, &device_id, "h2", "2030-01-01T00:00:00Z").unwrap();

        assert_eq!(sessions.revoke_user(&db, U1).unwrap(), 2);
        assert_eq!(
            db.get_refresh_token_by_hash("h1").unwrap().unwrap().status,
            "revoked"
        );
        // Second pass finds nothing active.
        assert_eq!(sessions.revoke_user(&db, U1).unwrap(), 0);
    }

    #[test]
    fn membership_upsert_changes_role_in_place() {
        let sessions = SessionRegistry;
        let db = seeded_db();

        sessions.upsert_membership(&db, CHAT, U1, ChatRole::Member).unwrap();
        sessions.upsert_membership(&db, CHAT, U1, ChatRole::Owner).unwrap();

        let membership = sessions.membership(&db, CHAT, U1).unwrap().unwrap();
        assert_eq!(membership.role, ChatRole::Owner);

        assert!(sessions.membership(&db, CHAT, U2).unwrap().is_none());
    }
}
