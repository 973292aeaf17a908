use crate::Database;
use crate::models::{
    AdminActionRow, ChatMemberRow, DeviceRow, RefreshTokenRow, RotateOutcome, UserRow,
};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        phone: &str,
        password_hash: Option<&str>,
        full_name: Option<&str>,
        role: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, phone, password_hash, full_name, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, phone, password_hash, full_name, role],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "phone", phone))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Returns false when no such user exists.
    pub fn set_user_role(&self, id: &str, role: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, role, now],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_user_blacklisted(&self, id: &str, blacklisted: bool, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET blacklisted = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, blacklisted, now],
            )?;
            Ok(n > 0)
        })
    }

    // -- Devices --

    /// Upsert on (user_id, fingerprint): an existing device only refreshes
    /// last_seen; a new one is inserted untrusted. Returns the stored row.
    pub fn upsert_device(
        &self,
        id: &str,
        user_id: &str,
        fingerprint: &str,
        now: &str,
    ) -> Result<DeviceRow> {
        self.with_tx(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id FROM devices WHERE user_id = ?1 AND fingerprint = ?2",
                    rusqlite::params![user_id, fingerprint],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;

            let device_id = match existing {
                Some(existing_id) => {
                    conn.execute(
                        "UPDATE devices SET last_seen = ?2 WHERE id = ?1",
                        rusqlite::params![existing_id, now],
                    )?;
                    existing_id
                }
                None => {
                    conn.execute(
                        "INSERT INTO devices (id, user_id, fingerprint, trusted, last_seen) VALUES (?1, ?2, ?3, 0, ?4)",
                        rusqlite::params![id, user_id, fingerprint, now],
                    )?;
                    id.to_string()
                }
            };

            query_device(conn, &device_id)?
                .ok_or_else(|| anyhow::anyhow!("Device vanished after upsert: {}", device_id))
        })
    }

    pub fn touch_device(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE devices SET last_seen = ?2 WHERE id = ?1",
                rusqlite::params![id, now],
            )?;
            Ok(())
        })
    }

    // -- Refresh tokens --

    pub fn insert_refresh_token(
        &self,
        id: &str,
        user_id: &str,
        device_id: &str,
        token_hash: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (id, user_id, device_id, token_hash, status, expires_at)
                 VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
                rusqlite::params![id, user_id, device_id, token_hash, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
        self.with_conn(|conn| query_refresh_token(conn, token_hash))
    }

    /// One transaction covering validate-old, mark-old, insert-new. Reuse
    /// of a dead token revokes every active token of that user before
    /// returning, so a stolen-then-replayed token takes the whole session
    /// set down with it.
    pub fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_id: &str,
        new_hash: &str,
        new_expires_at: &str,
        now: &str,
    ) -> Result<RotateOutcome> {
        self.with_tx(|conn| {
            let Some(old) = query_refresh_token(conn, old_hash)? else {
                return Ok(RotateOutcome::NotFound);
            };

            match old.status.as_str() {
                "rotated" | "revoked" => {
                    conn.execute(
                        "UPDATE refresh_tokens SET status = 'revoked' WHERE user_id = ?1 AND status = 'active'",
                        [&old.user_id],
                    )?;
                    return Ok(RotateOutcome::Reused {
                        user_id: old.user_id,
                    });
                }
                "expired" => return Ok(RotateOutcome::Expired),
                _ => {}
            }

            // Lazy expiry: the ttl elapsed since the last use.
            if old.expires_at.as_str() <= now {
                conn.execute(
                    "UPDATE refresh_tokens SET status = 'expired' WHERE id = ?1",
                    [&old.id],
                )?;
                return Ok(RotateOutcome::Expired);
            }

            conn.execute(
                "UPDATE refresh_tokens SET status = 'rotated' WHERE id = ?1",
                [&old.id],
            )?;
            conn.execute(
                "INSERT INTO refresh_tokens (id, user_id, device_id, token_hash, status, expires_at)
                 VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
                rusqlite::params![new_id, old.user_id, old.device_id, new_hash, new_expires_at],
            )?;

            Ok(RotateOutcome::Rotated {
                user_id: old.user_id,
                device_id: old.device_id,
            })
        })
    }

    /// Returns the number of tokens revoked; an already-dead token is left
    /// as it is, so revocation is idempotent.
    pub fn revoke_refresh_token_by_hash(&self, token_hash: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE refresh_tokens SET status = 'revoked' WHERE token_hash = ?1 AND status = 'active'",
                [token_hash],
            )?;
            Ok(n)
        })
    }

    pub fn revoke_refresh_tokens_for_user(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE refresh_tokens SET status = 'revoked' WHERE user_id = ?1 AND status = 'active'",
                [user_id],
            )?;
            Ok(n)
        })
    }

    pub fn revoke_refresh_tokens_for_device(&self, device_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE refresh_tokens SET status = 'revoked' WHERE device_id = ?1 AND status = 'active'",
                [device_id],
            )?;
            Ok(n)
        })
    }

    // -- Chat members --

    /// Update role and joined_at if the (chat, user) row exists, insert
    /// otherwise.
    pub fn upsert_chat_member(
        &self,
        chat_id: &str,
        user_id: &str,
        role: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id, user_id) DO UPDATE SET role = ?3, joined_at = ?4",
                rusqlite::params![chat_id, user_id, role, now],
            )?;
            Ok(())
        })
    }

    pub fn get_chat_member(&self, chat_id: &str, user_id: &str) -> Result<Option<ChatMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chat_id, user_id, role, joined_at FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
            )?;

            let row = stmt
                .query_row(rusqlite::params![chat_id, user_id], |row| {
                    Ok(ChatMemberRow {
                        chat_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    // -- Admin actions --

    pub fn insert_admin_action(
        &self,
        id: &str,
        admin_id: &str,
        action: &str,
        target_user_id: Option<&str>,
        target_phone: Option<&str>,
        details: &str,
    ) -> Result<AdminActionRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO admin_actions (id, admin_id, action, target_user_id, target_phone, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, admin_id, action, target_user_id, target_phone, details],
            )?;

            query_admin_action(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Audit record vanished after insert: {}", id))
        })
    }

    pub fn list_admin_actions(
        &self,
        admin_id: Option<&str>,
        action: Option<&str>,
        since: Option<&str>,
        until: Option<&str>,
    ) -> Result<Vec<AdminActionRow>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<String> = Vec::new();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::new();

            for (column, op, value) in [
                ("admin_id", "=", &admin_id),
                ("action", "=", &action),
                ("created_at", ">=", &since),
                ("created_at", "<=", &until),
            ] {
                if let Some(value) = value {
                    params.push(value as &dyn rusqlite::types::ToSql);
                    clauses.push(format!("{} {} ?{}", column, op, params.len()));
                }
            }

            let mut sql = String::from(
                "SELECT id, admin_id, action, target_user_id, target_phone, details, created_at
                 FROM admin_actions",
            );
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(AdminActionRow {
                        id: row.get(0)?,
                        admin_id: row.get(1)?,
                        action: row.get(2)?,
                        target_user_id: row.get(3)?,
                        target_phone: row.get(4)?,
                        details: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always a literal from this module, never caller input.
    let sql = format!(
        "SELECT id, phone, password_hash, full_name, role, blacklisted, created_at, updated_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                phone: row.get(1)?,
                password_hash: row.get(2)?,
                full_name: row.get(3)?,
                role: row.get(4)?,
                blacklisted: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_device(conn: &Connection, id: &str) -> Result<Option<DeviceRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, fingerprint, trusted, last_seen, created_at FROM devices WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(DeviceRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                fingerprint: row.get(2)?,
                trusted: row.get(3)?,
                last_seen: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_refresh_token(conn: &Connection, token_hash: &str) -> Result<Option<RefreshTokenRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, device_id, token_hash, status, expires_at, created_at
         FROM refresh_tokens WHERE token_hash = ?1",
    )?;

    let row = stmt
        .query_row([token_hash], |row| {
            Ok(RefreshTokenRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                device_id: row.get(2)?,
                token_hash: row.get(3)?,
                status: row.get(4)?,
                expires_at: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_admin_action(conn: &Connection, id: &str) -> Result<Option<AdminActionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, admin_id, action, target_user_id, target_phone, details, created_at
         FROM admin_actions WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(AdminActionRow {
                id: row.get(0)?,
                admin_id: row.get(1)?,
                action: row.get(2)?,
                target_user_id: row.get(3)?,
                target_phone: row.get(4)?,
                details: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user(id: &str, phone: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(id, phone, Some("$argon2id$stub"), None, "client")
            .unwrap();
        db
    }

    #[test]
    fn duplicate_phone_rejected_by_unique_constraint() {
        let db = db_with_user("u1", "+1555");
        let err = db.create_user("u2", "+1555", None, None, "client");
        assert!(err.is_err());
    }

    #[test]
    fn device_upsert_keeps_one_row_per_fingerprint() {
        let db = db_with_user("u1", "+1555");

        let first = db.upsert_device("d1", "u1", "fp-alpha", "2026-01-01T00:00:00Z").unwrap();
        assert!(!first.trusted);

        let second = db.upsert_device("d2", "u1", "fp-alpha", "2026-01-02T00:00:00Z").unwrap();
        assert_eq!(second.id, "d1");
        assert_eq!(second.last_seen, "2026-01-02T00:00:00Z");

        // Different fingerprint gets its own row.
        let other = db.upsert_device("d3", "u1", "fp-beta", "2026-01-02T00:00:00Z").unwrap();
        assert_eq!(other.id, "d3");
    }

    #[test]
    fn rotate_marks_old_and_inserts_replacement() {
        let db = db_with_user("u1", "+1555");
        db.upsert_device("d1", "u1", "fp", "2026-01-01T00:00:00Z").unwrap();
        db.insert_refresh_token("t1", "u1", "d1", "hash-old", "2030-01-01T00:00:00Z").unwrap();

        let outcome = db
            .rotate_refresh_token("hash-old", "t2", "hash-new", "2030-02-01T00:00:00Z", "2026-01-01T00:00:00Z")
            .unwrap();
        match outcome {
            RotateOutcome::Rotated { user_id, device_id } => {
                assert_eq!(user_id, "u1");
                assert_eq!(device_id, "d1");
            }
            _ => panic!("expected rotation"),
        }

        let old = db.get_refresh_token_by_hash("hash-old").unwrap().unwrap();
        assert_eq!(old.status, "rotated");
        let new = db.get_refresh_token_by_hash("hash-new").unwrap().unwrap();
        assert_eq!(new.status, "active");
        assert_eq!(new.device_id, "d1");
    }

    #[test]
    fn reuse_of_rotated_token_revokes_active_tokens() {
        let db = db_with_user("u1", "+1555");
        db.upsert_device("d1", "u1", "fp", "2026-01-01T00:00:00Z").unwrap();
        db.insert_refresh_token("t1", "u1", "d1", "hash-old", "2030-01-01T00:00:00Z").unwrap();

        db.rotate_refresh_token("hash-old", "t2", "hash-new", "2030-02-01T00:00:00Z", "2026-01-01T00:00:00Z")
            .unwrap();

        // Replay of the retired token.
        let outcome = db
            .rotate_refresh_token("hash-old", "t3", "hash-newer", "2030-03-01T00:00:00Z", "2026-01-01T00:00:00Z")
            .unwrap();
        assert!(matches!(outcome, RotateOutcome::Reused { ref user_id } if user_id == "u1"));

        let survivor = db.get_refresh_token_by_hash("hash-new").unwrap().unwrap();
        assert_eq!(survivor.status, "revoked");
    }

    #[test]
    fn elapsed_ttl_expires_lazily() {
        let db = db_with_user("u1", "+1555");
        db.upsert_device("d1", "u1", "fp", "2026-01-01T00:00:00Z").unwrap();
        db.insert_refresh_token("t1", "u1", "d1", "hash-old", "2026-01-01T00:00:00Z").unwrap();

        let outcome = db
            .rotate_refresh_token("hash-old", "t2", "hash-new", "2030-01-01T00:00:00Z", "2026-06-01T00:00:00Z")
            .unwrap();
        assert!(matches!(outcome, RotateOutcome::Expired));

        let old = db.get_refresh_token_by_hash("hash-old").unwrap().unwrap();
        assert_eq!(old.status, "expired");
        assert!(db.get_refresh_token_by_hash("hash-new").unwrap().is_none());
    }

    #[test]
    fn chat_member_upsert_updates_role_in_place() {
        let db = db_with_user("u1", "+1555");

        db.upsert_chat_member("c1", "u1", "member", "2026-01-01T00:00:00Z").unwrap();
        db.upsert_chat_member("c1", "u1", "moderator", "2026-01-02T00:00:00Z").unwrap();

        let row = db.get_chat_member("c1", "u1").unwrap().unwrap();
        assert_eq!(row.role, "moderator");
        assert_eq!(row.joined_at, "2026-01-02T00:00:00Z");
        assert!(db.get_chat_member("c2", "u1").unwrap().is_none());
    }

    #[test]
    fn admin_action_listing_applies_filters() {
        let db = db_with_user("u1", "+1555");

        db.insert_admin_action("a1", "admin-1", "backup", None, None, "{}").unwrap();
        db.insert_admin_action("a2", "admin-1", "set_role", Some("u1"), None, "{}").unwrap();
        db.insert_admin_action("a3", "admin-2", "backup", None, None, "{}").unwrap();

        let all = db.list_admin_actions(None, None, None, None).unwrap();
        assert_eq!(all.len(), 3);

        let backups = db.list_admin_actions(None, Some("backup"), None, None).unwrap();
        assert_eq!(backups.len(), 2);

        let by_admin = db.list_admin_actions(Some("admin-1"), Some("backup"), None, None).unwrap();
        assert_eq!(by_admin.len(), 1);
        assert_eq!(by_admin[0].id, "a1");
    }
}
