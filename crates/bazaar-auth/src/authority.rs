use bazaar_db::Database;
use bazaar_types::models::{ChatRole, Role, User};

use crate::error::AuthError;

/// Evaluates global-role and chat-role authorization decisions.
///
/// Both checks assume the caller was already authenticated by the token
/// layer, and both test the blacklist flag before any role logic: a
/// blacklisted account is Forbidden even with a still-valid token.
#[derive(Debug, Default, Clone)]
pub struct RoleAuthority;

impl RoleAuthority {
    pub fn check_global(&self, user: &User, allowed: &[Role]) -> Result<(), AuthError> {
        if user.blacklisted {
            return Err(AuthError::Forbidden);
        }
        // The single superuser rule: leader satisfies every global check.
        if user.role == Role::Leader || allowed.contains(&user.role) {
            return Ok(());
        }
        Err(AuthError::Forbidden)
    }

    /// Chat roles are their own hierarchy: a missing membership row is
    /// Forbidden whatever `allowed` contains, and no global bypass
    /// applies here.
    pub fn check_chat(
        &self,
        db: &Database,
        user: &User,
        chat_id: &str,
        allowed: &[ChatRole],
    ) -> Result<(), AuthError> {
        if user.blacklisted {
            return Err(AuthError::Forbidden);
        }

        let Some(row) = db
            .get_chat_member(chat_id, &user.id.to_string())
            .map_err(AuthError::Internal)?
        else {
            return Err(AuthError::Forbidden);
        };

        let role = ChatRole::parse(&row.role).ok_or_else(|| {
            AuthError::Internal(anyhow::anyhow!("Corrupt chat role in storage: {}", row.role))
        })?;

        if allowed.contains(&role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role, blacklisted: bool) -> User {
        User {
            id: Uuid::new_v4(),
            phone: "+1555".into(),
            password_hash: None,
            full_name: None,
            role,
            blacklisted,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn leader_passes_any_global_check() {
        let authority = RoleAuthority;
        let leader = user(Role::Leader, false);

        assert!(authority.check_global(&leader, &[Role::Admin]).is_ok());
        assert!(authority.check_global(&leader, &[Role::Client]).is_ok());
        // Even an allow-list that does not mention leader.
        assert!(authority.check_global(&leader, &[]).is_ok());
    }

    #[test]
    fn non_leader_needs_an_exact_allow_list_match() {
        let authority = RoleAuthority;

        assert!(authority.check_global(&user(Role::Worker, false), &[Role::Admin]).is_err());
        assert!(authority.check_global(&user(Role::Admin, false), &[Role::Admin]).is_ok());
        assert!(
            authority
                .check_global(&user(Role::Client, false), &[Role::Client, Role::Worker])
                .is_ok()
        );
    }

    #[test]
    fn blacklist_wins_before_any_role_logic() {
        let authority = RoleAuthority;

        // Even the superuser rule does not survive a blacklist.
        assert!(matches!(
            authority.check_global(&user(Role::Leader, true), &[Role::Leader]),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn missing_membership_row_is_always_forbidden() {
        let authority = RoleAuthority;
        let db = Database::open_in_memory().unwrap();
        let outsider = user(Role::Leader, false);
        db.create_user(&outsider.id.to_string(), "+1555", None, None, "leader")
            .unwrap();

        assert!(matches!(
            authority.check_chat(
                &db,
                &outsider,
                "c1",
                &[ChatRole::Owner, ChatRole::Moderator, ChatRole::Member]
            ),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn chat_check_honors_the_membership_role() {
        let authority = RoleAuthority;
        let db = Database::open_in_memory().unwrap();
        let member = user(Role::Client, false);
        let uid = member.id.to_string();
        db.create_user(&uid, "+1555", None, None, "client").unwrap();
        db.upsert_chat_member("c1", &uid, "member", "2026-01-01T00:00:00Z")
            .unwrap();

        assert!(
            authority
                .check_chat(&db, &member, "c1", &[ChatRole::Owner, ChatRole::Moderator])
                .is_err()
        );
        assert!(
            authority
                .check_chat(&db, &member, "c1", &[ChatRole::Member])
                .is_ok()
        );
    }

    #[test]
    fn blacklisted_member_is_forbidden_despite_a_row() {
        let authority = RoleAuthority;
        let db = Database::open_in_memory().unwrap();
        let member = user(Role::Client, true);
        let uid = member.id.to_string();
        db.create_user(&uid, "+1555", None, None, "client").unwrap();
        db.upsert_chat_member("c1", &uid, "owner", "2026-01-01T00:00:00Z")
            .unwrap();

        assert!(matches!(
            authority.check_chat(&db, &member, "c1", &[ChatRole::Owner]),
            Err(AuthError::Forbidden)
        ));
    }
}
