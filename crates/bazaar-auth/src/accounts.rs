use uuid::Uuid;

use bazaar_db::models::UserRow;
use bazaar_db::{Database, parse_ts};
use bazaar_types::models::{Role, User};

use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::sessions::parse_uuid;
use crate::tokens::TokenService;

/// Create a client account. Phone numbers are unique.
pub fn register(
    db: &Database,
    store: &CredentialStore,
    phone: &str,
    password: &str,
    full_name: Option<&str>,
) -> Result<User, AuthError> {
    if db
        .get_user_by_phone(phone)
        .map_err(AuthError::Internal)?
        .is_some()
    {
        return Err(AuthError::BadRequest("Phone already registered".into()));
    }

    let password_hash = store.hash(password)?;
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, phone, Some(&password_hash), full_name, Role::Client.as_str())
        .map_err(AuthError::Internal)?;

    get_user(db, &id)?
        .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("User vanished after insert: {}", id)))
}

/// Verify credentials and mint an access token. An unknown phone, a
/// passwordless account, and a wrong password are indistinguishable to
/// the caller.
pub fn login(
    db: &Database,
    store: &CredentialStore,
    tokens: &TokenService,
    phone: &str,
    password: &str,
) -> Result<(User, String), AuthError> {
    let user = get_user_by_phone(db, phone)?
        .ok_or_else(|| AuthError::BadRequest("Incorrect credentials".into()))?;

    let verified = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| store.verify(password, hash));
    if !verified {
        return Err(AuthError::BadRequest("Incorrect credentials".into()));
    }

    let token = tokens.mint_access(&user.id.to_string())?;
    Ok((user, token))
}

pub fn get_user(db: &Database, id: &str) -> Result<Option<User>, AuthError> {
    match db.get_user_by_id(id).map_err(AuthError::Internal)? {
        Some(row) => Ok(Some(user_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn get_user_by_phone(db: &Database, phone: &str) -> Result<Option<User>, AuthError> {
    match db.get_user_by_phone(phone).map_err(AuthError::Internal)? {
        Some(row) => Ok(Some(user_from_row(row)?)),
        None => Ok(None),
    }
}

/// Unknown role strings in storage are a decode error, never a default.
fn user_from_row(row: UserRow) -> Result<User, AuthError> {
    let role = Role::parse(&row.role).ok_or_else(|| {
        AuthError::Internal(anyhow::anyhow!("Corrupt role in storage: {}", row.role))
    })?;
    Ok(User {
        id: parse_uuid("user id", &row.id)?,
        phone: row.phone,
        password_hash: row.password_hash,
        full_name: row.full_name,
        role,
        blacklisted: row.blacklisted,
        created_at: parse_ts(&row.created_at).map_err(AuthError::Internal)?,
        updated_at: parse_ts(&row.updated_at).map_err(AuthError::Internal)?,
    })
}
