use chrono::{DateTime, Utc};
use uuid::Uuid;

use bazaar_db::models::AdminActionRow;
use bazaar_db::{Database, format_ts, parse_ts};
use bazaar_types::models::AdminActionRecord;

use crate::error::AuthError;
use crate::sessions::parse_uuid;

/// Append-only record of privileged actions. There is deliberately no
/// update or delete path here or in the storage layer beneath it.
#[derive(Debug, Default, Clone)]
pub struct AuditLog;

#[derive(Debug, Default)]
pub struct AuditFilter<'a> {
    pub admin_id: Option<&'a str>,
    pub action: Option<&'a str>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditLog {
    pub fn append(
        &self,
        db: &Database,
        admin_id: &str,
        action: &str,
        target_user_id: Option<&str>,
        target_phone: Option<&str>,
        details: &serde_json::Value,
    ) -> Result<AdminActionRecord, AuthError> {
        let row = db
            .insert_admin_action(
                &Uuid::new_v4().to_string(),
                admin_id,
                action,
                target_user_id,
                target_phone,
                &details.to_string(),
            )
            .map_err(AuthError::Internal)?;
        record_from_row(row)
    }

    pub fn list(
        &self,
        db: &Database,
        filter: &AuditFilter,
    ) -> Result<Vec<AdminActionRecord>, AuthError> {
        let since = filter.since.map(format_ts);
        let until = filter.until.map(format_ts);

        db.list_admin_actions(
            filter.admin_id,
            filter.action,
            since.as_deref(),
            until.as_deref(),
        )
        .map_err(AuthError::Internal)?
        .into_iter()
        .map(record_from_row)
        .collect()
    }
}

fn record_from_row(row: AdminActionRow) -> Result<AdminActionRecord, AuthError> {
    let details = serde_json::from_str(&row.details).map_err(|e| {
        AuthError::Internal(anyhow::anyhow!("Corrupt audit details for {}: {}", row.id, e))
    })?;
    Ok(AdminActionRecord {
        id: parse_uuid("audit record id", &row.id)?,
        admin_id: parse_uuid("audit admin id", &row.admin_id)?,
        action: row.action,
        target_user_id: row
            .target_user_id
            .as_deref()
            .map(|raw| parse_uuid("audit target id", raw))
            .transpose()?,
        target_phone: row.target_phone,
        details,
        created_at: parse_ts(&row.created_at).map_err(AuthError::Internal)?,
    })
}
