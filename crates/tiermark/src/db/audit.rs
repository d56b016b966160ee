use crate::db::{parse_optional_uuid, parse_timestamp, AuditLogEntry};
use crate::error::Result;
use chrono::Utc;
use uuid::Uuid;

pub trait AuditDatabase {
    fn log_audit(&mut self, entry: &AuditLogEntry) -> Result<i64>;
    fn get_audit_entries(
        &self,
        org_id: Option<Uuid>,
        action: Option<&str>,
        limit: Option<i32>,
    ) -> Result<Vec<AuditLogEntry>>;
}

impl AuditDatabase for crate::db::SqliteDatabase {
    fn log_audit(&mut self, entry: &AuditLogEntry) -> Result<i64> {
        let conn = self.conn_mut();
        conn.execute(
            "INSERT INTO audit_log (timestamp, action, org_id, schedule_id, backup_id, rule_id, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                entry.timestamp.to_rfc3339(),
                &entry.action,
                entry.org_id.map(|id| id.to_string()),
                entry.schedule_id.map(|id| id.to_string()),
                entry.backup_id.map(|id| id.to_string()),
                entry.rule_id,
                &entry.details,
            ),
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_audit_entries(
        &self,
        org_id: Option<Uuid>,
        action: Option<&str>,
        limit: Option<i32>,
    ) -> Result<Vec<AuditLogEntry>> {
        let conn = self.conn();
        let mut query = "SELECT id, timestamp, action, org_id, schedule_id, backup_id, rule_id, details
                         FROM audit_log WHERE 1=1"
            .to_string();

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(org) = org_id {
            query.push_str(" AND org_id = ?");
            params.push(Box::new(org.to_string()));
        }

        if let Some(act) = action {
            query.push_str(" AND action = ?");
            params.push(Box::new(act.to_string()));
        }

        query.push_str(" ORDER BY timestamp DESC, id DESC");

        if let Some(lim) = limit {
            query.push_str(" LIMIT ?");
            params.push(Box::new(lim));
        }

        let mut stmt = conn.prepare(&query)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let entries = stmt
            .query_map(&param_refs[..], |row| {
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    timestamp: row
                        .get::<_, Option<String>>(1)?
                        .and_then(|s| parse_timestamp(&s))
                        .unwrap_or_else(Utc::now),
                    action: row.get(2)?,
                    org_id: parse_optional_uuid(3, row.get(3)?)?,
                    schedule_id: parse_optional_uuid(4, row.get(4)?)?,
                    backup_id: parse_optional_uuid(5, row.get(5)?)?,
                    rule_id: row.get(6)?,
                    details: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteDatabase};

    fn create_test_db() -> SqliteDatabase {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_audit_log() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();

        let mut entry = AuditLogEntry::new("rule_created");
        entry.org_id = Some(org);
        entry.rule_id = Some(7);
        entry.details = Some("pattern=/hr/**".to_string());

        let id = db.log_audit(&entry).unwrap();
        assert!(id > 0);

        let entries = db.get_audit_entries(Some(org), None, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "rule_created");
        assert_eq!(entries[0].rule_id, Some(7));
        assert_eq!(entries[0].org_id, Some(org));
    }

    #[test]
    fn test_audit_log_filtering() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();

        for i in 1..=5 {
            let mut entry = AuditLogEntry::new(if i % 2 == 0 { "backup_snapshot" } else { "schedule_classified" });
            entry.org_id = Some(org);
            db.log_audit(&entry).unwrap();
        }
        db.log_audit(&AuditLogEntry::new("rule_deleted")).unwrap();

        assert_eq!(db.get_audit_entries(None, None, None).unwrap().len(), 6);
        assert_eq!(db.get_audit_entries(Some(org), None, None).unwrap().len(), 5);
        assert_eq!(db.get_audit_entries(None, None, Some(3)).unwrap().len(), 3);
        assert_eq!(
            db.get_audit_entries(Some(org), Some("backup_snapshot"), None).unwrap().len(),
            2
        );
    }
}
