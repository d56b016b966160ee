use crate::classify::ClassificationLevel;
use crate::db::{
    parse_json, parse_level, parse_source, parse_status, parse_timestamp, parse_uuid,
    required_timestamp, Backup, BackupClassification,
};
use crate::error::{Result, TiermarkError};
use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

const BACKUP_COLUMNS: &str = "b.id, b.org_id, b.schedule_id, b.started_at, b.completed_at";

const CLASSIFICATION_COLUMNS: &str = "backup_id, schedule_id, org_id, level, data_types, paths,
                                      status, source, classified_at";

pub trait BackupsDatabase {
    fn add_backup(&mut self, backup: &Backup) -> Result<()>;
    fn get_backup(&self, id: Uuid) -> Result<Option<Backup>>;
    fn complete_backup(&mut self, id: Uuid, completed_at: DateTime<Utc>) -> Result<()>;
    fn list_backups_by_org(&self, org_id: Uuid) -> Result<Vec<Backup>>;
    fn list_backups_by_org_and_level(
        &self,
        org_id: Uuid,
        level: ClassificationLevel,
        limit: Option<u32>,
    ) -> Result<Vec<Backup>>;
    /// Insert-only. Re-submitting identical content for the same backup
    /// returns the stored record; anything else is rejected with
    /// `TiermarkError::ImmutableRecord`. There is no update counterpart.
    fn create_backup_classification(
        &mut self,
        classification: &BackupClassification,
    ) -> Result<BackupClassification>;
    fn get_backup_classification(&self, backup_id: Uuid) -> Result<Option<BackupClassification>>;
    fn list_backup_classifications_by_org(&self, org_id: Uuid) -> Result<Vec<BackupClassification>>;
}

impl BackupsDatabase for crate::db::SqliteDatabase {
    fn add_backup(&mut self, backup: &Backup) -> Result<()> {
        let conn = self.conn_mut();
        conn.execute(
            "INSERT INTO backups (id, org_id, schedule_id, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                backup.id.to_string(),
                backup.org_id.to_string(),
                backup.schedule_id.to_string(),
                backup.started_at.to_rfc3339(),
                backup.completed_at.as_ref().map(|dt| dt.to_rfc3339()),
            ),
        )?;
        Ok(())
    }

    fn get_backup(&self, id: Uuid) -> Result<Option<Backup>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM backups b WHERE b.id = ?1", BACKUP_COLUMNS))?;
        let backup = stmt.query_row([id.to_string()], parse_backup_row).optional()?;
        Ok(backup)
    }

    fn complete_backup(&mut self, id: Uuid, completed_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn_mut();
        let rows = conn.execute(
            "UPDATE backups SET completed_at = ?1 WHERE id = ?2",
            (completed_at.to_rfc3339(), id.to_string()),
        )?;
        if rows == 0 {
            return Err(TiermarkError::BackupNotFound(id));
        }
        Ok(())
    }

    fn list_backups_by_org(&self, org_id: Uuid) -> Result<Vec<Backup>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backups b WHERE b.org_id = ?1 ORDER BY b.started_at DESC",
            BACKUP_COLUMNS
        ))?;

        let backups = stmt
            .query_map([org_id.to_string()], parse_backup_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(backups)
    }

    fn list_backups_by_org_and_level(
        &self,
        org_id: Uuid,
        level: ClassificationLevel,
        limit: Option<u32>,
    ) -> Result<Vec<Backup>> {
        let conn = self.conn();
        // Backups without a classification record count as public.
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backups b
             LEFT JOIN backup_classifications c ON c.backup_id = b.id
             WHERE b.org_id = :org_id AND COALESCE(c.level, 'public') = :level
             ORDER BY b.started_at DESC
             LIMIT :limit",
            BACKUP_COLUMNS
        ))?;

        let backups = stmt
            .query_map(
                named_params! {
                    ":org_id": org_id.to_string(),
                    ":level": level.as_str(),
                    ":limit": limit.map(i64::from).unwrap_or(-1),
                },
                parse_backup_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(backups)
    }

    fn create_backup_classification(
        &mut self,
        classification: &BackupClassification,
    ) -> Result<BackupClassification> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT INTO backup_classifications
                 (backup_id, schedule_id, org_id, level, data_types, paths, status, source, classified_at)
             VALUES (:backup_id, :schedule_id, :org_id, :level, :data_types, :paths, :status, :source, :classified_at)
             ON CONFLICT(backup_id) DO NOTHING",
            named_params! {
                ":backup_id": classification.backup_id.to_string(),
                ":schedule_id": classification.schedule_id.to_string(),
                ":org_id": classification.org_id.to_string(),
                ":level": classification.level.as_str(),
                ":data_types": serde_json::to_string(&classification.data_types)?,
                ":paths": serde_json::to_string(&classification.paths)?,
                ":status": classification.status.as_str(),
                ":source": classification.source.as_str(),
                ":classified_at": classification.classified_at.to_rfc3339(),
            },
        )?;

        if inserted == 1 {
            tx.commit()?;
            return Ok(classification.clone());
        }

        let existing = fetch_backup_classification(&tx, classification.backup_id)?
            .ok_or(TiermarkError::BackupNotFound(classification.backup_id))?;
        tx.commit()?;

        if existing.same_content(classification) {
            log::debug!(
                "Backup {} already classified with identical content",
                classification.backup_id
            );
            return Ok(existing);
        }

        log::error!(
            "Refusing to overwrite immutable classification for backup {} ({} -> {})",
            classification.backup_id,
            existing.level,
            classification.level
        );
        Err(TiermarkError::ImmutableRecord {
            backup_id: classification.backup_id,
        })
    }

    fn get_backup_classification(&self, backup_id: Uuid) -> Result<Option<BackupClassification>> {
        fetch_backup_classification(self.conn(), backup_id)
    }

    fn list_backup_classifications_by_org(&self, org_id: Uuid) -> Result<Vec<BackupClassification>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM backup_classifications WHERE org_id = ?1 ORDER BY classified_at",
            CLASSIFICATION_COLUMNS
        ))?;

        let classifications = stmt
            .query_map([org_id.to_string()], parse_classification_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(classifications)
    }
}

fn fetch_backup_classification(conn: &Connection, backup_id: Uuid) -> Result<Option<BackupClassification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM backup_classifications WHERE backup_id = ?1",
        CLASSIFICATION_COLUMNS
    ))?;
    let classification = stmt
        .query_row([backup_id.to_string()], parse_classification_row)
        .optional()?;
    Ok(classification)
}

fn parse_backup_row(row: &Row) -> rusqlite::Result<Backup> {
    Ok(Backup {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        org_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        schedule_id: parse_uuid(2, &row.get::<_, String>(2)?)?,
        started_at: required_timestamp(3, &row.get::<_, String>(3)?)?,
        completed_at: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| parse_timestamp(&s)),
    })
}

fn parse_classification_row(row: &Row) -> rusqlite::Result<BackupClassification> {
    Ok(BackupClassification {
        backup_id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        schedule_id: parse_uuid(1, &row.get::<_, String>(1)?)?,
        org_id: parse_uuid(2, &row.get::<_, String>(2)?)?,
        level: parse_level(3, &row.get::<_, String>(3)?)?,
        data_types: parse_json(4, &row.get::<_, String>(4)?)?,
        paths: parse_json(5, &row.get::<_, String>(5)?)?,
        status: parse_status(6, &row.get::<_, String>(6)?)?,
        source: parse_source(7, &row.get::<_, String>(7)?)?,
        classified_at: required_timestamp(8, &row.get::<_, String>(8)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ClassificationStatus, Database, DataTypes, SnapshotSource, SqliteDatabase};

    fn create_test_db() -> SqliteDatabase {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn backup(org_id: Uuid) -> Backup {
        Backup {
            id: Uuid::new_v4(),
            org_id,
            schedule_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    fn record(backup: &Backup, level: ClassificationLevel) -> BackupClassification {
        BackupClassification {
            backup_id: backup.id,
            schedule_id: backup.schedule_id,
            org_id: backup.org_id,
            level,
            data_types: ["pii".to_string()].into_iter().collect::<DataTypes>(),
            paths: vec!["/srv/hr/people.csv".to_string()],
            status: ClassificationStatus::Resolved,
            source: SnapshotSource::Rescan,
            classified_at: Utc::now(),
        }
    }

    #[test]
    fn test_backup_crud() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();
        let b = backup(org);

        db.add_backup(&b).unwrap();
        assert_eq!(db.get_backup(b.id).unwrap().unwrap(), b);

        let done = Utc::now();
        db.complete_backup(b.id, done).unwrap();
        assert_eq!(db.get_backup(b.id).unwrap().unwrap().completed_at, Some(done));
        assert!(matches!(
            db.complete_backup(Uuid::new_v4(), done),
            Err(TiermarkError::BackupNotFound(_))
        ));
    }

    #[test]
    fn test_create_is_idempotent_for_identical_content() {
        let mut db = create_test_db();
        let b = backup(Uuid::new_v4());
        let first = record(&b, ClassificationLevel::Confidential);

        db.create_backup_classification(&first).unwrap();

        let mut retry = first.clone();
        retry.classified_at = Utc::now() + chrono::Duration::seconds(5);
        let stored = db.create_backup_classification(&retry).unwrap();
        assert_eq!(stored.classified_at, first.classified_at);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM backup_classifications", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_create_rejects_divergent_content() {
        let mut db = create_test_db();
        let b = backup(Uuid::new_v4());

        db.create_backup_classification(&record(&b, ClassificationLevel::Internal))
            .unwrap();
        let result = db.create_backup_classification(&record(&b, ClassificationLevel::Restricted));
        assert!(matches!(result, Err(TiermarkError::ImmutableRecord { backup_id }) if backup_id == b.id));

        let stored = db.get_backup_classification(b.id).unwrap().unwrap();
        assert_eq!(stored.level, ClassificationLevel::Internal);
    }

    #[test]
    fn test_list_by_level_treats_missing_as_public() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();

        let unclassified = backup(org);
        let secret = backup(org);
        db.add_backup(&unclassified).unwrap();
        db.add_backup(&secret).unwrap();
        db.create_backup_classification(&record(&secret, ClassificationLevel::Restricted))
            .unwrap();

        let public = db
            .list_backups_by_org_and_level(org, ClassificationLevel::Public, None)
            .unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, unclassified.id);

        let restricted = db
            .list_backups_by_org_and_level(org, ClassificationLevel::Restricted, Some(10))
            .unwrap();
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].id, secret.id);

        let limited = db
            .list_backups_by_org_and_level(org, ClassificationLevel::Public, Some(0))
            .unwrap();
        assert!(limited.is_empty());
    }
}
