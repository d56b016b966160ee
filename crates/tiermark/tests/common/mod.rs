#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tempfile::TempDir;
use tiermark_lib::{
    AuditDatabase, AuditLogEntry, Backup, BackupClassification, BackupsDatabase, ClassificationEngine,
    ClassificationLevel, ClassificationRule, Database, RecomputeMode, Result, RulesDatabase, Schedule,
    ScheduleClassification, SchedulesDatabase, SqliteDatabase, TiermarkError,
};
use uuid::Uuid;

pub struct TestFixture {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
    pub engine: ClassificationEngine<SqliteDatabase>,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let db_path = temp_dir.path().join("test.db");
        let mut db = SqliteDatabase::open(&db_path)?;
        db.initialize()?;

        Ok(Self {
            temp_dir,
            db_path,
            engine: ClassificationEngine::new(db),
        })
    }

    pub fn add_schedule(&mut self, org: Uuid, include: &[&str], exclude: &[&str]) -> Schedule {
        let schedule = Schedule::new(org, "nightly", paths(include), paths(exclude));
        self.engine.db_mut().add_schedule(&schedule).unwrap();
        schedule
    }

    pub fn add_backup(&mut self, schedule: &Schedule) -> Backup {
        let backup = Backup {
            id: Uuid::new_v4(),
            org_id: schedule.org_id,
            schedule_id: schedule.id,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.engine.db_mut().add_backup(&backup).unwrap();
        backup
    }

    pub fn custom_rule(
        &mut self,
        org: Uuid,
        pattern: &str,
        level: ClassificationLevel,
        tags: &[&str],
    ) -> ClassificationRule {
        self.engine
            .create_rule(
                ClassificationRule::custom(org, pattern, pattern, level).with_data_types(tags.iter().copied()),
            )
            .unwrap()
    }

    pub fn stored_level(&self, schedule: &Schedule) -> ClassificationLevel {
        self.engine
            .db()
            .get_schedule_classification(schedule.id)
            .unwrap()
            .map(|c| c.level)
            .unwrap_or_default()
    }
}

pub fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A store whose reads can be switched to fail, standing in for an
/// unreachable database.
pub struct FlakyStore {
    pub inner: SqliteDatabase,
    pub fail_reads: bool,
    pub fail_audit: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        let mut inner = SqliteDatabase::open_in_memory().unwrap();
        inner.initialize().unwrap();
        Self {
            inner,
            fail_reads: false,
            fail_audit: false,
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail_reads {
            Err(TiermarkError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "store timed out",
            )))
        } else {
            Ok(())
        }
    }
}

impl RulesDatabase for FlakyStore {
    fn create_rule(&mut self, rule: &ClassificationRule) -> Result<i64> {
        self.inner.create_rule(rule)
    }

    fn get_rule(&self, id: i64) -> Result<Option<ClassificationRule>> {
        self.inner.get_rule(id)
    }

    fn update_rule(&mut self, rule: &ClassificationRule) -> Result<()> {
        self.inner.update_rule(rule)
    }

    fn delete_rule(&mut self, id: i64) -> Result<()> {
        self.inner.delete_rule(id)
    }

    fn set_rule_enabled(&mut self, id: i64, enabled: bool) -> Result<()> {
        self.inner.set_rule_enabled(id, enabled)
    }

    fn list_rules(&self, org_id: Uuid) -> Result<Vec<ClassificationRule>> {
        self.check()?;
        self.inner.list_rules(org_id)
    }

    fn list_builtin_rules(&self) -> Result<Vec<ClassificationRule>> {
        self.check()?;
        self.inner.list_builtin_rules()
    }
}

impl SchedulesDatabase for FlakyStore {
    fn add_schedule(&mut self, schedule: &Schedule) -> Result<()> {
        self.inner.add_schedule(schedule)
    }

    fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>> {
        self.check()?;
        self.inner.get_schedule(id)
    }

    fn list_schedules_by_org(&self, org_id: Uuid) -> Result<Vec<Schedule>> {
        self.check()?;
        self.inner.list_schedules_by_org(org_id)
    }

    fn list_all_schedules(&self) -> Result<Vec<Schedule>> {
        self.check()?;
        self.inner.list_all_schedules()
    }

    fn update_schedule_paths(&mut self, id: Uuid, include_paths: &[String], exclude_paths: &[String]) -> Result<()> {
        self.inner.update_schedule_paths(id, include_paths, exclude_paths)
    }

    fn get_schedule_classification(&self, schedule_id: Uuid) -> Result<Option<ScheduleClassification>> {
        self.check()?;
        self.inner.get_schedule_classification(schedule_id)
    }

    fn upsert_schedule_classification(
        &mut self,
        classification: &ScheduleClassification,
        mode: RecomputeMode,
    ) -> Result<bool> {
        self.inner.upsert_schedule_classification(classification, mode)
    }

    fn list_schedule_classifications_by_org(&self, org_id: Uuid) -> Result<Vec<ScheduleClassification>> {
        self.check()?;
        self.inner.list_schedule_classifications_by_org(org_id)
    }
}

impl BackupsDatabase for FlakyStore {
    fn add_backup(&mut self, backup: &Backup) -> Result<()> {
        self.inner.add_backup(backup)
    }

    fn get_backup(&self, id: Uuid) -> Result<Option<Backup>> {
        self.inner.get_backup(id)
    }

    fn complete_backup(&mut self, id: Uuid, completed_at: DateTime<Utc>) -> Result<()> {
        self.inner.complete_backup(id, completed_at)
    }

    fn list_backups_by_org(&self, org_id: Uuid) -> Result<Vec<Backup>> {
        self.check()?;
        self.inner.list_backups_by_org(org_id)
    }

    fn list_backups_by_org_and_level(
        &self,
        org_id: Uuid,
        level: ClassificationLevel,
        limit: Option<u32>,
    ) -> Result<Vec<Backup>> {
        self.check()?;
        self.inner.list_backups_by_org_and_level(org_id, level, limit)
    }

    // Snapshot writes and their lookups stay healthy so the unavailable
    // record itself can be stored.
    fn create_backup_classification(&mut self, classification: &BackupClassification) -> Result<BackupClassification> {
        self.inner.create_backup_classification(classification)
    }

    fn get_backup_classification(&self, backup_id: Uuid) -> Result<Option<BackupClassification>> {
        self.inner.get_backup_classification(backup_id)
    }

    fn list_backup_classifications_by_org(&self, org_id: Uuid) -> Result<Vec<BackupClassification>> {
        self.inner.list_backup_classifications_by_org(org_id)
    }
}

impl AuditDatabase for FlakyStore {
    fn log_audit(&mut self, entry: &AuditLogEntry) -> Result<i64> {
        if self.fail_audit {
            return Err(TiermarkError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "audit log is read-only",
            )));
        }
        self.inner.log_audit(entry)
    }

    fn get_audit_entries(&self, org_id: Option<Uuid>, action: Option<&str>, limit: Option<i32>) -> Result<Vec<AuditLogEntry>> {
        self.inner.get_audit_entries(org_id, action, limit)
    }
}
