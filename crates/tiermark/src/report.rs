//! Per-organization classification totals.

use crate::classify::ClassificationLevel;
use crate::db::{BackupsDatabase, ClassificationStatus, SchedulesDatabase};
use crate::error::{Result, TiermarkError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub org_id: Uuid,
    pub total_schedules: u64,
    pub total_backups: u64,
    /// Only levels with at least one schedule appear.
    pub schedules_by_level: BTreeMap<ClassificationLevel, u64>,
    pub backups_by_level: BTreeMap<ClassificationLevel, u64>,
    pub schedules_by_data_type: BTreeMap<String, u64>,
    pub backups_by_data_type: BTreeMap<String, u64>,
    /// Backups whose snapshot could not be computed. They are also counted
    /// as public in `backups_by_level`.
    pub unavailable_backups: u64,
    pub manual_overrides: u64,
}

impl ClassificationSummary {
    pub fn schedules_at(&self, level: ClassificationLevel) -> u64 {
        self.schedules_by_level.get(&level).copied().unwrap_or(0)
    }

    pub fn backups_at(&self, level: ClassificationLevel) -> u64 {
        self.backups_by_level.get(&level).copied().unwrap_or(0)
    }
}

/// Counts schedules and backups of `org_id` by level and data-type tag.
/// Anything without a stored classification counts as public.
pub fn summarize<D>(db: &D, org_id: Uuid) -> Result<ClassificationSummary>
where
    D: SchedulesDatabase + BackupsDatabase,
{
    let mut summary = ClassificationSummary {
        org_id,
        ..ClassificationSummary::default()
    };

    let schedules = db.list_schedules_by_org(org_id).map_err(TiermarkError::unavailable)?;
    let schedule_classifications: HashMap<Uuid, _> = db
        .list_schedule_classifications_by_org(org_id)
        .map_err(TiermarkError::unavailable)?
        .into_iter()
        .map(|c| (c.schedule_id, c))
        .collect();

    for schedule in &schedules {
        summary.total_schedules += 1;
        match schedule_classifications.get(&schedule.id) {
            Some(classification) => {
                *summary.schedules_by_level.entry(classification.level).or_insert(0) += 1;
                for tag in &classification.data_types {
                    *summary.schedules_by_data_type.entry(tag.clone()).or_insert(0) += 1;
                }
                if !classification.auto_classified {
                    summary.manual_overrides += 1;
                }
            }
            None => *summary.schedules_by_level.entry(ClassificationLevel::Public).or_insert(0) += 1,
        }
    }

    let backups = db.list_backups_by_org(org_id).map_err(TiermarkError::unavailable)?;
    let backup_classifications: HashMap<Uuid, _> = db
        .list_backup_classifications_by_org(org_id)
        .map_err(TiermarkError::unavailable)?
        .into_iter()
        .map(|c| (c.backup_id, c))
        .collect();

    let backup_ids: BTreeSet<Uuid> = backups
        .iter()
        .map(|b| b.id)
        .chain(backup_classifications.keys().copied())
        .collect();

    for backup_id in &backup_ids {
        summary.total_backups += 1;
        match backup_classifications.get(backup_id) {
            Some(classification) => {
                *summary.backups_by_level.entry(classification.level).or_insert(0) += 1;
                for tag in &classification.data_types {
                    *summary.backups_by_data_type.entry(tag.clone()).or_insert(0) += 1;
                }
                if classification.status == ClassificationStatus::Unavailable {
                    summary.unavailable_backups += 1;
                }
            }
            None => *summary.backups_by_level.entry(ClassificationLevel::Public).or_insert(0) += 1,
        }
    }

    log::debug!(
        "Summary for {}: {} schedule(s), {} backup(s)",
        org_id,
        summary.total_schedules,
        summary.total_backups
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        Backup, BackupClassification, Database, DataTypes, RecomputeMode, Schedule, ScheduleClassification,
        SnapshotSource, SqliteDatabase,
    };
    use chrono::Utc;

    fn create_test_db() -> SqliteDatabase {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn classified_schedule(db: &mut SqliteDatabase, org: Uuid, level: ClassificationLevel, tags: &[&str]) -> Schedule {
        let schedule = Schedule::new(org, "s", vec![], vec![]);
        db.add_schedule(&schedule).unwrap();
        db.upsert_schedule_classification(
            &ScheduleClassification {
                schedule_id: schedule.id,
                org_id: org,
                level,
                data_types: tags.iter().map(|t| t.to_string()).collect(),
                auto_classified: true,
                status: ClassificationStatus::Resolved,
                classified_at: Utc::now(),
            },
            RecomputeMode::PreserveOverride,
        )
        .unwrap();
        schedule
    }

    #[test]
    fn test_empty_org() {
        let db = create_test_db();
        let org = Uuid::new_v4();

        let summary = summarize(&db, org).unwrap();
        assert_eq!(summary.total_schedules, 0);
        assert_eq!(summary.total_backups, 0);
        assert!(summary.schedules_by_level.is_empty());
        assert!(summary.backups_by_data_type.is_empty());
    }

    #[test]
    fn test_schedule_counts_by_level() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();
        classified_schedule(&mut db, org, ClassificationLevel::Public, &[]);
        classified_schedule(&mut db, org, ClassificationLevel::Confidential, &["pii"]);
        classified_schedule(&mut db, org, ClassificationLevel::Confidential, &["pii", "financial"]);

        let summary = summarize(&db, org).unwrap();
        assert_eq!(summary.total_schedules, 3);
        assert_eq!(summary.total_backups, 0);
        assert_eq!(
            summary.schedules_by_level,
            BTreeMap::from([(ClassificationLevel::Public, 1), (ClassificationLevel::Confidential, 2)])
        );
        assert_eq!(summary.schedules_by_data_type.get("pii"), Some(&2));
        assert_eq!(summary.schedules_by_data_type.get("financial"), Some(&1));
    }

    #[test]
    fn test_unclassified_counts_as_public() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();
        let schedule = Schedule::new(org, "fresh", vec![], vec![]);
        db.add_schedule(&schedule).unwrap();

        let unclassified = Backup {
            id: Uuid::new_v4(),
            org_id: org,
            schedule_id: schedule.id,
            started_at: Utc::now(),
            completed_at: None,
        };
        db.add_backup(&unclassified).unwrap();

        let failed = BackupClassification {
            backup_id: Uuid::new_v4(),
            schedule_id: schedule.id,
            org_id: org,
            level: ClassificationLevel::Public,
            data_types: DataTypes::new(),
            paths: vec![],
            status: ClassificationStatus::Unavailable,
            source: SnapshotSource::Schedule,
            classified_at: Utc::now(),
        };
        db.create_backup_classification(&failed).unwrap();

        let summary = summarize(&db, org).unwrap();
        assert_eq!(summary.schedules_at(ClassificationLevel::Public), 1);
        assert_eq!(summary.total_backups, 2);
        assert_eq!(summary.backups_at(ClassificationLevel::Public), 2);
        assert_eq!(summary.unavailable_backups, 1);
    }

    #[test]
    fn test_other_orgs_are_not_counted() {
        let mut db = create_test_db();
        let org = Uuid::new_v4();
        classified_schedule(&mut db, Uuid::new_v4(), ClassificationLevel::Restricted, &["credentials"]);

        let summary = summarize(&db, org).unwrap();
        assert_eq!(summary.total_schedules, 0);
        assert_eq!(summary.schedules_at(ClassificationLevel::Restricted), 0);
    }
}
