//! Point-in-time classification of a backup run.
//!
//! A snapshot is written once per backup and never changes afterwards. It
//! must not hold up the backup: when the classification cannot be computed
//! the record is still written, as `public` with status `unavailable`.

use crate::classify::{partition_paths, ClassificationLevel};
use crate::db::{
    AuditLogEntry, BackupClassification, BackupsDatabase, ClassificationStatus, ClassificationStore, DataTypes,
    RecomputeMode, Schedule, SchedulesDatabase, SnapshotSource,
};
use crate::engine::ClassificationEngine;
use crate::error::{Result, TiermarkError};
use chrono::Utc;
use uuid::Uuid;

struct Computed {
    level: ClassificationLevel,
    data_types: DataTypes,
    paths: Vec<String>,
    status: ClassificationStatus,
    source: SnapshotSource,
}

impl<D: ClassificationStore> ClassificationEngine<D> {
    /// Records the classification of `backup_id`.
    ///
    /// With `effective_paths` the paths actually touched by the run are
    /// rescanned (the schedule's exclude patterns still apply); otherwise
    /// the schedule's stored classification is copied, computing it first
    /// if needed. Retrying returns the record written by the first call.
    pub fn snapshot_backup_classification(
        &mut self,
        backup_id: Uuid,
        schedule: &Schedule,
        effective_paths: Option<&[String]>,
    ) -> Result<BackupClassification> {
        if let Ok(Some(backup)) = self.db().get_backup(backup_id) {
            if backup.schedule_id != schedule.id {
                return Err(TiermarkError::ScheduleMismatch {
                    backup_id,
                    recorded: backup.schedule_id,
                    requested: schedule.id,
                });
            }
        }

        match self.db().get_backup_classification(backup_id) {
            Ok(Some(existing)) => {
                log::debug!("Backup {} already has a classification snapshot", backup_id);
                return Ok(existing);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Could not check for an existing snapshot of backup {}: {}", backup_id, e),
        }

        let source = if effective_paths.is_some() {
            SnapshotSource::Rescan
        } else {
            SnapshotSource::Schedule
        };

        let computed = match self.compute_snapshot(schedule, effective_paths) {
            Ok(computed) => computed,
            Err(e) => {
                log::error!(
                    "Classification unavailable for backup {} of schedule {}: {}",
                    backup_id,
                    schedule.id,
                    e
                );
                Computed {
                    level: ClassificationLevel::Public,
                    data_types: DataTypes::new(),
                    paths: Vec::new(),
                    status: ClassificationStatus::Unavailable,
                    source,
                }
            }
        };

        let record = BackupClassification {
            backup_id,
            schedule_id: schedule.id,
            org_id: schedule.org_id,
            level: computed.level,
            data_types: computed.data_types,
            paths: computed.paths,
            status: computed.status,
            source: computed.source,
            classified_at: Utc::now(),
        };

        let stored = match self.db_mut().create_backup_classification(&record) {
            Ok(stored) => stored,
            Err(TiermarkError::ImmutableRecord { .. }) => {
                // A concurrent snapshot of the same backup won the insert.
                log::warn!("Backup {} was snapshotted concurrently; keeping the first record", backup_id);
                return self
                    .db()
                    .get_backup_classification(backup_id)?
                    .ok_or(TiermarkError::BackupNotFound(backup_id));
            }
            Err(e) => match self.db().get_backup_classification(backup_id) {
                Ok(Some(winner)) => {
                    log::warn!("Snapshot write for backup {} failed ({}); keeping the stored record", backup_id, e);
                    return Ok(winner);
                }
                _ => return Err(e),
            },
        };

        log::info!(
            "Backup {} snapshotted as {} ({}, {})",
            backup_id,
            stored.level,
            stored.source.as_str(),
            stored.status.as_str()
        );

        let mut entry = AuditLogEntry::new("backup_snapshot");
        entry.org_id = Some(stored.org_id);
        entry.schedule_id = Some(stored.schedule_id);
        entry.backup_id = Some(backup_id);
        entry.details = Some(format!(
            "level={} status={} source={}",
            stored.level,
            stored.status.as_str(),
            stored.source.as_str()
        ));
        self.audit(&entry);

        Ok(stored)
    }

    fn compute_snapshot(&mut self, schedule: &Schedule, effective_paths: Option<&[String]>) -> Result<Computed> {
        match effective_paths {
            Some(paths) => {
                let scan = self.classify_path_set(schedule.org_id, paths, &schedule.exclude_paths)?;
                let mut computed = Computed {
                    level: scan.level,
                    data_types: scan.data_types,
                    paths: scan.eligible_paths,
                    status: scan.status,
                    source: SnapshotSource::Rescan,
                };

                let current = self
                    .db()
                    .get_schedule_classification(schedule.id)
                    .map_err(TiermarkError::unavailable)?;
                if let Some(manual) = current.filter(|c| !c.auto_classified) {
                    computed.level = computed.level.max(manual.level);
                    computed.data_types.extend(manual.data_types);
                    computed.status = ClassificationStatus::Resolved;
                }

                Ok(computed)
            }
            None => {
                let current = self
                    .db()
                    .get_schedule_classification(schedule.id)
                    .map_err(TiermarkError::unavailable)?;
                let classification = match current {
                    Some(classification) => classification,
                    None => self.classify_schedule(schedule, RecomputeMode::PreserveOverride)?,
                };
                let (paths, _) = partition_paths(&schedule.include_paths, &schedule.exclude_paths, self.options());

                Ok(Computed {
                    level: classification.level,
                    data_types: classification.data_types,
                    paths,
                    status: classification.status,
                    source: SnapshotSource::Schedule,
                })
            }
        }
    }
}
