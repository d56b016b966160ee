//! The classification engine: resolves paths, keeps schedule classifications
//! current, and propagates rule changes to the schedules they affect.

use crate::classify::{
    classify_paths, seed_builtin_rules, validate_pattern, BuiltinCatalogue, ClassificationLevel, MatchOptions, PathSetClassification, Resolution,
    RuleSet,
};
use crate::db::{
    AuditDatabase, AuditLogEntry, ClassificationRule, ClassificationStatus, ClassificationStore, DataTypes,
    RecomputeMode, RulesDatabase, Schedule, ScheduleClassification, SchedulesDatabase,
};
use crate::error::{Result, TiermarkError};
use crate::report::{self, ClassificationSummary};
use chrono::Utc;
use uuid::Uuid;

pub struct ClassificationEngine<D> {
    db: D,
    options: MatchOptions,
}

impl<D: ClassificationStore> ClassificationEngine<D> {
    pub fn new(db: D) -> Self {
        Self::with_options(db, MatchOptions::default())
    }

    pub fn with_options(db: D, options: MatchOptions) -> Self {
        Self { db, options }
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut D {
        &mut self.db
    }

    pub fn into_inner(self) -> D {
        self.db
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Enabled rules visible to `org_id`, compiled for matching.
    pub fn rule_set(&self, org_id: Uuid) -> Result<RuleSet> {
        let rules = self.db.list_rules(org_id).map_err(TiermarkError::unavailable)?;
        Ok(RuleSet::for_org(org_id, rules, self.options))
    }

    pub fn resolve_path(&self, org_id: Uuid, path: &str) -> Result<Resolution> {
        Ok(self.rule_set(org_id)?.resolve(path))
    }

    pub fn classify_path_set(
        &self,
        org_id: Uuid,
        include_paths: &[String],
        exclude_patterns: &[String],
    ) -> Result<PathSetClassification> {
        let rules = self.rule_set(org_id)?;
        Ok(classify_paths(&rules, include_paths, exclude_patterns))
    }

    /// Recomputes and stores the classification of `schedule`, returning
    /// the stored record. Under `PreserveOverride` a manual override stays
    /// in place and is returned unchanged.
    pub fn classify_schedule(&mut self, schedule: &Schedule, mode: RecomputeMode) -> Result<ScheduleClassification> {
        let result = self.classify_path_set(schedule.org_id, &schedule.include_paths, &schedule.exclude_paths)?;

        let record = ScheduleClassification {
            schedule_id: schedule.id,
            org_id: schedule.org_id,
            level: result.level,
            data_types: result.data_types,
            auto_classified: true,
            status: result.status,
            classified_at: Utc::now(),
        };

        let written = self
            .db
            .upsert_schedule_classification(&record, mode)
            .map_err(TiermarkError::unavailable)?;

        if written {
            log::info!(
                "Schedule {} classified as {} ({} eligible, {} excluded path(s))",
                schedule.id,
                record.level,
                result.eligible_paths.len(),
                result.excluded_paths.len()
            );
            let mut entry = AuditLogEntry::new("schedule_classified");
            entry.org_id = Some(schedule.org_id);
            entry.schedule_id = Some(schedule.id);
            entry.details = Some(format!("level={} status={}", record.level, record.status.as_str()));
            self.audit(&entry);
        } else {
            log::warn!(
                "Schedule {} has a manual override; computed level {} not applied",
                schedule.id,
                record.level
            );
        }

        self.db
            .get_schedule_classification(schedule.id)
            .map_err(TiermarkError::unavailable)?
            .ok_or_else(|| {
                TiermarkError::ClassificationUnavailable(format!("no classification stored for schedule {}", schedule.id))
            })
    }

    pub fn recompute_org(&mut self, org_id: Uuid, mode: RecomputeMode) -> Result<Vec<ScheduleClassification>> {
        let schedules = self.db.list_schedules_by_org(org_id).map_err(TiermarkError::unavailable)?;
        schedules
            .iter()
            .map(|schedule| self.classify_schedule(schedule, mode))
            .collect()
    }

    /// Recomputes every schedule of every organization.
    pub fn recompute_all(&mut self, mode: RecomputeMode) -> Result<usize> {
        let schedules = self.db.list_all_schedules().map_err(TiermarkError::unavailable)?;
        for schedule in &schedules {
            self.classify_schedule(schedule, mode)?;
        }
        Ok(schedules.len())
    }

    /// Stores an operator-set classification that automatic recomputation
    /// will not overwrite.
    pub fn set_manual_classification(
        &mut self,
        schedule_id: Uuid,
        level: ClassificationLevel,
        data_types: DataTypes,
    ) -> Result<ScheduleClassification> {
        let schedule = self.load_schedule(schedule_id)?;

        let record = ScheduleClassification {
            schedule_id,
            org_id: schedule.org_id,
            level,
            data_types,
            auto_classified: false,
            status: ClassificationStatus::Resolved,
            classified_at: Utc::now(),
        };
        self.db.upsert_schedule_classification(&record, RecomputeMode::Reset)?;

        log::info!("Schedule {} manually classified as {}", schedule_id, level);
        let mut entry = AuditLogEntry::new("manual_override");
        entry.org_id = Some(schedule.org_id);
        entry.schedule_id = Some(schedule_id);
        entry.details = Some(format!("level={}", level));
        self.audit(&entry);

        Ok(record)
    }

    pub fn update_schedule_paths(
        &mut self,
        schedule_id: Uuid,
        include_paths: &[String],
        exclude_paths: &[String],
    ) -> Result<ScheduleClassification> {
        self.db.update_schedule_paths(schedule_id, include_paths, exclude_paths)?;
        let schedule = self.load_schedule(schedule_id)?;

        let mut entry = AuditLogEntry::new("schedule_paths_updated");
        entry.org_id = Some(schedule.org_id);
        entry.schedule_id = Some(schedule_id);
        entry.details = Some(format!(
            "{} include, {} exclude",
            include_paths.len(),
            exclude_paths.len()
        ));
        self.audit(&entry);

        self.classify_schedule(&schedule, RecomputeMode::PreserveOverride)
    }

    pub fn create_rule(&mut self, rule: ClassificationRule) -> Result<ClassificationRule> {
        validate_pattern(&rule.pattern)?;
        check_ownership(&rule)?;

        let id = self.db.create_rule(&rule)?;
        let stored = self.load_rule(id)?;
        log::info!("Created rule {} ({}) {} -> {}", id, stored.name, stored.pattern, stored.level);

        self.audit_rule("rule_created", &stored);
        self.recompute_for_rule(&stored)?;
        Ok(stored)
    }

    /// Updates a rule's matching fields. Ownership and creation time are
    /// kept from the stored rule.
    pub fn update_rule(&mut self, rule: ClassificationRule) -> Result<ClassificationRule> {
        let existing = self.load_rule(rule.id)?;
        validate_pattern(&rule.pattern)?;

        let updated = ClassificationRule {
            org_id: existing.org_id,
            is_builtin: existing.is_builtin,
            created_at: existing.created_at,
            ..rule
        };
        self.db.update_rule(&updated)?;
        let stored = self.load_rule(updated.id)?;

        self.audit_rule("rule_updated", &stored);
        self.recompute_for_rule(&stored)?;
        Ok(stored)
    }

    pub fn delete_rule(&mut self, id: i64) -> Result<()> {
        let existing = self.load_rule(id)?;
        self.db.delete_rule(id)?;
        log::info!("Deleted rule {} ({})", id, existing.name);

        self.audit_rule("rule_deleted", &existing);
        self.recompute_for_rule(&existing)?;
        Ok(())
    }

    pub fn set_rule_enabled(&mut self, id: i64, enabled: bool) -> Result<ClassificationRule> {
        self.load_rule(id)?;
        self.db.set_rule_enabled(id, enabled)?;
        let stored = self.load_rule(id)?;

        self.audit_rule(if enabled { "rule_enabled" } else { "rule_disabled" }, &stored);
        self.recompute_for_rule(&stored)?;
        Ok(stored)
    }

    /// Inserts missing catalogue entries and, when anything was added,
    /// recomputes every schedule against the enlarged rule set.
    pub fn seed_builtins(&mut self, catalogue: &BuiltinCatalogue) -> Result<usize> {
        let inserted = seed_builtin_rules(&mut self.db, catalogue)?;
        if inserted > 0 {
            let recomputed = self.recompute_all(RecomputeMode::PreserveOverride)?;
            log::debug!("Recomputed {} schedule(s) after seeding", recomputed);
        }
        Ok(inserted)
    }

    pub fn summarize(&self, org_id: Uuid) -> Result<ClassificationSummary> {
        report::summarize(&self.db, org_id)
    }

    pub(crate) fn load_schedule(&self, schedule_id: Uuid) -> Result<Schedule> {
        self.db
            .get_schedule(schedule_id)?
            .ok_or(TiermarkError::ScheduleNotFound(schedule_id))
    }

    fn load_rule(&self, id: i64) -> Result<ClassificationRule> {
        self.db.get_rule(id)?.ok_or(TiermarkError::RuleNotFound(id))
    }

    /// Custom rules touch their owner's schedules, built-ins touch all.
    fn recompute_for_rule(&mut self, rule: &ClassificationRule) -> Result<usize> {
        match rule.org_id {
            Some(org_id) if !rule.is_builtin => Ok(self.recompute_org(org_id, RecomputeMode::PreserveOverride)?.len()),
            _ => self.recompute_all(RecomputeMode::PreserveOverride),
        }
    }

    fn audit_rule(&mut self, action: &str, rule: &ClassificationRule) {
        let mut entry = AuditLogEntry::new(action);
        entry.org_id = rule.org_id;
        entry.rule_id = Some(rule.id);
        entry.details = Some(format!(
            "{} pattern={} level={} priority={} enabled={}",
            rule.name, rule.pattern, rule.level, rule.priority, rule.enabled
        ));
        self.audit(&entry);
    }

    /// Audit writes never fail the operation they describe.
    pub(crate) fn audit(&mut self, entry: &AuditLogEntry) {
        if let Err(e) = self.db.log_audit(entry) {
            log::warn!("Failed to write audit entry '{}': {}", entry.action, e);
        }
    }
}

fn check_ownership(rule: &ClassificationRule) -> Result<()> {
    match (rule.is_builtin, rule.org_id) {
        (true, Some(_)) => Err(TiermarkError::Config(format!(
            "Built-in rule '{}' cannot belong to an organization",
            rule.name
        ))),
        (false, None) => Err(TiermarkError::Config(format!(
            "Custom rule '{}' needs an owning organization",
            rule.name
        ))),
        _ => Ok(()),
    }
}
