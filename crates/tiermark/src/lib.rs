pub mod classify;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod report;
pub mod snapshot;

pub use classify::{
    classify_paths, compare_rank, matches, partition_paths, seed_builtin_rules, validate_pattern, BuiltinCatalogue,
    CatalogueEntry, ClassificationLevel, MatchOptions, PathPattern, PathSetClassification, Resolution, RuleSet,
};
pub use config::{Config, EngineSettings};
pub use db::{
    AuditDatabase, AuditLogEntry, Backup, BackupClassification, BackupsDatabase, ClassificationRule,
    ClassificationStatus, ClassificationStore, DataTypes, Database, RecomputeMode, RulesDatabase, Schedule,
    ScheduleClassification, SchedulesDatabase, SnapshotSource, SqliteDatabase,
};
pub use engine::ClassificationEngine;
pub use error::{Result, TiermarkError};
pub use report::{summarize, ClassificationSummary};
