pub mod audit;
pub mod backups;
pub mod rules;
pub mod schedules;
pub mod schema;

use crate::classify::ClassificationLevel;
use crate::error::{Result, TiermarkError};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub use audit::AuditDatabase;
pub use backups::BackupsDatabase;
pub use rules::RulesDatabase;
pub use schedules::SchedulesDatabase;

/// Free-form data-type tags ("pii", "financial", ...), kept sorted.
pub type DataTypes = BTreeSet<String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationRule {
    pub id: i64,
    /// `None` for built-in rules shared by every organization.
    pub org_id: Option<Uuid>,
    pub name: String,
    pub pattern: String,
    pub level: ClassificationLevel,
    pub data_types: DataTypes,
    pub description: Option<String>,
    pub is_builtin: bool,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassificationRule {
    /// A custom rule owned by `org_id`, enabled, with priority 0.
    pub fn custom(org_id: Uuid, name: &str, pattern: &str, level: ClassificationLevel) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            org_id: Some(org_id),
            name: name.to_string(),
            pattern: pattern.to_string(),
            level,
            data_types: DataTypes::new(),
            description: None,
            is_builtin: false,
            priority: 0,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// A built-in rule with no owning organization.
    pub fn builtin(name: &str, pattern: &str, level: ClassificationLevel) -> Self {
        Self {
            org_id: None,
            is_builtin: true,
            ..Self::custom(Uuid::nil(), name, pattern, level)
        }
    }

    pub fn with_data_types<I, S>(mut self, data_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_types = data_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn is_visible_to(&self, org_id: Uuid) -> bool {
        self.is_builtin || self.org_id == Some(org_id)
    }
}

/// Whether a stored classification reflects matched rules, the no-match
/// default, or a failure to classify at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    Resolved,
    #[default]
    Default,
    Unavailable,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Resolved => "resolved",
            ClassificationStatus::Default => "default",
            ClassificationStatus::Unavailable => "unavailable",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "resolved" => Ok(ClassificationStatus::Resolved),
            "default" => Ok(ClassificationStatus::Default),
            "unavailable" => Ok(ClassificationStatus::Unavailable),
            _ => Err(TiermarkError::Config(format!("Invalid classification status: {}", s))),
        }
    }
}

/// Where a backup snapshot took its classification from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Schedule,
    Rescan,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Schedule => "schedule",
            SnapshotSource::Rescan => "rescan",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "schedule" => Ok(SnapshotSource::Schedule),
            "rescan" => Ok(SnapshotSource::Rescan),
            _ => Err(TiermarkError::Config(format!("Invalid snapshot source: {}", s))),
        }
    }
}

/// How a schedule recomputation treats an existing manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecomputeMode {
    #[default]
    PreserveOverride,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(org_id: Uuid, name: &str, include_paths: Vec<String>, exclude_paths: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            name: name.to_string(),
            include_paths,
            exclude_paths,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Backup {
    pub id: Uuid,
    pub org_id: Uuid,
    pub schedule_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleClassification {
    pub schedule_id: Uuid,
    pub org_id: Uuid,
    pub level: ClassificationLevel,
    pub data_types: DataTypes,
    /// `false` marks an operator-set override.
    pub auto_classified: bool,
    pub status: ClassificationStatus,
    pub classified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupClassification {
    pub backup_id: Uuid,
    pub schedule_id: Uuid,
    pub org_id: Uuid,
    pub level: ClassificationLevel,
    pub data_types: DataTypes,
    pub paths: Vec<String>,
    pub status: ClassificationStatus,
    pub source: SnapshotSource,
    pub classified_at: DateTime<Utc>,
}

impl BackupClassification {
    /// Compares everything except the write timestamp.
    pub fn same_content(&self, other: &BackupClassification) -> bool {
        self.backup_id == other.backup_id
            && self.schedule_id == other.schedule_id
            && self.org_id == other.org_id
            && self.level == other.level
            && self.data_types == other.data_types
            && self.paths == other.paths
            && self.status == other.status
            && self.source == other.source
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub org_id: Option<Uuid>,
    pub schedule_id: Option<Uuid>,
    pub backup_id: Option<Uuid>,
    pub rule_id: Option<i64>,
    pub details: Option<String>,
}

impl AuditLogEntry {
    pub fn new(action: &str) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            action: action.to_string(),
            org_id: None,
            schedule_id: None,
            backup_id: None,
            rule_id: None,
            details: None,
        }
    }
}

pub trait Database {
    fn initialize(&mut self) -> Result<()>;
}

/// Everything the classification engine reads from and writes to.
pub trait ClassificationStore:
    RulesDatabase + SchedulesDatabase + BackupsDatabase + AuditDatabase
{
}

impl<T> ClassificationStore for T where
    T: RulesDatabase + SchedulesDatabase + BackupsDatabase + AuditDatabase
{
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Concurrent writers queue on the write lock instead of failing.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Database for SqliteDatabase {
    fn initialize(&mut self) -> Result<()> {
        schema::initialize_schema(&self.conn)
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

pub(crate) fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| conversion_error(idx, format!("invalid uuid '{}': {}", value, e)))
}

pub(crate) fn parse_optional_uuid(idx: usize, value: Option<String>) -> rusqlite::Result<Option<Uuid>> {
    value.map(|v| parse_uuid(idx, &v)).transpose()
}

pub(crate) fn parse_level(idx: usize, value: &str) -> rusqlite::Result<ClassificationLevel> {
    ClassificationLevel::from_str(value).map_err(|e| conversion_error(idx, e.to_string()))
}

pub(crate) fn parse_status(idx: usize, value: &str) -> rusqlite::Result<ClassificationStatus> {
    ClassificationStatus::from_str(value).map_err(|e| conversion_error(idx, e.to_string()))
}

pub(crate) fn parse_source(idx: usize, value: &str) -> rusqlite::Result<SnapshotSource> {
    SnapshotSource::from_str(value).map_err(|e| conversion_error(idx, e.to_string()))
}

pub(crate) fn parse_json<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| conversion_error(idx, format!("invalid JSON column: {}", e)))
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` format.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        })
}

pub(crate) fn required_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    parse_timestamp(value).ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{}'", value)))
}
