use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TiermarkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid classification level: {0}")]
    InvalidLevel(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Rule not found: {0}")]
    RuleNotFound(i64),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(Uuid),

    #[error("Backup not found: {0}")]
    BackupNotFound(Uuid),

    #[error("Classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("Backup classification for {backup_id} is immutable and already recorded")]
    ImmutableRecord { backup_id: Uuid },

    #[error("Backup {backup_id} belongs to schedule {recorded}, not {requested}")]
    ScheduleMismatch {
        backup_id: Uuid,
        recorded: Uuid,
        requested: Uuid,
    },
}

impl TiermarkError {
    /// Folds storage failures into `ClassificationUnavailable`. Lookup and
    /// validation errors pass through unchanged.
    pub fn unavailable(err: TiermarkError) -> Self {
        match err {
            TiermarkError::Database(_) | TiermarkError::Io(_) | TiermarkError::Json(_) => {
                TiermarkError::ClassificationUnavailable(err.to_string())
            }
            other => other,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, TiermarkError::ClassificationUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, TiermarkError>;
