use crate::error::{Result, TiermarkError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Sensitivity tier assigned to paths, schedules and backups.
///
/// Ordering: Public < Internal < Confidential < Restricted. Comparisons go
/// through [`ClassificationLevel::rank`], never through the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationLevel {
    #[default]
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl ClassificationLevel {
    pub const ALL: [ClassificationLevel; 4] = [
        ClassificationLevel::Public,
        ClassificationLevel::Internal,
        ClassificationLevel::Confidential,
        ClassificationLevel::Restricted,
    ];

    pub fn rank(self) -> u8 {
        match self {
            ClassificationLevel::Public => 0,
            ClassificationLevel::Internal => 1,
            ClassificationLevel::Confidential => 2,
            ClassificationLevel::Restricted => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationLevel::Public => "public",
            ClassificationLevel::Internal => "internal",
            ClassificationLevel::Confidential => "confidential",
            ClassificationLevel::Restricted => "restricted",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(ClassificationLevel::Public),
            "internal" => Ok(ClassificationLevel::Internal),
            "confidential" => Ok(ClassificationLevel::Confidential),
            "restricted" => Ok(ClassificationLevel::Restricted),
            _ => Err(TiermarkError::InvalidLevel(s.to_string())),
        }
    }
}

impl PartialOrd for ClassificationLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassificationLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
