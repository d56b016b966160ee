//! Built-in rule catalogue loaded from TOML.
//!
//! Each `[rules.<name>]` table becomes one built-in rule:
//!
//! ```toml
//! [rules.private_keys]
//! pattern = "**/*.{pem,key}"
//! level = "restricted"
//! data_types = ["credentials"]
//! priority = 100
//! ```

use crate::classify::level::ClassificationLevel;
use crate::classify::pattern::validate_pattern;
use crate::db::{AuditDatabase, AuditLogEntry, ClassificationRule, RulesDatabase};
use crate::error::{Result, TiermarkError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const BUNDLED: &str = include_str!("../../rules/builtin.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueEntry {
    #[serde(default)]
    pub name: String,
    pub pattern: String,
    pub level: ClassificationLevel,
    #[serde(default)]
    pub data_types: Vec<String>,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> i32 {
    50
}

fn default_enabled() -> bool {
    true
}

impl CatalogueEntry {
    pub fn to_rule(&self) -> ClassificationRule {
        let mut rule = ClassificationRule::builtin(&self.name, &self.pattern, self.level)
            .with_data_types(self.data_types.iter().cloned())
            .with_priority(self.priority);
        rule.description = self.description.clone();
        rule.enabled = self.enabled;
        rule
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuiltinCatalogue {
    #[serde(default)]
    pub rules: BTreeMap<String, CatalogueEntry>,
}

impl BuiltinCatalogue {
    /// The catalogue shipped with the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_toml(BUNDLED)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: toml::Value = toml::from_str(toml_str)
            .map_err(|e| TiermarkError::Config(format!("Failed to parse TOML: {}", e)))?;

        let mut rules = BTreeMap::new();

        if let Some(rules_table) = config.get("rules").and_then(|v| v.as_table()) {
            for (name, rule_value) in rules_table {
                let mut entry: CatalogueEntry = rule_value
                    .clone()
                    .try_into()
                    .map_err(|e| TiermarkError::Config(format!("Failed to parse rule '{}': {}", name, e)))?;
                entry.name = name.clone();
                rules.insert(name.clone(), entry);
            }
        }

        let catalogue = BuiltinCatalogue { rules };
        catalogue.validate()?;
        Ok(catalogue)
    }

    /// Every entry must carry a pattern that can match something.
    pub fn validate(&self) -> Result<()> {
        for entry in self.rules.values() {
            validate_pattern(&entry.pattern).map_err(|e| {
                TiermarkError::Config(format!("Built-in rule '{}' is invalid: {}", entry.name, e))
            })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn to_rules(&self) -> Vec<ClassificationRule> {
        self.rules.values().map(CatalogueEntry::to_rule).collect()
    }
}

/// Inserts catalogue entries whose name is not yet stored as a built-in.
/// Existing built-ins are left alone so operator edits survive reseeding.
/// Returns the number of rules inserted.
pub fn seed_builtin_rules<D>(db: &mut D, catalogue: &BuiltinCatalogue) -> Result<usize>
where
    D: RulesDatabase + AuditDatabase,
{
    let existing: BTreeSet<String> = db.list_builtin_rules()?.into_iter().map(|rule| rule.name).collect();

    let mut inserted = 0;
    for entry in catalogue.rules.values() {
        if existing.contains(&entry.name) {
            continue;
        }

        let rule_id = db.create_rule(&entry.to_rule())?;
        inserted += 1;

        let mut audit = AuditLogEntry::new("builtin_rule_seeded");
        audit.rule_id = Some(rule_id);
        audit.details = Some(format!("{} {} {}", entry.name, entry.pattern, entry.level));
        if let Err(e) = db.log_audit(&audit) {
            log::warn!("Failed to write audit entry '{}': {}", audit.action, e);
        }
    }

    if inserted > 0 {
        log::info!("Seeded {} built-in classification rule(s)", inserted);
    }

    Ok(inserted)
}
