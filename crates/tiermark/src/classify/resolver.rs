//! Resolution of overlapping rules into one `(level, data-types)` pair.
//!
//! The level comes from the single top-ranked matching rule. The data-type
//! set is the union over every matching rule, winner or not.

use crate::classify::level::ClassificationLevel;
use crate::classify::pattern::{MatchOptions, PathPattern};
use crate::db::{ClassificationRule, ClassificationStatus, DataTypes};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Outcome of resolving a single path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub level: ClassificationLevel,
    pub data_types: DataTypes,
    /// Rule that set the level, `None` when nothing matched.
    pub winning_rule: Option<i64>,
    /// Every matching rule in rank order.
    pub matched_rules: Vec<i64>,
}

impl Resolution {
    pub fn is_default(&self) -> bool {
        self.winning_rule.is_none()
    }

    pub fn status(&self) -> ClassificationStatus {
        if self.is_default() {
            ClassificationStatus::Default
        } else {
            ClassificationStatus::Resolved
        }
    }
}

/// Ranks `a` before `b` when it should win the level: priority desc,
/// severity desc, custom before built-in, earliest created, lowest id.
pub fn compare_rank(a: &ClassificationRule, b: &ClassificationRule) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.level.cmp(&a.level))
        .then_with(|| a.is_builtin.cmp(&b.is_builtin))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: ClassificationRule,
    pattern: Option<PathPattern>,
}

/// The enabled rules visible to one organization, compiled once and reused
/// for every path of a resolution pass.
#[derive(Debug, Clone)]
pub struct RuleSet {
    org_id: Uuid,
    options: MatchOptions,
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn for_org(org_id: Uuid, rules: Vec<ClassificationRule>, options: MatchOptions) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if !rule.enabled {
                continue;
            }
            if !rule.is_visible_to(org_id) {
                log::error!(
                    "Rule {} belongs to organization {:?}, not {}; ignoring it",
                    rule.id,
                    rule.org_id,
                    org_id
                );
                continue;
            }

            let pattern = match PathPattern::compile(&rule.pattern, options) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Rule {} ({}) will never match: {}", rule.id, rule.name, e);
                    None
                }
            };
            compiled.push(CompiledRule { rule, pattern });
        }

        compiled.sort_by(|a, b| compare_rank(&a.rule, &b.rule));

        Self {
            org_id,
            options,
            rules: compiled,
        }
    }

    pub fn org_id(&self) -> Uuid {
        self.org_id
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Matching rules, best-ranked first.
    pub fn matching(&self, path: &str) -> Vec<&ClassificationRule> {
        self.rules
            .iter()
            .filter(|c| c.pattern.as_ref().is_some_and(|p| p.is_match(path)))
            .map(|c| &c.rule)
            .collect()
    }

    pub fn resolve(&self, path: &str) -> Resolution {
        if path.is_empty() {
            return Resolution::default();
        }

        let matches = self.matching(path);
        let Some(winner) = matches.first() else {
            log::debug!("No rule matches {}", path);
            return Resolution::default();
        };

        let data_types = matches
            .iter()
            .flat_map(|rule| rule.data_types.iter().cloned())
            .collect();

        log::debug!(
            "{} resolved to {} by rule {} ({} match(es))",
            path,
            winner.level,
            winner.id,
            matches.len()
        );

        Resolution {
            level: winner.level,
            data_types,
            winning_rule: Some(winner.id),
            matched_rules: matches.iter().map(|rule| rule.id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn rule(id: i64, org: Uuid, pattern: &str, level: ClassificationLevel, priority: i32) -> ClassificationRule {
        let mut rule = ClassificationRule::custom(org, &format!("rule-{}", id), pattern, level).with_priority(priority);
        rule.id = id;
        rule
    }

    fn builtin(id: i64, pattern: &str, level: ClassificationLevel, priority: i32) -> ClassificationRule {
        let mut rule = ClassificationRule::builtin(&format!("builtin-{}", id), pattern, level).with_priority(priority);
        rule.id = id;
        rule
    }

    fn set(org: Uuid, rules: Vec<ClassificationRule>) -> RuleSet {
        RuleSet::for_org(org, rules, MatchOptions::default())
    }

    #[test]
    fn test_no_match_is_default() {
        let org = Uuid::new_v4();
        let rules = set(org, vec![rule(1, org, "/hr/**", ClassificationLevel::Restricted, 10)]);

        let resolution = rules.resolve("/srv/www/index.html");
        assert_eq!(resolution.level, ClassificationLevel::Public);
        assert!(resolution.data_types.is_empty());
        assert!(resolution.is_default());
        assert_eq!(resolution.status(), ClassificationStatus::Default);
    }

    #[test]
    fn test_empty_path_is_default() {
        let org = Uuid::new_v4();
        let rules = set(org, vec![builtin(1, "**", ClassificationLevel::Internal, 0)]);
        assert_eq!(rules.resolve(""), Resolution::default());
    }

    #[test]
    fn test_priority_beats_severity() {
        let org = Uuid::new_v4();
        let rules = set(
            org,
            vec![
                rule(1, org, "/data/**", ClassificationLevel::Restricted, 1),
                rule(2, org, "/data/public/**", ClassificationLevel::Public, 50),
            ],
        );

        let resolution = rules.resolve("/data/public/brochure.pdf");
        assert_eq!(resolution.level, ClassificationLevel::Public);
        assert_eq!(resolution.winning_rule, Some(2));
        assert_eq!(resolution.matched_rules, vec![2, 1]);
    }

    #[test]
    fn test_severity_breaks_priority_tie() {
        let org = Uuid::new_v4();
        let rules = set(
            org,
            vec![
                rule(1, org, "/data/**", ClassificationLevel::Internal, 10),
                rule(2, org, "/data/*/q3.xlsx", ClassificationLevel::Confidential, 10),
            ],
        );

        assert_eq!(rules.resolve("/data/finance/q3.xlsx").level, ClassificationLevel::Confidential);
    }

    #[test]
    fn test_custom_beats_builtin_on_full_tie() {
        let org = Uuid::new_v4();
        let mut custom = rule(2, org, "/data/**", ClassificationLevel::Internal, 10);
        let mut shipped = builtin(1, "**/*.csv", ClassificationLevel::Internal, 10);
        // Built-in is older, so only the custom-first step can pick the custom rule.
        shipped.created_at = Utc::now() - Duration::days(30);
        custom.created_at = Utc::now();
        custom.data_types.insert("custom".to_string());

        let rules = set(org, vec![shipped, custom]);
        assert_eq!(rules.resolve("/data/x.csv").winning_rule, Some(2));
    }

    #[test]
    fn test_earliest_created_breaks_remaining_tie() {
        let org = Uuid::new_v4();
        let mut newer = rule(1, org, "/a/**", ClassificationLevel::Internal, 0);
        let mut older = rule(2, org, "/a/*", ClassificationLevel::Internal, 0);
        newer.created_at = Utc::now();
        older.created_at = newer.created_at - Duration::seconds(1);

        let rules = set(org, vec![newer, older]);
        assert_eq!(rules.resolve("/a/b").winning_rule, Some(2));
    }

    #[test]
    fn test_lower_priority_rule_still_contributes_tags() {
        let org = Uuid::new_v4();
        let winner = rule(1, org, "/crm/**", ClassificationLevel::Confidential, 100).with_data_types(["pii"]);
        let loser = rule(2, org, "**/*.csv", ClassificationLevel::Restricted, 1).with_data_types(["financial"]);

        let rules = set(org, vec![winner, loser]);
        let resolution = rules.resolve("/crm/exports/contacts.csv");

        assert_eq!(resolution.level, ClassificationLevel::Confidential);
        assert_eq!(resolution.winning_rule, Some(1));
        insta::assert_debug_snapshot!(resolution.data_types, @r###"
        {
            "financial",
            "pii",
        }
        "###);
    }

    #[test]
    fn test_disabled_rules_are_ignored() {
        let org = Uuid::new_v4();
        let mut disabled = builtin(1, "**", ClassificationLevel::Restricted, 100).with_data_types(["secret"]);
        disabled.enabled = false;
        let active = rule(2, org, "/data/**", ClassificationLevel::Internal, 0).with_data_types(["ops"]);

        let rules = set(org, vec![disabled, active]);
        assert_eq!(rules.len(), 1);

        let resolution = rules.resolve("/data/runbook.md");
        assert_eq!(resolution.level, ClassificationLevel::Internal);
        assert!(!resolution.data_types.contains("secret"));
    }

    #[test]
    fn test_foreign_custom_rules_never_apply() {
        let org = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let theirs = rule(1, stranger, "**", ClassificationLevel::Restricted, 100).with_data_types(["theirs"]);
        let ours = rule(2, org, "**", ClassificationLevel::Restricted, 100).with_data_types(["ours"]);

        let rules = set(org, vec![theirs, ours]);
        let resolution = rules.resolve("/x");

        assert_eq!(resolution.matched_rules, vec![2]);
        assert!(!resolution.data_types.contains("theirs"));
    }

    #[test]
    fn test_malformed_pattern_contributes_nothing() {
        let org = Uuid::new_v4();
        let broken = rule(1, org, "/data/[oops", ClassificationLevel::Restricted, 100).with_data_types(["broken"]);

        let rules = set(org, vec![broken]);
        assert!(rules.resolve("/data/[oops").is_default());
    }
}
