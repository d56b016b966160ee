use crate::classify::level::ClassificationLevel;
use crate::classify::pattern::{MatchOptions, PathPattern};
use crate::classify::resolver::RuleSet;
use crate::db::{ClassificationStatus, DataTypes};
use serde::{Deserialize, Serialize};

/// Combined classification of a set of paths.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathSetClassification {
    /// Most severe level among the eligible paths.
    pub level: ClassificationLevel,
    pub data_types: DataTypes,
    pub status: ClassificationStatus,
    pub eligible_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
}

/// Splits include paths into those that survive the exclude patterns and
/// those that do not. Blank and repeated paths are dropped.
pub fn partition_paths(
    include_paths: &[String],
    exclude_patterns: &[String],
    options: MatchOptions,
) -> (Vec<String>, Vec<String>) {
    let excludes: Vec<PathPattern> = exclude_patterns
        .iter()
        .filter_map(|pattern| match PathPattern::compile(pattern, options) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                log::warn!("Ignoring exclude pattern: {}", e);
                None
            }
        })
        .collect();

    let mut eligible: Vec<String> = Vec::new();
    let mut excluded: Vec<String> = Vec::new();

    for path in include_paths {
        let path = path.trim();
        if path.is_empty() || eligible.iter().chain(excluded.iter()).any(|seen| seen == path) {
            continue;
        }
        if excludes.iter().any(|pattern| pattern.is_match(path)) {
            excluded.push(path.to_string());
        } else {
            eligible.push(path.to_string());
        }
    }

    (eligible, excluded)
}

/// Resolves every eligible path and folds the results: the most sensitive
/// path sets the level, tags are unioned across paths.
pub fn classify_paths(
    rules: &RuleSet,
    include_paths: &[String],
    exclude_patterns: &[String],
) -> PathSetClassification {
    let (eligible_paths, excluded_paths) = partition_paths(include_paths, exclude_patterns, rules.options());

    let mut result = PathSetClassification {
        eligible_paths,
        excluded_paths,
        ..PathSetClassification::default()
    };

    for path in &result.eligible_paths {
        let resolution = rules.resolve(path);
        if resolution.is_default() {
            continue;
        }
        result.status = ClassificationStatus::Resolved;
        result.level = result.level.max(resolution.level);
        result.data_types.extend(resolution.data_types);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ClassificationRule;
    use uuid::Uuid;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pii_and_logs(org: Uuid) -> RuleSet {
        let mut pii = ClassificationRule::custom(org, "pii", "/data/pii/*", ClassificationLevel::Confidential)
            .with_data_types(["pii", "gdpr"]);
        pii.id = 1;
        let mut logs = ClassificationRule::custom(org, "logs", "/data/logs/*", ClassificationLevel::Public)
            .with_data_types(["logs"]);
        logs.id = 2;
        RuleSet::for_org(org, vec![pii, logs], MatchOptions::default())
    }

    #[test]
    fn test_most_sensitive_path_wins() {
        let org = Uuid::new_v4();
        let rules = pii_and_logs(org);

        let result = classify_paths(
            &rules,
            &paths(&["/data/pii/customers.csv", "/data/logs/app.log", "/data/logs/tmp/x.log"]),
            &paths(&["/data/logs/tmp/*"]),
        );

        assert_eq!(result.level, ClassificationLevel::Confidential);
        assert!(result.data_types.contains("pii"));
        assert!(result.data_types.contains("gdpr"));
        assert!(result.data_types.contains("logs"));
        assert_eq!(result.excluded_paths, paths(&["/data/logs/tmp/x.log"]));
        assert_eq!(result.status, ClassificationStatus::Resolved);
    }

    #[test]
    fn test_excluded_paths_contribute_nothing() {
        let org = Uuid::new_v4();
        let rules = pii_and_logs(org);

        let result = classify_paths(
            &rules,
            &paths(&["/data/pii/customers.csv", "/data/logs/app.log"]),
            &paths(&["/data/pii/*"]),
        );

        assert_eq!(result.level, ClassificationLevel::Public);
        assert!(!result.data_types.contains("pii"));
        assert_eq!(result.eligible_paths, paths(&["/data/logs/app.log"]));
    }

    #[test]
    fn test_zero_eligible_paths_is_default() {
        let org = Uuid::new_v4();
        let rules = pii_and_logs(org);

        let empty = classify_paths(&rules, &[], &[]);
        assert_eq!(empty.level, ClassificationLevel::Public);
        assert!(empty.data_types.is_empty());
        assert_eq!(empty.status, ClassificationStatus::Default);

        let all_excluded = classify_paths(&rules, &paths(&["/data/pii/a"]), &paths(&["**"]));
        assert_eq!(all_excluded.level, ClassificationLevel::Public);
        assert!(all_excluded.data_types.is_empty());
        assert!(all_excluded.eligible_paths.is_empty());
    }

    #[test]
    fn test_partition_drops_blank_and_duplicate_paths() {
        let (eligible, excluded) = partition_paths(
            &paths(&["/a", " ", "/a", "/b/tmp/x", "/b/tmp/x"]),
            &paths(&["/b/tmp/*", "[broken"]),
            MatchOptions::default(),
        );
        assert_eq!(eligible, paths(&["/a"]));
        assert_eq!(excluded, paths(&["/b/tmp/x"]));
    }
}
