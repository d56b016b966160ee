//! Path classification: levels, glob matching, rule resolution and the
//! schedule-wide fold over many paths.

pub mod catalogue;
pub mod level;
pub mod pattern;
pub mod resolver;
pub mod schedule;

pub use catalogue::{seed_builtin_rules, BuiltinCatalogue, CatalogueEntry};
pub use level::ClassificationLevel;
pub use pattern::{matches, validate_pattern, MatchOptions, PathPattern};
pub use resolver::{compare_rank, Resolution, RuleSet};
pub use schedule::{classify_paths, partition_paths, PathSetClassification};
