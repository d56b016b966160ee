use console::{style, StyledObject};
use tiermark_lib::{ClassificationLevel, ClassificationStatus, DataTypes};

pub fn styled_level(level: ClassificationLevel) -> StyledObject<&'static str> {
    let text = style(level.as_str());
    match level {
        ClassificationLevel::Public => text.green(),
        ClassificationLevel::Internal => text.cyan(),
        ClassificationLevel::Confidential => text.yellow(),
        ClassificationLevel::Restricted => text.red().bold(),
    }
}

/// An unavailable classification is shown as such, never as its stored
/// `public` placeholder.
pub fn styled_classification(level: ClassificationLevel, status: ClassificationStatus) -> String {
    match status {
        ClassificationStatus::Unavailable => style("unavailable").red().reverse().to_string(),
        ClassificationStatus::Default => format!("{} {}", styled_level(level), style("(default)").dim()),
        ClassificationStatus::Resolved => styled_level(level).to_string(),
    }
}

pub fn format_tags(tags: &DataTypes) -> String {
    if tags.is_empty() {
        "-".to_string()
    } else {
        tags.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub fn collect_tags(tags: Vec<String>) -> DataTypes {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
