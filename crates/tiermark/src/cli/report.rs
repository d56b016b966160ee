use crate::cli::helpers::styled_level;
use crate::cli::Engine;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use std::collections::BTreeMap;
use tiermark_lib::{AuditDatabase, ClassificationLevel, ClassificationSummary, Result};
use uuid::Uuid;

pub fn handle_report_command(engine: &Engine, org: Uuid, json: bool) -> Result<()> {
    let summary = engine.summarize(org)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n{}", style(format!("Classification Report: {}", org)).bold().cyan());
    println!("{}\n", style("═".repeat(80)).dim());

    print_level_table(&summary);

    print_tag_table("Schedule Data Types", &summary.schedules_by_data_type);
    print_tag_table("Backup Data Types", &summary.backups_by_data_type);

    if summary.manual_overrides > 0 {
        println!("  Manual overrides: {}", style(summary.manual_overrides).magenta());
    }
    if summary.unavailable_backups > 0 {
        println!(
            "  {} backup(s) could not be classified and are reported as {}",
            style(summary.unavailable_backups).red().bold(),
            style("unavailable").red().reverse()
        );
    }
    println!();

    Ok(())
}

fn print_level_table(summary: &ClassificationSummary) {
    println!("{}", style("Levels").bold());
    println!("{}", style("─".repeat(80)).dim());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Schedules").fg(Color::Cyan),
        Cell::new("Backups").fg(Color::Cyan),
    ]);

    for level in ClassificationLevel::ALL.iter().rev() {
        let mut backups = summary.backups_at(*level);
        if *level == ClassificationLevel::Public {
            backups -= summary.unavailable_backups.min(backups);
        }
        table.add_row(vec![
            Cell::new(styled_level(*level)),
            Cell::new(summary.schedules_at(*level)),
            Cell::new(backups),
        ]);
    }
    table.add_row(vec![
        Cell::new(style("unavailable").red().reverse()),
        Cell::new("-"),
        Cell::new(summary.unavailable_backups),
    ]);
    table.add_row(vec![
        Cell::new(style("total").bold()),
        Cell::new(summary.total_schedules),
        Cell::new(summary.total_backups),
    ]);

    println!("{}\n", table);
}

fn print_tag_table(title: &str, counts: &BTreeMap<String, u64>) {
    println!("{}", style(title).bold());
    println!("{}", style("─".repeat(80)).dim());

    if counts.is_empty() {
        println!("{}\n", style("No tagged data").yellow());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![Cell::new("Data Type").fg(Color::Cyan), Cell::new("Count").fg(Color::Cyan)]);
    for (tag, count) in counts {
        table.add_row(vec![Cell::new(tag), Cell::new(count)]);
    }

    println!("{}\n", table);
}

pub fn handle_audit_command(engine: &Engine, org: Option<Uuid>, action: Option<&str>, limit: i32) -> Result<()> {
    let entries = engine.db().get_audit_entries(org, action, Some(limit))?;

    if entries.is_empty() {
        println!("{}", style("No audit entries").yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Time").fg(Color::Cyan),
        Cell::new("Action").fg(Color::Cyan),
        Cell::new("Schedule").fg(Color::Cyan),
        Cell::new("Backup").fg(Color::Cyan),
        Cell::new("Rule").fg(Color::Cyan),
        Cell::new("Details").fg(Color::Cyan),
    ]);

    let dash = || "-".to_string();
    for entry in &entries {
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&entry.action),
            Cell::new(entry.schedule_id.map(|id| id.to_string()).unwrap_or_else(dash)),
            Cell::new(entry.backup_id.map(|id| id.to_string()).unwrap_or_else(dash)),
            Cell::new(entry.rule_id.map(|id| id.to_string()).unwrap_or_else(dash)),
            Cell::new(entry.details.as_deref().unwrap_or("")),
        ]);
    }

    println!("{}", table);
    Ok(())
}
