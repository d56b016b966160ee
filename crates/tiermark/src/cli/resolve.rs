use crate::cli::helpers::{format_tags, styled_level};
use crate::cli::Engine;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use tiermark_lib::Result;
use uuid::Uuid;

pub fn handle_resolve_command(engine: &Engine, org: Uuid, paths: &[String], verbose: bool) -> Result<()> {
    let rules = engine.rule_set(org)?;
    if verbose {
        println!("{} {} active rule(s) for {}", style(">>>").cyan(), rules.len(), org);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Data Types").fg(Color::Cyan),
        Cell::new("Rule").fg(Color::Cyan),
        Cell::new("Matched").fg(Color::Cyan),
    ]);

    for path in paths {
        let resolution = rules.resolve(path);
        let level = if resolution.is_default() {
            format!("{} {}", styled_level(resolution.level), style("(default)").dim())
        } else {
            styled_level(resolution.level).to_string()
        };

        table.add_row(vec![
            Cell::new(path),
            Cell::new(level),
            Cell::new(format_tags(&resolution.data_types)),
            Cell::new(
                resolution
                    .winning_rule
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(resolution.matched_rules.len()),
        ]);
    }

    println!("{}", table);
    Ok(())
}
