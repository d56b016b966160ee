use crate::cli::helpers::{collect_tags, format_tags, styled_classification};
use crate::cli::Engine;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use tiermark_lib::{
    ClassificationLevel, RecomputeMode, Result, Schedule, ScheduleClassification, SchedulesDatabase, TiermarkError,
};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum ScheduleCommands {
    #[command(about = "Register a backup schedule and classify it")]
    Add {
        #[arg(help = "Schedule name")]
        name: String,

        #[arg(long, help = "Organization ID")]
        org: Uuid,

        #[arg(long = "include", required = true, help = "Path the schedule backs up")]
        include: Vec<String>,

        #[arg(long = "exclude", help = "Glob excluding include paths")]
        exclude: Vec<String>,
    },

    #[command(about = "Replace a schedule's paths and reclassify it")]
    Paths {
        #[arg(help = "Schedule ID")]
        id: Uuid,

        #[arg(long = "include", help = "Path the schedule backs up")]
        include: Vec<String>,

        #[arg(long = "exclude", help = "Glob excluding include paths")]
        exclude: Vec<String>,
    },

    #[command(about = "Recompute classifications")]
    Classify {
        #[arg(help = "Schedule ID", required_unless_present = "org")]
        id: Option<Uuid>,

        #[arg(long, conflicts_with = "id", help = "Recompute every schedule of this organization")]
        org: Option<Uuid>,

        #[arg(long, help = "Discard manual overrides")]
        reset: bool,
    },

    #[command(about = "Set a manual classification")]
    Override {
        #[arg(help = "Schedule ID")]
        id: Uuid,

        #[arg(long, help = "public, internal, confidential or restricted")]
        level: String,

        #[arg(long = "data-type", value_delimiter = ',', help = "Data-type tags")]
        data_types: Vec<String>,
    },

    #[command(about = "Show a schedule and its classification")]
    Show {
        #[arg(help = "Schedule ID")]
        id: Uuid,
    },

    #[command(about = "List an organization's schedules")]
    List {
        #[arg(long, help = "Organization ID")]
        org: Uuid,
    },
}

pub fn handle_schedule_command(engine: &mut Engine, action: ScheduleCommands, verbose: bool) -> Result<()> {
    match action {
        ScheduleCommands::Add {
            name,
            org,
            include,
            exclude,
        } => {
            let schedule = Schedule::new(org, &name, include, exclude);
            engine.db_mut().add_schedule(&schedule)?;
            let classification = engine.classify_schedule(&schedule, RecomputeMode::PreserveOverride)?;

            println!(
                "{} Schedule '{}' added (ID: {})",
                style("✓").green(),
                style(&schedule.name).bold(),
                schedule.id
            );
            print_classification(&classification);
            Ok(())
        }
        ScheduleCommands::Paths { id, include, exclude } => {
            let classification = engine.update_schedule_paths(id, &include, &exclude)?;
            println!("{} Schedule {} paths updated", style("✓").green(), id);
            print_classification(&classification);
            Ok(())
        }
        ScheduleCommands::Classify { id, org, reset } => {
            let mode = if reset {
                RecomputeMode::Reset
            } else {
                RecomputeMode::PreserveOverride
            };

            match (id, org) {
                (Some(id), _) => {
                    let schedule = engine.db().get_schedule(id)?.ok_or(TiermarkError::ScheduleNotFound(id))?;
                    let classification = engine.classify_schedule(&schedule, mode)?;
                    print_classification(&classification);
                }
                (None, Some(org)) => {
                    let classifications = engine.recompute_org(org, mode)?;
                    println!(
                        "{} {} schedule(s) recomputed",
                        style("✓").green(),
                        classifications.len()
                    );
                    if verbose {
                        for classification in &classifications {
                            print_classification(classification);
                        }
                    }
                }
                (None, None) => {
                    return Err(TiermarkError::Config("Pass a schedule ID or --org".to_string()));
                }
            }
            Ok(())
        }
        ScheduleCommands::Override { id, level, data_types } => {
            let level = ClassificationLevel::from_str(&level)?;
            let classification = engine.set_manual_classification(id, level, collect_tags(data_types))?;
            println!("{} Manual classification stored", style("✓").green());
            print_classification(&classification);
            Ok(())
        }
        ScheduleCommands::Show { id } => show_schedule(engine, id),
        ScheduleCommands::List { org } => list_schedules(engine, org),
    }
}

fn print_classification(classification: &ScheduleClassification) {
    println!(
        "  {} {}  tags: {}{}",
        style(classification.schedule_id).dim(),
        styled_classification(classification.level, classification.status),
        format_tags(&classification.data_types),
        if classification.auto_classified {
            String::new()
        } else {
            format!("  {}", style("(manual)").magenta())
        }
    );
}

fn show_schedule(engine: &Engine, id: Uuid) -> Result<()> {
    let schedule = engine.db().get_schedule(id)?.ok_or(TiermarkError::ScheduleNotFound(id))?;

    println!("\n{}", style(format!("Schedule: {}", schedule.name)).bold().cyan());
    println!("{}", style("─".repeat(80)).dim());
    println!("  ID: {}", schedule.id);
    println!("  Organization: {}", schedule.org_id);
    println!("  Created: {}", schedule.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Include:");
    for path in &schedule.include_paths {
        println!("    {}", path);
    }
    if !schedule.exclude_paths.is_empty() {
        println!("  Exclude:");
        for pattern in &schedule.exclude_paths {
            println!("    {}", pattern);
        }
    }

    match engine.db().get_schedule_classification(id)? {
        Some(classification) => {
            println!();
            println!("  Level: {}", styled_classification(classification.level, classification.status));
            println!("  Data types: {}", format_tags(&classification.data_types));
            println!(
                "  Source: {}",
                if classification.auto_classified { "automatic" } else { "manual override" }
            );
            println!("  Classified: {}", classification.classified_at.format("%Y-%m-%d %H:%M:%S"));
        }
        None => println!("\n  {}", style("Not classified yet").yellow()),
    }

    Ok(())
}

fn list_schedules(engine: &Engine, org: Uuid) -> Result<()> {
    let schedules = engine.db().list_schedules_by_org(org)?;

    if schedules.is_empty() {
        println!("{}", style("No schedules registered").yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Paths").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Data Types").fg(Color::Cyan),
        Cell::new("Manual").fg(Color::Cyan),
    ]);

    for schedule in &schedules {
        let classification = engine.db().get_schedule_classification(schedule.id)?;
        let (level, tags, manual) = match &classification {
            Some(c) => (
                styled_classification(c.level, c.status),
                format_tags(&c.data_types),
                if c.auto_classified { "" } else { "yes" },
            ),
            None => (style("unclassified").dim().to_string(), "-".to_string(), ""),
        };

        table.add_row(vec![
            Cell::new(schedule.id),
            Cell::new(&schedule.name),
            Cell::new(schedule.include_paths.len()),
            Cell::new(level),
            Cell::new(tags),
            Cell::new(manual),
        ]);
    }

    println!("{}", table);
    Ok(())
}
