use crate::cli::helpers::{format_tags, styled_classification};
use crate::cli::Engine;
use chrono::Utc;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use tiermark_lib::{Backup, BackupsDatabase, ClassificationLevel, Result, SchedulesDatabase, TiermarkError};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum BackupCommands {
    #[command(about = "Record a backup run and snapshot its classification")]
    Record {
        #[arg(long, help = "Schedule ID")]
        schedule: Uuid,

        #[arg(long, help = "Backup ID (generated when omitted)")]
        id: Option<Uuid>,

        #[arg(long = "path", help = "Path actually backed up; triggers a rescan")]
        paths: Vec<String>,
    },

    #[command(about = "Show a backup's classification")]
    Show {
        #[arg(help = "Backup ID")]
        id: Uuid,
    },

    #[command(about = "List an organization's backups")]
    List {
        #[arg(long, help = "Organization ID")]
        org: Uuid,

        #[arg(long, help = "Only backups at this level")]
        level: Option<String>,

        #[arg(long, help = "Maximum number of backups")]
        limit: Option<u32>,
    },
}

pub fn handle_backup_command(engine: &mut Engine, action: BackupCommands, verbose: bool) -> Result<()> {
    match action {
        BackupCommands::Record { schedule, id, paths } => record_backup(engine, schedule, id, paths, verbose),
        BackupCommands::Show { id } => show_backup(engine, id),
        BackupCommands::List { org, level, limit } => {
            let level = level.as_deref().map(ClassificationLevel::from_str).transpose()?;
            list_backups(engine, org, level, limit)
        }
    }
}

fn record_backup(
    engine: &mut Engine,
    schedule_id: Uuid,
    backup_id: Option<Uuid>,
    paths: Vec<String>,
    verbose: bool,
) -> Result<()> {
    let schedule = engine
        .db()
        .get_schedule(schedule_id)?
        .ok_or(TiermarkError::ScheduleNotFound(schedule_id))?;

    let backup_id = backup_id.unwrap_or_else(Uuid::new_v4);
    match engine.db().get_backup(backup_id)? {
        Some(backup) if backup.schedule_id != schedule_id => {
            return Err(TiermarkError::ScheduleMismatch {
                backup_id,
                recorded: backup.schedule_id,
                requested: schedule_id,
            });
        }
        Some(_) => {}
        None => engine.db_mut().add_backup(&Backup {
            id: backup_id,
            org_id: schedule.org_id,
            schedule_id,
            started_at: Utc::now(),
            completed_at: None,
        })?,
    }

    let effective = if paths.is_empty() { None } else { Some(paths.as_slice()) };
    let snapshot = engine.snapshot_backup_classification(backup_id, &schedule, effective)?;
    engine.db_mut().complete_backup(backup_id, Utc::now())?;

    println!(
        "{} Backup {} recorded: {}",
        style("✓").green(),
        backup_id,
        styled_classification(snapshot.level, snapshot.status)
    );
    if verbose {
        println!("  Source: {}", snapshot.source.as_str());
        println!("  Data types: {}", format_tags(&snapshot.data_types));
        println!("  Paths: {}", snapshot.paths.len());
    }

    Ok(())
}

fn show_backup(engine: &Engine, id: Uuid) -> Result<()> {
    let classification = engine
        .db()
        .get_backup_classification(id)?
        .ok_or(TiermarkError::BackupNotFound(id))?;

    println!("\n{}", style(format!("Backup: {}", id)).bold().cyan());
    println!("{}", style("─".repeat(80)).dim());
    println!("  Schedule: {}", classification.schedule_id);
    println!("  Organization: {}", classification.org_id);
    println!("  Level: {}", styled_classification(classification.level, classification.status));
    println!("  Data types: {}", format_tags(&classification.data_types));
    println!("  Source: {}", classification.source.as_str());
    println!("  Classified: {}", classification.classified_at.format("%Y-%m-%d %H:%M:%S"));
    if !classification.paths.is_empty() {
        println!("  Paths:");
        for path in &classification.paths {
            println!("    {}", path);
        }
    }

    Ok(())
}

fn list_backups(engine: &Engine, org: Uuid, level: Option<ClassificationLevel>, limit: Option<u32>) -> Result<()> {
    let backups = match level {
        Some(level) => engine.db().list_backups_by_org_and_level(org, level, limit)?,
        None => {
            let mut backups = engine.db().list_backups_by_org(org)?;
            if let Some(limit) = limit {
                backups.truncate(limit as usize);
            }
            backups
        }
    };

    if backups.is_empty() {
        println!("{}", style("No backups recorded").yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Backup").fg(Color::Cyan),
        Cell::new("Schedule").fg(Color::Cyan),
        Cell::new("Started").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Data Types").fg(Color::Cyan),
    ]);

    for backup in &backups {
        let classification = engine.db().get_backup_classification(backup.id)?;
        let (level, tags) = match &classification {
            Some(c) => (styled_classification(c.level, c.status), format_tags(&c.data_types)),
            None => (style("unclassified").dim().to_string(), "-".to_string()),
        };

        table.add_row(vec![
            Cell::new(backup.id),
            Cell::new(backup.schedule_id),
            Cell::new(backup.started_at.format("%Y-%m-%d %H:%M")),
            Cell::new(level),
            Cell::new(tags),
        ]);
    }

    println!("{}", table);
    Ok(())
}
