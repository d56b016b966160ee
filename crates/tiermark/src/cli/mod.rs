pub mod backup;
pub mod report;
pub mod resolve;
pub mod rules;
pub mod schedule;
mod helpers;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tiermark_lib::{ClassificationEngine, Config, Database, Result, SqliteDatabase};
use uuid::Uuid;

pub type Engine = ClassificationEngine<SqliteDatabase>;

#[derive(Parser)]
#[command(name = "tiermark")]
#[command(about = "Sensitivity classification for backup schedules and backups", long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to database file")]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, help = "Path to tiermark.toml")]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Manage classification rules")]
    Rules {
        #[command(subcommand)]
        action: rules::RulesCommands,
    },

    #[command(about = "Resolve paths against an organization's rules")]
    Resolve {
        #[arg(long, help = "Organization ID")]
        org: Uuid,

        #[arg(required = true, help = "Paths to resolve")]
        paths: Vec<String>,
    },

    #[command(about = "Manage backup schedules and their classification")]
    Schedule {
        #[command(subcommand)]
        action: schedule::ScheduleCommands,
    },

    #[command(about = "Record and inspect backup classifications")]
    Backup {
        #[command(subcommand)]
        action: backup::BackupCommands,
    },

    #[command(about = "Summarize an organization's classifications")]
    Report {
        #[arg(long, help = "Organization ID")]
        org: Uuid,

        #[arg(long, help = "Print JSON instead of tables")]
        json: bool,
    },

    #[command(about = "Show the audit trail")]
    Audit {
        #[arg(long, help = "Only entries for this organization")]
        org: Option<Uuid>,

        #[arg(long, help = "Only entries with this action")]
        action: Option<String>,

        #[arg(long, default_value_t = 50, help = "Maximum number of entries")]
        limit: i32,
    },
}

/// Opens the database, seeds the built-in catalogue when enabled and
/// returns an engine configured from `tiermark.toml`.
pub fn init_engine(db_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Engine> {
    let config = Config::new(db_path, config_path)?;
    config.ensure_db_directory()?;
    log::debug!("Using database {}", config.db_path.display());

    let mut db = SqliteDatabase::open(&config.db_path)?;
    db.initialize()?;

    let mut engine = ClassificationEngine::with_options(db, config.settings.match_options());
    if config.settings.seed_builtin_rules {
        let catalogue = config.settings.catalogue()?;
        engine.seed_builtins(&catalogue)?;
    }

    Ok(engine)
}
