mod cli;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut engine = cli::init_engine(cli.db, cli.config)?;

    match cli.command {
        cli::Commands::Rules { action } => cli::rules::handle_rules_command(&mut engine, action, cli.verbose)?,

        cli::Commands::Resolve { org, paths } => {
            cli::resolve::handle_resolve_command(&engine, org, &paths, cli.verbose)?
        }

        cli::Commands::Schedule { action } => {
            cli::schedule::handle_schedule_command(&mut engine, action, cli.verbose)?
        }

        cli::Commands::Backup { action } => cli::backup::handle_backup_command(&mut engine, action, cli.verbose)?,

        cli::Commands::Report { org, json } => cli::report::handle_report_command(&engine, org, json)?,

        cli::Commands::Audit { org, action, limit } => {
            cli::report::handle_audit_command(&engine, org, action.as_deref(), limit)?
        }
    }

    Ok(())
}
