use crate::cli::helpers::{collect_tags, format_tags, styled_level};
use crate::cli::Engine;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use console::style;
use std::path::PathBuf;
use tiermark_lib::{
    BuiltinCatalogue, ClassificationLevel, ClassificationRule, Result, RulesDatabase,
    TiermarkError,
};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum RulesCommands {
    #[command(about = "List rules visible to an organization")]
    List {
        #[arg(long, help = "Organization ID (omit to list built-ins only)")]
        org: Option<Uuid>,
    },

    #[command(about = "Add a rule")]
    Add {
        #[arg(help = "Rule name")]
        name: String,

        #[arg(help = "Glob pattern, e.g. /data/pii/**")]
        pattern: String,

        #[arg(long, help = "public, internal, confidential or restricted")]
        level: String,

        #[arg(long, help = "Owning organization (required unless --builtin)")]
        org: Option<Uuid>,

        #[arg(long, help = "Add a built-in rule shared by all organizations")]
        builtin: bool,

        #[arg(long = "data-type", value_delimiter = ',', help = "Data-type tags")]
        data_types: Vec<String>,

        #[arg(long, default_value_t = 0, help = "Higher priority wins")]
        priority: i32,

        #[arg(long, help = "Description")]
        description: Option<String>,
    },

    #[command(about = "Change a rule")]
    Update {
        #[arg(help = "Rule ID")]
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        pattern: Option<String>,

        #[arg(long)]
        level: Option<String>,

        #[arg(long = "data-type", value_delimiter = ',', help = "Replace data-type tags")]
        data_types: Option<Vec<String>>,

        #[arg(long)]
        priority: Option<i32>,

        #[arg(long)]
        description: Option<String>,
    },

    #[command(about = "Enable a rule")]
    Enable {
        #[arg(help = "Rule ID")]
        id: i64,
    },

    #[command(about = "Disable a rule")]
    Disable {
        #[arg(help = "Rule ID")]
        id: i64,
    },

    #[command(about = "Delete a rule")]
    Delete {
        #[arg(help = "Rule ID")]
        id: i64,
    },

    #[command(about = "Insert missing built-in rules from a catalogue")]
    Seed {
        #[arg(long, help = "Catalogue file (defaults to the bundled one)")]
        file: Option<PathBuf>,
    },
}

pub fn handle_rules_command(engine: &mut Engine, action: RulesCommands, verbose: bool) -> Result<()> {
    match action {
        RulesCommands::List { org } => list_rules(engine, org),
        RulesCommands::Add {
            name,
            pattern,
            level,
            org,
            builtin,
            data_types,
            priority,
            description,
        } => {
            let level = ClassificationLevel::from_str(&level)?;
            let mut rule = match (builtin, org) {
                (true, None) => ClassificationRule::builtin(&name, &pattern, level),
                (false, Some(org)) => ClassificationRule::custom(org, &name, &pattern, level),
                (true, Some(_)) => {
                    return Err(TiermarkError::Config("--builtin rules cannot take --org".to_string()))
                }
                (false, None) => return Err(TiermarkError::Config("--org is required for custom rules".to_string())),
            };
            rule.data_types = collect_tags(data_types);
            rule.priority = priority;
            rule.description = description;

            let rule = engine.create_rule(rule)?;
            println!(
                "{} Rule '{}' added (ID: {})",
                style("✓").green(),
                style(&rule.name).bold(),
                rule.id
            );
            Ok(())
        }
        RulesCommands::Update {
            id,
            name,
            pattern,
            level,
            data_types,
            priority,
            description,
        } => {
            let mut rule = engine.db().get_rule(id)?.ok_or(TiermarkError::RuleNotFound(id))?;
            if let Some(name) = name {
                rule.name = name;
            }
            if let Some(pattern) = pattern {
                rule.pattern = pattern;
            }
            if let Some(level) = level {
                rule.level = ClassificationLevel::from_str(&level)?;
            }
            if let Some(data_types) = data_types {
                rule.data_types = collect_tags(data_types);
            }
            if let Some(priority) = priority {
                rule.priority = priority;
            }
            if description.is_some() {
                rule.description = description;
            }

            let rule = engine.update_rule(rule)?;
            println!("{} Rule {} updated", style("✓").green(), rule.id);
            if verbose {
                println!("  {} -> {} [{}]", rule.pattern, styled_level(rule.level), format_tags(&rule.data_types));
            }
            Ok(())
        }
        RulesCommands::Enable { id } => {
            engine.set_rule_enabled(id, true)?;
            println!("{} Rule {} enabled", style("✓").green(), id);
            Ok(())
        }
        RulesCommands::Disable { id } => {
            engine.set_rule_enabled(id, false)?;
            println!("{} Rule {} disabled", style("✓").green(), id);
            Ok(())
        }
        RulesCommands::Delete { id } => {
            engine.delete_rule(id)?;
            println!("{} Rule {} deleted", style("✓").green(), id);
            Ok(())
        }
        RulesCommands::Seed { file } => {
            let catalogue = match file {
                Some(path) => BuiltinCatalogue::from_file(path)?,
                None => BuiltinCatalogue::bundled()?,
            };
            let inserted = engine.seed_builtins(&catalogue)?;
            println!(
                "{} {} of {} built-in rule(s) inserted",
                style("✓").green(),
                inserted,
                catalogue.len()
            );
            Ok(())
        }
    }
}

fn list_rules(engine: &Engine, org: Option<Uuid>) -> Result<()> {
    let rules = match org {
        Some(org) => engine.db().list_rules(org)?,
        None => engine.db().list_builtin_rules()?,
    };

    if rules.is_empty() {
        println!("{}", style("No rules defined").yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Pattern").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Data Types").fg(Color::Cyan),
        Cell::new("Priority").fg(Color::Cyan),
        Cell::new("Scope").fg(Color::Cyan),
        Cell::new("Enabled").fg(Color::Cyan),
    ]);

    for rule in &rules {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.name),
            Cell::new(&rule.pattern),
            Cell::new(styled_level(rule.level)),
            Cell::new(format_tags(&rule.data_types)),
            Cell::new(rule.priority),
            Cell::new(if rule.is_builtin { "built-in" } else { "custom" }),
            Cell::new(if rule.enabled { "yes" } else { "no" }),
        ]);
    }

    println!("{}", table);
    Ok(())
}
