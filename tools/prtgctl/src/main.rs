//! prtgctl - Operator CLI for PRTG
//!
//! Reads the client configuration (file and `PRTG_*` environment), talks to
//! the server over the HTTP/XML API and applies rule files to the object
//! tree.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use prtg_cache::{ContentFilter, EntityCache};
use prtg_client::{Client, ClientConfig, HttpTransport, RuleOutcome, ENV_PREFIX};
use prtg_model::{Entity, EntityKind};
use prtg_rules::RuleChain;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type PrtgClient = Client<HttpTransport, Box<dyn EntityCache>>;

/// Kinds refreshed before rules are applied, parents first
const TREE_KINDS: [EntityKind; 3] = [EntityKind::Group, EntityKind::Device, EntityKind::Sensor];

#[derive(Parser)]
#[command(name = "prtgctl")]
#[command(about = "PRTG management CLI")]
#[command(long_about = "PRTG management CLI

Examples:
  prtgctl -c prtg.yaml status                       # Server status
  prtgctl table devices                             # List devices
  prtgctl get-property 2001 tags                    # Read one property
  prtgctl set-property 2001 tags \"core net\"         # Write one property
  prtgctl apply-rules rules.yaml --content devices  # Preview rule changes
  prtgctl apply-rules rules.yaml --commit           # Apply them

Settings may also come from PRTG_* environment variables
(PRTG_ENDPOINT, PRTG_PASSHASH, PRTG_RETRY__RETRIES, ...).")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (toml, yaml or json)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Server root URL, overrides the configuration
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Login name, overrides the configuration
    #[arg(long, global = true)]
    username: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server status
    Status,

    /// List every object of one kind
    Table {
        /// groups, devices or sensors
        kind: EntityKind,
    },

    /// Read one object property
    GetProperty {
        /// Object id
        id: String,
        /// Property name
        name: String,
    },

    /// Write one object property
    SetProperty {
        /// Object id
        id: String,
        /// Property name
        name: String,
        /// New value (list properties take space-separated values)
        value: String,
    },

    /// Print the password hash of the configured user
    Passhash,

    /// Apply a rule file to the object tree
    ApplyRules {
        /// Rule file (yaml or json)
        rules: PathBuf,

        /// Kinds to apply the rules to (default: all)
        #[arg(long = "content", num_args = 1..)]
        content: Vec<EntityKind>,

        /// Write the changes to the server (default: preview only)
        #[arg(long)]
        commit: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = load_config(&cli)?;
    common::init_logging(&config.logging).context("Failed to initialize logging")?;
    report_config(&cli, &config);

    let client = Client::from_config(&config).context("Invalid client configuration")?;

    match cli.command {
        Commands::Status => show_status(&client),
        Commands::Table { kind } => show_table(&client, kind),
        Commands::GetProperty { id, name } => {
            match client.get_object_property(&id, &name)? {
                Some(value) => println!("{}", value),
                None => println!("{}", "(no value)".dimmed()),
            }
            Ok(())
        },
        Commands::SetProperty { id, name, value } => {
            client.set_object_property(&id, &name, &value, Vec::new())?;
            println!("{} {}={} on object {}", "✓".green(), name, value, id);
            Ok(())
        },
        Commands::Passhash => {
            println!("{}", client.password_hash()?);
            Ok(())
        },
        Commands::ApplyRules {
            rules,
            content,
            commit,
        } => apply_rules(&client, &rules, &content, commit),
    }
}

/// Configuration layers plus command-line overrides
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config: ClientConfig = common::load_layered(cli.config.as_deref(), ENV_PREFIX)
        .context("Failed to load configuration")?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(username) = &cli.username {
        config.username = username.clone();
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    Ok(config)
}

/// Log where the configuration came from; needs the subscriber installed
fn report_config(cli: &Cli, config: &ClientConfig) {
    match &cli.config {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file given, using defaults and environment"),
    }
    debug!("Using endpoint {}", config.endpoint);
}

fn show_status(client: &PrtgClient) -> Result<()> {
    let status = client.status()?;
    println!("{}", "Server status".bright_cyan().bold());
    for (name, value) in status.fields() {
        if name == "type" || value.to_string().is_empty() {
            continue;
        }
        println!("  {:<26} {}", name, value);
    }
    Ok(())
}

fn print_entity(entity: &Entity) {
    let tags = entity.tags().join(" ");
    println!(
        "  {:>8}  {:<40} {}",
        entity.id().unwrap_or("-"),
        entity.name().unwrap_or("-"),
        tags.dimmed()
    );
}

fn show_table(client: &PrtgClient, kind: EntityKind) -> Result<()> {
    let entities = client.table(kind)?;
    println!(
        "{} ({})",
        kind.content_type().bright_cyan().bold(),
        entities.len()
    );
    for entity in &entities {
        print_entity(entity);
    }
    Ok(())
}

fn load_rules(path: &Path) -> Result<RuleChain> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file {}", path.display()))?;
    let chain = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => RuleChain::from_json_str(&text),
        _ => RuleChain::from_yaml_str(&text),
    }
    .with_context(|| format!("Invalid rule file {}", path.display()))?;
    info!("Loaded {} rule(s) from {}", chain.len(), path.display());
    Ok(chain)
}

fn apply_rules(
    client: &PrtgClient,
    rules: &Path,
    content: &[EntityKind],
    commit: bool,
) -> Result<()> {
    let chain = load_rules(rules)?;

    for kind in TREE_KINDS {
        let fetched = client.table(kind)?;
        info!("Cached {} {}", fetched.len(), kind);
    }

    let filters: Vec<ContentFilter> = if content.is_empty() {
        vec![ContentFilter::All]
    } else {
        content.iter().copied().map(ContentFilter::from).collect()
    };

    let (mut changed, mut failed) = (0usize, 0usize);
    for filter in filters {
        for report in client.apply_rules(&chain, filter, commit)? {
            match report.outcome {
                RuleOutcome::Changed(changes) => {
                    changed += 1;
                    println!("{}", report.entity.bold());
                    for (prop, value) in &changes {
                        println!("  {} {} = {}", "→".green(), prop, value);
                    }
                },
                RuleOutcome::Unchanged => debug!("{} unchanged", report.entity),
                RuleOutcome::Failed(e) => {
                    failed += 1;
                    println!("{} {}: {}", "✗".red(), report.entity, e);
                },
            }
        }
    }

    let verb = if commit { "committed" } else { "pending" };
    println!();
    println!("{} object(s) with changes {}", changed, verb);
    if !commit && changed > 0 {
        println!("{}", "Run again with --commit to write them".yellow());
    }
    if failed > 0 {
        bail!("{} object(s) could not be processed", failed);
    }
    Ok(())
}
