//! # nl2sql CLI
//!
//! Command-line interface for nl2sql: natural-language questions answered
//! with SQL generated over a relational schema.
//!
//! ## Commands
//!
//! - `nl2sql index rebuild|update|status` - Maintain the schema index
//! - `nl2sql schema <QUERY>` - Show the tables selected for a question
//! - `nl2sql classify <QUERY>` - Show how a request would be routed
//! - `nl2sql generate <QUERY>` - Generate a validated SQL statement
//! - `nl2sql ask <QUERY>` - Full dispatch: route, generate, run or analyze
//! - `nl2sql config show|init|path` - Manage configuration
//!
//! ## Examples
//!
//! ```bash
//! # Index the tables of a SQLite database
//! nl2sql index rebuild
//!
//! # Generate SQL, filtered for one user group
//! nl2sql generate "total invoices last month" --group-id 42
//!
//! # Get JSON output
//! nl2sql ask "top 5 customers by revenue" --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nl2sql_agent::{Request, Router, SqlOutcome};
use nl2sql_index::IndexReport;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod components;
mod config;

use components::Components;
use config::Config;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Answer natural-language questions with SQL")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/nl2sql/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Maintain the schema index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show the restricted schema selected for a question
    Schema {
        /// Natural-language question
        query: String,
    },

    /// Classify a request
    Classify {
        /// Natural-language request
        query: String,
    },

    /// Generate SQL for a question
    Generate {
        /// Natural-language question
        query: String,

        /// User group to filter rows for
        #[arg(short, long)]
        group_id: Option<String>,
    },

    /// Handle a request end to end
    Ask {
        /// Natural-language request
        query: String,

        /// Conversation identifier
        #[arg(long, default_value = "cli")]
        conv_id: String,

        /// User group to filter rows for
        #[arg(short, long)]
        group_id: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the whole index for the configured prefix
    Rebuild,
    /// Reindex only the given tables
    Update {
        /// Table names
        #[arg(required = true)]
        tables: Vec<String>,
    },
    /// Show index statistics
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for index status.
#[derive(Serialize)]
struct StatusOutput {
    total_tables: u64,
    tables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// Output structure for schema selection.
#[derive(Serialize)]
struct SchemaOutput<'a> {
    query: &'a str,
    tables: Vec<&'a str>,
    schema: String,
}

/// Output structure for generation.
#[derive(Serialize)]
struct GenerateOutput<'a> {
    query: &'a str,
    sql: &'a str,
    cached: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    init_tracing(&config, cli.verbose);

    if let Commands::Config { action } = &cli.command {
        return config_command(action, &config, cli.format);
    }

    let components = Components::new(config)?;
    match cli.command {
        Commands::Index { action } => index_command(action, &components, cli.format).await?,

        Commands::Schema { query } => {
            components.prepare_index().await?;
            let selector = components.selector(components.roster()?);
            let schema = selector.select_schema(&query).await;
            match cli.format {
                OutputFormat::Json => {
                    let output = SchemaOutput {
                        query: &query,
                        tables: schema.table_names(),
                        schema: schema.text(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    if schema.is_empty() {
                        println!("No relevant tables found.");
                    } else {
                        println!("{schema}");
                    }
                }
            }
        }

        Commands::Classify { query } => {
            let router = Router::new(components.roster()?);
            let label = router.classify(&query).await;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "query": query, "classification": label }));
                }
                OutputFormat::Text => match label {
                    Some(label) => println!("{label}"),
                    None => println!("Request not correctly classified!"),
                },
            }
        }

        Commands::Generate { query, group_id } => {
            components.prepare_index().await?;
            let assistant = components.assistant()?;
            let outcome = assistant.generate_sql(&query, group_id.as_deref()).await;
            let sql = outcome.sql().unwrap_or_default();
            match cli.format {
                OutputFormat::Json => {
                    let output = GenerateOutput {
                        query: &query,
                        sql,
                        cached: matches!(outcome, SqlOutcome::Cached(_)),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => match outcome {
                    SqlOutcome::NoSchema => println!("No relevant tables found."),
                    SqlOutcome::NotGenerated => {
                        println!("SQL not generated! Maybe we don't have the data you're requesting.");
                    }
                    SqlOutcome::Cached(_) | SqlOutcome::Generated(_) => println!("{sql}"),
                },
            }
        }

        Commands::Ask {
            query,
            conv_id,
            group_id,
        } => {
            components.prepare_index().await?;
            let assistant = components.assistant()?;
            let mut request = Request::new(query, conv_id);
            request.group_id = group_id;
            let response = assistant.handle(&request).await;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Text => {
                    if response.is_ok() {
                        if let Some(sql) = &response.sql {
                            println!("SQL: {sql}\n");
                        }
                        match &response.content {
                            serde_json::Value::String(text) => println!("{text}"),
                            other => println!("{}", serde_json::to_string_pretty(other)?),
                        }
                    } else {
                        println!("{}", response.msg);
                    }
                }
            }
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(config: &Config, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn index_command(
    action: IndexAction,
    components: &Components,
    format: OutputFormat,
) -> Result<()> {
    match action {
        IndexAction::Rebuild => {
            let filter = components.filter();
            info!("Rebuilding index ({:?})", filter);
            let report = components
                .indexer()?
                .rebuild(&filter)
                .await
                .context("Index rebuild failed")?;
            print_report(&report, format)?;
        }
        IndexAction::Update { tables } => {
            let report = components
                .indexer()?
                .update(&tables)
                .await
                .context("Index update failed")?;
            print_report(&report, format)?;
        }
        IndexAction::Status => {
            components.index.init().await.context("Failed to open index")?;
            let stats = components.index.stats().await?;
            let tables = components.index.tables().await?;
            match format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        total_tables: stats.total_tables,
                        tables,
                        last_updated: stats.last_updated.map(|t| t.to_rfc3339()),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Index Status");
                    println!("  Tables:  {}", stats.total_tables);
                    if let Some(last) = stats.last_updated {
                        println!("  Updated: {}", last.format("%Y-%m-%d %H:%M:%S"));
                    }
                    for table in tables {
                        println!("  - {table}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &IndexReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!("Indexed {} tables (removed {} entries)", report.indexed.len(), report.removed);
            if !report.skipped.is_empty() {
                println!("Skipped: {}", report.skipped.join(", "));
            }
            if !report.missing.is_empty() {
                println!("Not in schema: {}", report.missing.join(", "));
            }
        }
    }
    Ok(())
}

fn config_command(action: &ConfigAction, config: &Config, format: OutputFormat) -> Result<()> {
    match action {
        ConfigAction::Show => match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(config).context("Failed to serialize config")?
                );
            }
            OutputFormat::Text => {
                println!(
                    "{}",
                    toml::to_string_pretty(config).context("Failed to serialize config")?
                );
            }
        },
        ConfigAction::Init => {
            println!("{}", Config::sample_toml());
        }
        ConfigAction::Path => {
            if let Some(path) = Config::config_path() {
                println!("{}", path.display());
            } else {
                println!("Could not determine config directory");
            }
        }
    }
    Ok(())
}
