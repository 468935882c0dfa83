//! xentity CLI
//!
//! Developer tool for external entity projects: scaffolding, mapping
//! validation and running field mappers over stored or exported records.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// xentity - map remote records to typed entities
#[derive(Parser)]
#[command(name = "xentity")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory or xentity.yaml path
    #[arg(short, long, default_value = "xentity.yaml", env = "XENTITY_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new xentity project
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Validate configuration and field mappings
    Validate,

    /// Show project status
    Status,

    /// List records of an entity type
    List {
        /// Entity type id
        #[arg(short, long)]
        entity_type: String,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of records to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Map raw records to entity values (one JSON line per record)
    Extract {
        /// Entity type id
        #[arg(short, long)]
        entity_type: String,

        /// JSON or JSON Lines file of raw records (defaults to the type's storage)
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Map entity values to raw records
    Create {
        /// Entity type id
        #[arg(short, long)]
        entity_type: String,

        /// JSON or JSON Lines file of entity values
        #[arg(short, long)]
        input: String,

        /// Save the records into the type's storage instead of printing them
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout carries command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref()).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config).await?;
        }
        Commands::Status => {
            commands::status::run(&cli.config).await?;
        }
        Commands::List {
            entity_type,
            limit,
            offset,
        } => {
            commands::list::run(&cli.config, &entity_type, limit, offset).await?;
        }
        Commands::Extract { entity_type, input } => {
            commands::extract::run(&cli.config, &entity_type, input.as_deref()).await?;
        }
        Commands::Create {
            entity_type,
            input,
            save,
        } => {
            commands::create::run(&cli.config, &entity_type, &input, save).await?;
        }
    }

    Ok(())
}
