//! # CLI Module
//!
//! Command-line interface for metagraph.
//!
//! Every command opens the snapshot named by `--database`, runs through a
//! [`metagraph_core::MetadataClient`] configured from `--config`, and writes
//! the snapshot back when it changed something.

mod commands;

pub use commands::{load_store, parse_properties, parse_status};

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use metagraph_core::MetadataResult;
use std::path::PathBuf;

// =============================================================================
// CLI DEFINITION
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "metagraph")]
#[command(author, version, about = "Versioned metadata graph server and CLI")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress the banner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Snapshot file holding the store
    #[arg(short = 'D', long, default_value = "metagraph.mgrf", global = true)]
    pub database: PathBuf,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Caller identity for every operation
    #[arg(short, long, default_value = "cli", global = true)]
    pub user: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show store statistics and the snapshot checksum
    Status,

    /// Create an empty snapshot file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Create an element
    Create {
        /// Element type name
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Property as name=value (repeatable)
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Classification name (repeatable)
        #[arg(long = "classification")]
        classifications: Vec<String>,

        /// GUID of the anchor element
        #[arg(short, long)]
        anchor: Option<String>,

        /// Initial status, e.g. ACTIVE or DRAFT
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Print one element
    Get {
        guid: String,

        /// Include archived and deleted elements
        #[arg(long)]
        lineage: bool,
    },

    /// Search elements
    Find {
        /// Literal text searched in the name properties
        #[arg(short, long)]
        search: Option<String>,

        /// Restrict to this type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Exact property match as name=value
        #[arg(short, long)]
        property: Option<String>,

        /// Elements carrying this classification
        #[arg(long)]
        classification: Option<String>,

        #[arg(long, default_value = "0")]
        start: usize,

        /// 0 uses the configured default
        #[arg(long, default_value = "0")]
        page_size: usize,

        #[arg(long)]
        lineage: bool,
    },

    /// Attach a classification to an element
    Classify {
        guid: String,

        /// Classification name
        name: String,

        /// Property as name=value (repeatable)
        #[arg(short, long = "property")]
        properties: Vec<String>,
    },

    /// Print the version history of an element
    History {
        guid: String,

        #[arg(long)]
        oldest_first: bool,

        #[arg(long, default_value = "0")]
        page_size: usize,
    },

    /// Export the store
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (snapshot, json)
        #[arg(short, long, default_value = "snapshot")]
        format: String,
    },

    /// Replace the store with an exported file
    Import {
        /// Input file path (snapshot or json)
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the parsed command. No subcommand shows status.
pub async fn execute(cli: Cli) -> MetadataResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let ctx = commands::Context {
        database: cli.database,
        user: cli.user,
        json_mode: cli.json_mode,
        config,
    };

    match cli.command {
        Some(Commands::Server { host, port }) => commands::cmd_server(&ctx, host, port).await,
        Some(Commands::Status) | None => commands::cmd_status(&ctx),
        Some(Commands::Init { force }) => commands::cmd_init(&ctx, force),
        Some(Commands::Create {
            type_name,
            properties,
            classifications,
            anchor,
            status,
        }) => commands::cmd_create(
            &ctx,
            &type_name,
            &properties,
            &classifications,
            anchor.as_deref(),
            status.as_deref(),
        ),
        Some(Commands::Get { guid, lineage }) => commands::cmd_get(&ctx, &guid, lineage),
        Some(Commands::Find {
            search,
            type_name,
            property,
            classification,
            start,
            page_size,
            lineage,
        }) => commands::cmd_find(
            &ctx,
            &commands::FindArgs {
                search,
                type_name,
                property,
                classification,
                start,
                page_size,
                lineage,
            },
        ),
        Some(Commands::Classify {
            guid,
            name,
            properties,
        }) => commands::cmd_classify(&ctx, &guid, &name, &properties),
        Some(Commands::History {
            guid,
            oldest_first,
            page_size,
        }) => commands::cmd_history(&ctx, &guid, oldest_first, page_size),
        Some(Commands::Export { output, format }) => commands::cmd_export(&ctx, &output, &format),
        Some(Commands::Import { input }) => commands::cmd_import(&ctx, &input),
    }
}

// =============================================================================
// TESTS
// =============================================================================
