//! # metagraph
//!
//! Server and command line front end for the metadata graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                apps/metagraph (THE BINARY)               │
//! │                                                          │
//! │     ┌─────────────┐             ┌─────────────┐          │
//! │     │    CLI      │             │  HTTP API   │          │
//! │     │   (clap)    │             │   (axum)    │          │
//! │     └──────┬──────┘             └──────┬──────┘          │
//! │            └─────────────┬─────────────┘                 │
//! │                          ▼                               │
//! │                 ┌─────────────────┐                      │
//! │                 │ MetadataClient  │                      │
//! │                 │ (metagraph-core)│                      │
//! │                 └────────┬────────┘                      │
//! │                          ▼                               │
//! │                 ┌─────────────────┐                      │
//! │                 │  MemoryStore    │ ◄──► snapshot file   │
//! │                 └─────────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! metagraph server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! metagraph init
//! metagraph --user alice create -t Glossary -p qualifiedName=Glossary::Sales
//! metagraph find --search Sales
//! ```

use clap::Parser;
use metagraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // METAGRAPH_LOG_FORMAT=json switches to machine-parseable output.
    let log_format =
        std::env::var("METAGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "metagraph=info,metagraph_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(kind = %e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  metagraph v{}
  versioned metadata graph
"#,
        env!("CARGO_PKG_VERSION")
    );
}
