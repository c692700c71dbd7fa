//! # Trellis - Learning Path Progression Server
//!
//! The main binary for the Trellis deterministic progression engine.
//!
//! This application provides:
//! - CLI interface for catalog authoring and learner operations
//! - Snapshot export/import
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                apps/trellis (THE BINARY)                │
//! │                                                         │
//! │   ┌──────────────┐          ┌─────────────────────┐    │
//! │   │     CLI      │          │   Config loader     │    │
//! │   │    (clap)    │          │  (trellis.toml)     │    │
//! │   └──────┬───────┘          └──────────┬──────────┘    │
//! │          │                             │               │
//! │          └──────────────┬──────────────┘               │
//! │                         ▼                               │
//! │                 ┌───────────────┐                       │
//! │                 │ trellis-core  │                       │
//! │                 │  (THE LOGIC)  │                       │
//! │                 └───────────────┘                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Seed a catalog and inspect it
//! trellis seed -f nodes.json
//! trellis audit -p 1
//!
//! # Learner operations
//! trellis state -u 42 -p 1
//! trellis complete -u 42 -p 1 -n 3
//! trellis lives -u 42
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis::{cli, config};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let file_config = config::FileConfig::load_default();

    // Initialize tracing — TRELLIS_LOG_FORMAT=json enables machine-parseable
    // output; the config file provides the fallback.
    let log_format = config::resolve_log_format(&file_config);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trellis=info".into());

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

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli, &file_config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Trellis startup banner.
fn print_banner() {
    println!(
        r#"
  ████████╗██████╗ ███████╗██╗     ██╗     ██╗███████╗
  ╚══██╔══╝██╔══██╗██╔════╝██║     ██║     ██║██╔════╝
     ██║   ██████╔╝█████╗  ██║     ██║     ██║███████╗
     ██║   ██╔══██╗██╔══╝  ██║     ██║     ██║╚════██║
     ██║   ██║  ██║███████╗███████╗███████╗██║███████║
     ╚═╝   ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝╚═╝╚══════╝

  Learning Path Progression v{}

  Deterministic • Rederived • Never Patched
"#,
        env!("CARGO_PKG_VERSION")
    );
}
