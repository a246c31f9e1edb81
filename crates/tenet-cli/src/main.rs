//! tenet CLI.
//!
//! Attribute-based access control from the command line.
//!
//! # Quick Start
//!
//! ```bash
//! # Write tenet.toml and the reference policy into ./authz
//! tenet --project ./authz init
//!
//! # Check a policy document
//! tenet validate ./authz/policy.json
//!
//! # Decide a request
//! tenet evaluate ./authz/policy.json request.json
//!
//! # Run the built-in document-management scenario
//! tenet demo
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tenet_config::TenetConfig;
use tracing_subscriber::EnvFilter;

/// tenet - attribute-based access control decisions.
#[derive(Parser)]
#[command(name = "tenet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding tenet.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write tenet.toml and the reference policy document.
    Init,

    /// Check a policy document for load-time errors.
    Validate {
        /// Policy document (defaults to policy.path from configuration).
        policy: Option<String>,
    },

    /// Decide a request against a policy document.
    Evaluate {
        /// Policy document.
        policy: String,

        /// Request document.
        request: String,

        /// Print resolver calls, cache hits and visited nodes to stderr.
        #[arg(long)]
        stats: bool,
    },

    /// Run the document-management scenario.
    Demo,

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that the configuration loads.
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration errors are reported by the commands that need it
    let config = TenetConfig::load_from_dir(&cli.project);
    let level = match cli.verbose {
        0 => config
            .as_ref()
            .map_or_else(|_| "info".to_string(), |c| c.logging.level.clone()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run(&cli.project),
        Commands::Validate { policy } => commands::validate::run(config?, policy.as_deref()),
        Commands::Evaluate {
            policy,
            request,
            stats,
        } => commands::evaluate::run(&config?, &policy, &request, stats),
        Commands::Demo => commands::demo::run(&config?),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(config?, &format),
            ConfigCommands::Validate => commands::config::validate(&cli.project, config),
        },
    }
}
