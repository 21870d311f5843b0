//! `stitch` command-line driver

mod commands;

use clap::{Parser, Subcommand};
use std::path::Path;
use stitch_engine::StitchConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stitch")]
#[command(author, version, about = "Build-time member injection for class corpora", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Weave a corpus and write the result
    Weave(commands::weave::WeaveArgs),

    /// List directives and the classes they resolve to
    Inspect(commands::inspect::InspectArgs),

    /// Run a method of a corpus on the reference machine
    ///
    /// Instance methods run on a fresh instance of the class.
    Invoke(commands::invoke::InvokeArgs),
}

/// Configuration from an explicit file, or `stitch.toml` under `corpus`
pub(crate) fn load_config(explicit: Option<&Path>, corpus: &Path) -> anyhow::Result<StitchConfig> {
    let config = match explicit {
        Some(path) => StitchConfig::load(path)?,
        None => StitchConfig::discover(corpus)?,
    };
    Ok(config)
}

/// `RUST_LOG` wins over the configured filter
pub(crate) fn init_logging(default_filter: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // an already-installed subscriber is kept
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Weave(args) => commands::weave::execute(args, cli.json_logs),
        Commands::Inspect(args) => commands::inspect::execute(args, cli.json_logs),
        Commands::Invoke(args) => commands::invoke::execute(args, cli.json_logs),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}
