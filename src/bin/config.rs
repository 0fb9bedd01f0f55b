//! Profiler configuration CLI
//!
//! Usage:
//!   schema-config show
//!   schema-config init --path profiler.toml
//!   schema-config validate --config custom.toml

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use schema_profiler::ProfilerConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-config")]
#[command(about = "Inspect and initialize profiler configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Show {
        /// Configuration file layered over the default locations
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a configuration file with default values
    Init {
        /// Target file (defaults to ./profiler.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Write to the per-user config directory instead
        #[arg(long, conflicts_with = "path")]
        user: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the effective configuration
    Validate {
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config } => {
            let config = ProfilerConfig::load_from(config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Init { path, user, force } => {
            let target = if user {
                ProfilerConfig::user_config_path()
                    .ok_or_else(|| anyhow::anyhow!("no per-user config directory on this system"))?
            } else {
                path.unwrap_or_else(|| PathBuf::from("profiler.toml"))
            };
            if target.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", target.display());
            }
            if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let target_str = target
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("non UTF-8 path: {}", target.display()))?;
            ProfilerConfig::default().save(target_str)?;
            println!("✅ Wrote default configuration to {}", target.display());
        }

        Commands::Validate { config } => {
            let config = ProfilerConfig::load_from(config.as_deref())?;
            config.validate()?;
            println!("✅ Configuration is valid");
        }
    }
    Ok(())
}
