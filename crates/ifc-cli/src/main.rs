//! `ifc`: drive the declared-resource lifecycle against the platform.
//!
//! Architectural decisions:
//! - `main` is synchronous; the blocking HTTP transport is built and dropped
//!   outside the tokio runtime, which only hosts the bounded worker pools
//! - Output is `key=value` lines on stdout; failures go to stderr with an
//!   upper-snake prefix
//! - The state file is rewritten after every mutating command, including
//!   partially failed ones

mod commands;
mod declared;
mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ifc_facade::ResourceKind;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ifc")]
#[command(about = "Integration-framework configuration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create/update every declared resource and delete undeclared recorded ones
    Apply {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// State file path
        #[arg(long, default_value = "ifc-state.json")]
        state: PathBuf,

        /// Maximum resource operations in flight
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },

    /// Re-read every recorded resource; drop the ones that no longer exist
    Refresh {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// State file path
        #[arg(long, default_value = "ifc-state.json")]
        state: PathBuf,

        /// Maximum resource reads in flight
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },

    /// Delete every recorded resource. Guardrail: refuses unless --yes is provided.
    Destroy {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// State file path
        #[arg(long, default_value = "ifc-state.json")]
        state: PathBuf,

        /// Acknowledge that every recorded resource will be deleted.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Import an existing platform resource into the state file
    Import {
        /// Resource kind (project | log_labels | jwt | servicenow)
        kind: String,

        /// Project name, system name, or `account@service_host`
        key: String,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// State file path
        #[arg(long, default_value = "ifc-state.json")]
        state: PathBuf,
    },

    /// List the systems visible to the account
    Systems {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Print display name, cValue and pValue of one project
    ProjectInfo {
        /// Project name
        #[arg(long)]
        name: String,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // dev-time bootstrap; a missing file is fine
    dotenvy::from_filename(".env.local").ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Apply {
            config_paths,
            state,
            parallelism,
        } => {
            let loaded = commands::load_config(&config_paths)?;
            let declared = declared::parse_all(&loaded.resources()?)?;
            let platform = Arc::new(commands::connect(&loaded)?);
            println!("config_hash={} declared={}", loaded.config_hash, declared.len());

            let rt = runtime()?;
            rt.block_on(commands::apply::run_apply(
                Arc::clone(&platform),
                declared,
                &state,
                parallelism,
            ))?;
        }

        Commands::Refresh {
            config_paths,
            state,
            parallelism,
        } => {
            let loaded = commands::load_config(&config_paths)?;
            let platform = Arc::new(commands::connect(&loaded)?);

            let rt = runtime()?;
            rt.block_on(commands::refresh::run_refresh(
                Arc::clone(&platform),
                &state,
                parallelism,
            ))?;
        }

        Commands::Destroy {
            config_paths,
            state,
            yes,
        } => {
            if !yes {
                anyhow::bail!(
                    "REFUSING DESTROY: this deletes every resource recorded in {}. Re-run with: `ifc destroy --yes`",
                    state.display()
                );
            }
            let loaded = commands::load_config(&config_paths)?;
            let platform = commands::connect(&loaded)?;
            commands::destroy::run_destroy(&platform, &state)?;
        }

        Commands::Import {
            kind,
            key,
            config_paths,
            state,
        } => {
            let kind: ResourceKind = kind.parse()?;
            let loaded = commands::load_config(&config_paths)?;
            let platform = commands::connect(&loaded)?;
            commands::import::run_import(&platform, kind, &key, &state)?;
        }

        Commands::Systems { config_paths } => {
            let loaded = commands::load_config(&config_paths)?;
            let platform = commands::connect(&loaded)?;
            commands::systems::run_systems(&platform)?;
        }

        Commands::ProjectInfo { name, config_paths } => {
            let loaded = commands::load_config(&config_paths)?;
            let platform = commands::connect(&loaded)?;
            commands::systems::run_project_info(&platform, &name)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("tokio runtime build failed")
}
