//! speakerid CLI - enroll and identify speakers from embedding files.

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use speakerid::{Metadata, Registry};
use speakerid_kv::RedbStore;
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use output::{Output, read_vector};

/// speakerid - speaker identity matching over voice embeddings.
///
/// Embeddings are read from JSON files holding either a bare array of
/// numbers or an object with a `vector` field. Use `-` to read stdin.
///
/// Configuration is read from ~/.speakerid/config.yaml.
#[derive(Parser)]
#[command(name = "speakerid")]
#[command(about = "Speaker identification registry")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.speakerid/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Database file (overrides db_path from the config file)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Output as JSON (default is YAML)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add one embedding sample for an identity
    Enroll {
        identity: String,
        /// Embedding file
        vector: String,
        /// Label the sample, e.g. --meta relationship=self (repeatable)
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Remove an identity and all its samples
    Unenroll { identity: String },
    /// List enrolled identities
    List,
    /// Show sample counts and enrollment times of an identity
    Show { identity: String },
    /// Find the enrolled identity closest to an embedding
    Identify {
        vector: String,
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Print the best N candidates instead of a decision
        #[arg(long, conflicts_with_all = ["threshold", "among"])]
        top: Option<usize>,
        /// Only consider these identities (comma separated)
        #[arg(long, value_delimiter = ',')]
        among: Vec<String>,
    },
    /// Check an embedding against one identity
    Verify {
        identity: String,
        vector: String,
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Compare two embeddings directly
    Compare {
        a: String,
        b: String,
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Show store-wide counters
    Stats,
    /// Remove every identity
    Clear {
        /// Confirm removal
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct Removed<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<&'a str>,
    removed: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let out = Output::new(cli.json);

    match &cli.command {
        Commands::Enroll {
            identity,
            vector,
            meta,
        } => {
            let metadata: Metadata = meta.iter().cloned().collect();
            let record = open_registry(cli)?.enroll_with_metadata(
                identity,
                &read_vector(vector)?,
                metadata,
            )?;
            out.write(&record)
        }
        Commands::Unenroll { identity } => {
            let removed = open_registry(cli)?.unenroll(identity)?;
            out.write(&Removed {
                identity: Some(identity.as_str()),
                removed,
            })
        }
        Commands::List => out.write(&open_registry(cli)?.list()),
        Commands::Show { identity } => out.write(&open_registry(cli)?.identity_stats(identity)?),
        Commands::Identify {
            vector,
            threshold,
            top,
            among,
        } => {
            let query = read_vector(vector)?;
            let reg = open_registry(cli)?;
            if let Some(k) = top {
                return out.write(&reg.rank(&query, *k)?);
            }
            if among.is_empty() {
                out.write(&reg.identify(&query, *threshold)?)
            } else {
                let among: Vec<&str> = among.iter().map(String::as_str).collect();
                out.write(&reg.identify_among(&query, &among, *threshold)?)
            }
        }
        Commands::Verify {
            identity,
            vector,
            threshold,
        } => {
            let result = open_registry(cli)?.verify(identity, &read_vector(vector)?, *threshold)?;
            out.write(&result)
        }
        Commands::Compare { a, b, threshold } => {
            // No database needed.
            let reg = Registry::in_memory(load_config(cli)?.engine)?;
            let result = reg.compare(&read_vector(a)?, &read_vector(b)?, *threshold)?;
            out.write(&result)
        }
        Commands::Stats => out.write(&open_registry(cli)?.stats()),
        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to remove every identity without --yes");
            }
            let removed = open_registry(cli)?.clear()?;
            out.write(&Removed {
                identity: None,
                removed,
            })
        }
    }
}

/// Parses one `KEY=VALUE` metadata pair.
fn parse_meta(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<config::Config> {
    config::load_config(cli.config.as_deref())
}

fn open_registry(cli: &Cli) -> anyhow::Result<Registry> {
    let cfg = load_config(cli)?;
    let db_path = cfg.resolve_db_path(cli.db.as_deref())?;
    tracing::debug!(path = %db_path.display(), "opening database");
    let kv = RedbStore::open(&db_path)
        .with_context(|| format!("open database {}", db_path.display()))?;
    Ok(Registry::open(cfg.engine, Arc::new(kv))?)
}
