//! MANA CLI
//!
//! Entity resolution and trust promotion over a SQLite store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mana_core::{ConfigSource, Entity, EntityId, Group, OriginGroup};
use mana_runtime::Resolver;
use mana_store::{in_transaction, Repository, SqliteRepository, StoreError};

#[derive(Parser)]
#[command(name = "mana")]
#[command(author, version, about = "MANA: entity resolution and trust promotion for cited sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, env = "MANA_DB", default_value = "mana.db", global = true)]
    db: PathBuf,

    /// TOML file with resolution thresholds
    #[arg(long, env = "MANA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a resolution pass over unmatched entities
    Resolve,

    /// Run a trust promotion pass over the whole store
    Promote,

    /// Merge two entities (the second is absorbed unless only it is a reference)
    Merge {
        id1: EntityId,
        id2: EntityId,

        /// Reason recorded in the merge history
        #[arg(short, long, default_value = "Manual merge")]
        reason: String,
    },

    /// Recompute one entity's occurrence and reference summaries
    Enrich { id: EntityId },

    /// Print an entity as JSON
    Show { id: EntityId },

    /// Load groups, entities (with origins) and provenance from a JSON file
    Import { file: PathBuf },

    /// Print the effective configuration
    Config,
}

/// Shape of an import file
#[derive(Debug, Deserialize)]
struct ImportDocument {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    origin_groups: Vec<OriginGroup>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let source = ConfigSource::new(cli.config.clone());

    match cli.command {
        Commands::Resolve => resolve(&mut open_resolver(&cli.db, source)?),
        Commands::Promote => promote(&mut open_resolver(&cli.db, source)?),
        Commands::Merge { id1, id2, reason } => {
            let summary = open_resolver(&cli.db, source)?
                .merge_entities(id1, id2, &reason)
                .with_context(|| format!("Merge of {} and {} failed", id1, id2))?;
            println!("{}", summary);
            Ok(())
        }
        Commands::Enrich { id } => {
            let entity = open_resolver(&cli.db, source)?.enrich(id)?;
            println!(
                "Entity id={} ({}): {} occurrences, {} referencing entities",
                entity.id,
                entity.name,
                entity.t_occurrences.unwrap_or_default(),
                entity.t_source_references.map(|r| r.len()).unwrap_or_default()
            );
            Ok(())
        }
        Commands::Show { id } => show(&cli.db, id),
        Commands::Import { file } => import(&cli.db, &file),
        Commands::Config => show_config(&source),
    }
}

fn open_store(path: &Path) -> Result<SqliteRepository> {
    SqliteRepository::open(path).with_context(|| format!("Failed to open store {}", path.display()))
}

fn open_resolver(db: &Path, source: ConfigSource) -> Result<Resolver<SqliteRepository>> {
    let repo = open_store(db)?;
    Resolver::new(repo, source).context("Failed to load configuration")
}

fn resolve(resolver: &mut Resolver<SqliteRepository>) -> Result<()> {
    let report = resolver.run_resolution_pass()?;
    println!("Resolution pass {}", report.run_id);
    println!("   Processed: {}", report.processed);
    println!("   Skipped (absorbed): {}", report.skipped);
    println!("   Failed: {}", report.failed);
    println!(
        "   Auto merges: {} applied, {} rejected",
        report.auto_merges_applied, report.auto_merges_rejected
    );
    println!("   Suggestions recorded: {}", report.suggestions_recorded);
    println!(
        "   Took {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
    Ok(())
}

fn promote(resolver: &mut Resolver<SqliteRepository>) -> Result<()> {
    let report = resolver.run_trust_promotion_pass()?;
    println!("Trust promotion pass {}", report.run_id);
    println!("   Source candidates flagged: {}", report.candidates_flagged);
    println!("   Trusted flagged: {}", report.trusted_flagged);
    println!("   Enriched: {}", report.enriched);
    Ok(())
}

fn show(db: &Path, id: EntityId) -> Result<()> {
    let repo = open_store(db)?;
    let entity = repo
        .get_entity(id)?
        .with_context(|| format!("Entity {} not found", id))?;
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

fn show_config(source: &ConfigSource) -> Result<()> {
    let config = source.load().context("Failed to load configuration")?;
    match source.path() {
        Some(path) => println!("# from {} and environment", path.display()),
        None => println!("# defaults and environment"),
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn import(db: &Path, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document: ImportDocument = serde_json::from_str(&content)
        .with_context(|| format!("Invalid import file {}", file.display()))?;

    let mut repo = open_store(db)?;
    in_transaction(&mut repo, |repo| {
        for group in &document.groups {
            repo.insert_group(group)?;
        }
        for entity in &document.entities {
            repo.insert_entity(entity)?;
        }
        for edge in &document.origin_groups {
            repo.insert_origin_group(edge)?;
        }
        Ok::<_, StoreError>(())
    })
    .context("Import failed; nothing was written")?;

    info!("Imported {}", file.display());
    println!(
        "Imported {} groups, {} entities, {} provenance edges",
        document.groups.len(),
        document.entities.len(),
        document.origin_groups.len()
    );
    Ok(())
}
