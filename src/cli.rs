//! CLI implementation for seqsift

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use seqsift::config::{Config, Profile};
use seqsift::ingest;
use seqsift::model::{AnalysisResult, SeqId};
use seqsift::query::parse_query;
use seqsift::render;
use seqsift::store::{Store, StoreError};
use seqsift::Analyzer;

// Exit codes
#[repr(i32)]
#[allow(dead_code)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoResults = 2,
    IndexMissing = 3,
}

#[derive(Parser)]
#[command(name = "seqsift")]
#[command(about = "Offline OEIS lookup: exact, transformed, and combined sequence matching")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index database path (default: <data dir>/seqsift/oeis.db)
    #[arg(long, env = "SEQSIFT_DB", global = true)]
    db: Option<PathBuf>,

    /// Show debug info (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the local index from OEIS dump files
    Ingest {
        /// Path to the stripped terms file (plain or .gz)
        #[arg(long)]
        stripped: PathBuf,

        /// Path to the names file
        #[arg(long)]
        names: Option<PathBuf>,

        /// Path to the keywords file
        #[arg(long)]
        keywords: Option<PathBuf>,

        /// Drop existing records first
        #[arg(long)]
        force: bool,
    },

    /// Match an integer sequence against the index
    Query {
        /// Sequence terms, comma- or space-separated; ? marks a wildcard
        terms: String,

        /// Search effort: fast, deep, or max
        #[arg(short, long, default_value = "deep")]
        profile: String,

        /// Also search for interior (subsequence) matches
        #[arg(long)]
        subseq: bool,

        /// Force triple combinations even for large buckets
        #[arg(long)]
        triples: bool,

        /// Attach stored-term snippets to matches
        #[arg(long)]
        snippets: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Output LaTeX identities
        #[arg(long)]
        latex: bool,

        /// Comma-separated stages to run (exact,transform,similarity,combo)
        #[arg(long)]
        stages: Option<String>,
    },

    /// Show corpus statistics
    Stats,
}

pub fn run_with(cli: Cli) -> Result<()> {
    let db_path = resolve_db_path(cli.db.as_deref())?;

    match cli.command {
        Commands::Ingest {
            stripped,
            names,
            keywords,
            force,
        } => cmd_ingest(&db_path, &stripped, names.as_deref(), keywords.as_deref(), force),
        Commands::Query {
            terms,
            profile,
            subseq,
            triples,
            snippets,
            json,
            latex,
            stages,
        } => cmd_query(
            &db_path, &terms, &profile, subseq, triples, snippets, json, latex,
            stages.as_deref(),
        ),
        Commands::Stats => cmd_stats(&db_path),
    }
}

fn resolve_db_path(explicit: Option<&std::path::Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let base = dirs::data_dir().context("no data directory available; pass --db")?;
    Ok(base.join("seqsift/oeis.db"))
}

fn open_existing(db_path: &std::path::Path) -> Result<Store> {
    match Store::open_existing(db_path) {
        Ok(store) => Ok(store),
        Err(e @ StoreError::Missing(_)) => {
            eprintln!("{}", e.to_string().red());
            std::process::exit(ExitCode::IndexMissing as i32);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_ingest(
    db_path: &std::path::Path,
    stripped: &std::path::Path,
    names: Option<&std::path::Path>,
    keywords: Option<&std::path::Path>,
    force: bool,
) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = Store::open(db_path)?;
    store.init()?;
    if force {
        store.clear()?;
    }

    let config = Config::load(Profile::Deep, &std::env::current_dir()?);

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template"),
    );
    let report = ingest::ingest_stripped(&store, stripped, config.max_stored_terms, |count| {
        bar.set_message(format!("{} sequences", count));
        bar.tick();
    })?;
    bar.finish_and_clear();

    let mut named = 0;
    if let Some(path) = names {
        named = ingest::ingest_names(&store, path)?;
    }
    let mut tagged = 0;
    if let Some(path) = keywords {
        tagged = ingest::ingest_keywords(&store, path)?;
    }

    store.metadata_set("source", &stripped.display().to_string())?;

    println!(
        "{} {} sequences indexed ({} skipped, {} named, {} tagged)",
        "done:".green().bold(),
        report.records,
        report.skipped,
        named,
        tagged
    );
    Ok(())
}

fn parse_stage_list(config: &mut Config, stages: &str) -> Result<()> {
    config.stages.exact = false;
    config.stages.transform = false;
    config.stages.similarity = false;
    config.stages.combination = false;
    for stage in stages.split(',') {
        match stage.trim() {
            "exact" => config.stages.exact = true,
            "transform" => config.stages.transform = true,
            "similarity" => config.stages.similarity = true,
            "combo" | "combination" | "combinations" => config.stages.combination = true,
            other => bail!("unknown stage '{}' (exact|transform|similarity|combo)", other),
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    db_path: &std::path::Path,
    terms: &str,
    profile: &str,
    subseq: bool,
    triples: bool,
    snippets: bool,
    json: bool,
    latex: bool,
    stages: Option<&str>,
) -> Result<()> {
    let profile = Profile::from_str(profile).map_err(|e| anyhow::anyhow!(e))?;
    let mut config = Config::load(profile, &std::env::current_dir()?);
    if subseq {
        config.allow_subsequence = true;
    }
    if let Some(list) = stages {
        parse_stage_list(&mut config, list)?;
    }

    let mut query = parse_query(terms, config.min_match_length, config.max_wildcards)?;
    query.allow_subsequence = config.allow_subsequence;

    let store = open_existing(db_path)?;
    let mut analyzer = Analyzer::new(&store, &config);
    analyzer.snippets = snippets;
    analyzer.force_triples = triples;
    let result = analyzer.analyze(&query)?;

    let names = collect_names(&store, &result)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&render::render_json(&result, &names))?
        );
    } else {
        print!("{}", render::render_human(&result, &names));
        if latex {
            print!("{}", render::render_latex(&result));
        }
    }

    if result.is_empty() {
        std::process::exit(ExitCode::NoResults as i32);
    }
    Ok(())
}

/// One store round-trip per distinct matched id, done before rendering so
/// rendering itself stays pure.
fn collect_names(store: &Store, result: &AnalysisResult) -> Result<HashMap<SeqId, String>> {
    let mut ids: Vec<SeqId> = result
        .exact
        .iter()
        .chain(&result.transformed)
        .map(|m| m.id)
        .chain(result.similar.iter().map(|h| h.id))
        .chain(
            result
                .combinations
                .iter()
                .flat_map(|c| c.component_ids.clone()),
        )
        .collect();
    ids.sort();
    ids.dedup();

    let mut names = HashMap::new();
    for id in ids {
        if let Some(record) = store.get(id)? {
            if !record.name.is_empty() {
                names.insert(id, record.name);
            }
        }
    }
    Ok(names)
}

fn cmd_stats(db_path: &std::path::Path) -> Result<()> {
    let store = open_existing(db_path)?;
    let stats = store.stats()?;
    let created = store.metadata_get("created_at")?.unwrap_or_default();
    let source = store.metadata_get("source")?.unwrap_or_default();

    println!("{}", "index".bold());
    println!("  path:      {}", db_path.display());
    if !source.is_empty() {
        println!("  source:    {}", source);
    }
    if !created.is_empty() {
        println!("  created:   {}", created);
    }
    println!("{}", "corpus".bold());
    println!("  sequences: {}", stats.records);
    println!("  terms:     {}", stats.total_terms);
    println!(
        "  lengths:   {}..{} (avg {:.1})",
        stats.min_length,
        stats.max_length,
        if stats.records > 0 {
            stats.total_terms as f64 / stats.records as f64
        } else {
            0.0
        }
    );
    Ok(())
}
