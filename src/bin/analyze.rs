//! Schema Analysis CLI
//!
//! Profiles a document, or every supported document under a directory, and
//! prints the inferred field catalog.
//!
//! Usage:
//!   schema-analyze data/users.json
//!   schema-analyze exports/ --json --output snapshots/
//!   schema-analyze feed.txt --format jsonl

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use schema_profiler::{ProfilerConfig, SchemaAnalyzer, SchemaSnapshot, SourceFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-analyze")]
#[command(about = "Infer field types, semantics, PII and quality statistics from documents")]
struct Cli {
    /// Document or directory to analyze
    path: PathBuf,

    /// Source format (json, jsonl, xml, csv, tsv, sqlite); guessed from the extension by default
    #[arg(short, long)]
    format: Option<String>,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Print snapshots as JSON
    #[arg(long)]
    json: bool,

    /// Write snapshot JSON here (a directory when analyzing a directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every document was analyzed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = ProfilerConfig::load_from(cli.config.as_deref())?;
    let analyzer = SchemaAnalyzer::new(config)?;
    let format = cli
        .format
        .as_deref()
        .map(str::parse::<SourceFormat>)
        .transpose()?;

    if cli.path.is_dir() {
        analyze_directory(&analyzer, &cli, format)
    } else {
        let snapshot = analyzer
            .analyze_path(&cli.path, format)
            .with_context(|| format!("analyzing {}", cli.path.display()))?;
        report(&cli.path, &snapshot, cli.json)?;
        if let Some(output) = &cli.output {
            snapshot.save(output)?;
            eprintln!("💾 Snapshot written to {}", output.display());
        }
        Ok(true)
    }
}

fn analyze_directory(analyzer: &SchemaAnalyzer, cli: &Cli, format: Option<SourceFormat>) -> anyhow::Result<bool> {
    if let Some(output) = &cli.output {
        fs::create_dir_all(output)?;
    }

    let mut analyzed = 0usize;
    let mut failed = 0usize;

    for entry in walkdir::WalkDir::new(&cli.path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        // Skip files we cannot read unless a format was forced
        if format.is_none() && SourceFormat::from_path(path).is_err() {
            continue;
        }

        match analyzer.analyze_path(path, format) {
            Ok(snapshot) => {
                analyzed += 1;
                report(path, &snapshot, cli.json)?;
                if let Some(output) = &cli.output {
                    let name = path
                        .file_name()
                        .ok_or_else(|| anyhow!("no file name in {}", path.display()))?;
                    let target = output.join(format!("{}.schema.json", name.to_string_lossy()));
                    snapshot.save(&target)?;
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("❌ {}: {}", path.display(), e);
            }
        }
    }

    eprintln!("\n📊 {} analyzed, {} failed", analyzed, failed);
    Ok(failed == 0)
}

fn report(path: &Path, snapshot: &SchemaSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", snapshot.to_json()?);
        return Ok(());
    }

    let stats = snapshot.stats();
    println!("📄 {} ({})", path.display(), snapshot.source_format());
    println!("   Records:  {}", snapshot.total_records_observed());
    println!("   Fields:   {} ({} PII, {} nullable, {} arrays)",
        stats.total_fields, stats.pii_fields, stats.nullable_fields, stats.array_fields);
    println!("   Hash:     {}", snapshot.schema_hash());
    if snapshot.is_truncated() {
        let ingest = snapshot.ingest();
        println!(
            "   ⚠️  Truncated (record limit hit: {}, subtrees pruned: {})",
            ingest.records_truncated, ingest.depth_pruned
        );
    }
    println!();

    for field in snapshot.fields() {
        let semantic = field
            .semantic_type
            .map(|s| format!(" [{}]", s))
            .unwrap_or_default();
        let pii = field
            .pii_type
            .map(|p| format!(" 🔒 {}", p))
            .unwrap_or_default();
        println!(
            "   {:<40} {:<8} {:>5.1}%{}{}  nulls {:.1}%  distinct {}",
            field.field_path,
            field.data_type.to_string(),
            field.type_confidence,
            semantic,
            pii,
            field.null_percentage,
            field.distinct_count
        );
    }
    println!();
    Ok(())
}
