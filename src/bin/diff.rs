//! Schema Diff CLI
//!
//! Compares the schema of two documents (or two saved snapshots) and reports
//! added, removed and modified fields, flagging breaking changes.
//!
//! Usage:
//!   schema-diff old/users.json new/users.json
//!   schema-diff --snapshots v1.schema.json v2.schema.json --base-version 1.4.0
//!
//! Exit codes: 0 compatible, 1 error (or any change with --strict), 2 breaking changes.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use schema_profiler::version::{SchemaVersion, VersionBump};
use schema_profiler::{
    ChangeType, ProfilerConfig, SchemaAnalyzer, SchemaDiff, SchemaDiffer, SchemaSnapshot, SourceFormat,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-diff")]
#[command(about = "Detect schema drift between two documents or snapshots")]
struct Cli {
    /// Previous document or snapshot
    old: PathBuf,

    /// Current document or snapshot
    new: PathBuf,

    /// Treat both inputs as saved snapshot JSON
    #[arg(long)]
    snapshots: bool,

    /// Source format of both documents; guessed from the extension by default
    #[arg(short, long)]
    format: Option<String>,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Version of the old schema, to suggest the next one
    #[arg(short, long)]
    base_version: Option<String>,

    /// Print the diff as JSON
    #[arg(long)]
    json: bool,

    /// Fail on any changes (not just breaking)
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(diff) => {
            if diff.is_breaking() {
                eprintln!("\n❌ BREAKING CHANGES DETECTED");
                std::process::exit(2);
            } else if diff.has_changes() && cli.strict {
                eprintln!("\n⚠️  Changes detected (strict mode) - Review required");
                std::process::exit(1);
            } else if diff.has_changes() {
                eprintln!("\n⚠️  Non-breaking changes detected");
            } else {
                eprintln!("\n✅ No drift detected");
            }
        }
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load(path: &Path, cli: &Cli, analyzer: &SchemaAnalyzer, format: Option<SourceFormat>) -> anyhow::Result<SchemaSnapshot> {
    let snapshot = if cli.snapshots {
        SchemaSnapshot::load(path)
    } else {
        analyzer.analyze_path(path, format)
    };
    snapshot.with_context(|| format!("loading {}", path.display()))
}

fn run(cli: &Cli) -> anyhow::Result<SchemaDiff> {
    let config = ProfilerConfig::load_from(cli.config.as_deref())?;
    let analyzer = SchemaAnalyzer::new(config)?;
    let format = cli
        .format
        .as_deref()
        .map(str::parse::<SourceFormat>)
        .transpose()?;

    let old = load(&cli.old, cli, &analyzer, format)?;
    let new = load(&cli.new, cli, &analyzer, format)?;
    for (path, snapshot) in [(&cli.old, &old), (&cli.new, &new)] {
        if !snapshot.verify_hash() {
            eprintln!("⚠️  {}: stored schema hash does not match its fields", path.display());
        }
    }

    let diff = SchemaDiffer::new().diff(&old, &new);
    let bump = VersionBump::from_diff(&diff);
    let next_version = cli
        .base_version
        .as_deref()
        .map(SchemaVersion::parse)
        .transpose()?
        .map(|base| base.next(bump).with_hash(diff.new_hash.clone()));

    if cli.json {
        let report = serde_json::json!({
            "diff": diff,
            "suggested_bump": bump,
            "next_version": next_version,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(diff);
    }

    println!("🔍 Schema Diff\n");
    println!("   Old: {} ({})", cli.old.display(), diff.old_hash);
    println!("   New: {} ({})\n", cli.new.display(), diff.new_hash);

    for (change_type, icon) in [
        (ChangeType::Removed, "➖"),
        (ChangeType::Added, "➕"),
        (ChangeType::Modified, "✏️ "),
    ] {
        for change in diff.changes_of(change_type) {
            let breaking = if change.is_breaking { "  [BREAKING]" } else { "" };
            println!("   {} {} {}{}", icon, change_type, change.field_path, breaking);
            for detail in &change.details {
                println!("        {}", detail);
            }
        }
    }

    println!("\n📊 {}", diff.summary_line());
    println!("   Suggested bump: {}", bump);
    if let Some(version) = next_version {
        println!(
            "   Next version:   {} (from {})",
            version,
            version.previous_version.as_deref().unwrap_or("-")
        );
    }
    Ok(diff)
}
