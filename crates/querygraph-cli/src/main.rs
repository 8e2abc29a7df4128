//! QueryGraph CLI
//!
//! - `import`: convert a KGReasoning directory into a QueryGraph dataset
//! - `shapes`: list the query shapes the importer understands

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use querygraph_dsl::QueryShape;
use querygraph_ingest_kgreasoning::{
    import_kgreasoning, ImportConfig, ImportReport, RecordFormat, Split,
};
use querygraph_storage::Dataset;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "querygraph")]
#[command(author, version, about = "QueryGraph: query datasets for knowledge graph reasoning")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a KGReasoning (BetaE / Query2Box) dataset directory.
    ///
    /// Writes the id mappings, the graph splits and one query batch per
    /// (shape, split) into DATASET, which must not exist yet.
    Import {
        /// Directory with id2ent.pkl, id2rel.pkl, *.txt and *-queries.pkl
        source: PathBuf,
        /// Output dataset directory
        dataset: PathBuf,
        /// Skip unknown query shapes with a warning instead of failing
        #[arg(long)]
        lenient: bool,
        /// Query split to convert (repeatable; default: all)
        #[arg(long = "split", value_name = "SPLIT")]
        splits: Vec<Split>,
        /// Record encoding: proto or json
        #[arg(long, default_value = "proto")]
        format: RecordFormat,
    },

    /// List supported query shapes and their signatures.
    Shapes,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import {
            source,
            dataset,
            lenient,
            splits,
            format,
        } => {
            let config = ImportConfig {
                lenient,
                splits: if splits.is_empty() {
                    Split::ALL.to_vec()
                } else {
                    splits
                },
                format,
            };
            cmd_import(&source, &dataset, &config)?;
        }
        Commands::Shapes => cmd_shapes(),
    }
    Ok(())
}

fn cmd_import(source: &Path, dataset: &Path, config: &ImportConfig) -> Result<()> {
    let report = import_kgreasoning(source, &Dataset::new(dataset), config).with_context(|| {
        format!(
            "failed to import {} into {}",
            source.display(),
            dataset.display()
        )
    })?;
    print_report(&report);
    eprintln!(
        "{} imported {} queries into {}",
        "ok".green().bold(),
        report.num_queries(),
        dataset.display().to_string().bold()
    );
    Ok(())
}

fn print_report(report: &ImportReport) {
    for split in &report.splits {
        println!("{}", split.split.to_string().bold());
        for shape in &split.shapes {
            println!(
                "  {:<8} {:>8}  {}",
                shape.shape.name(),
                shape.stats.count,
                shape.stats.hash.dimmed()
            );
        }
        for signature in &split.skipped {
            println!("  {} {signature}", "skipped".yellow());
        }
    }
}

fn cmd_shapes() {
    for shape in QueryShape::ALL {
        println!(
            "{:<8} {}  (triples={}, diameter={})",
            shape.name().bold(),
            shape.signature(),
            shape.num_triples(),
            shape.diameter()
        );
    }
}
