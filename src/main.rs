#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod csv_reader;
mod ml;
mod preprocess;
mod structs;

use clap::{Parser, Subcommand};
use ml::figures::{ConfusionFigure, TrajectoryFigure};
use ml::output::accuracy_line;
use ml::pipeline::PipelineConfig;
use preprocess::SAMPLE_DELIMITER;
use std::path::{Path, PathBuf};
use structs::{CountsTable, Result, TyperError};

/// Celltyper - cell type classification and trajectory from single-cell counts
#[derive(Parser, Debug)]
#[command(name = "celltyper")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify cell types, write reports, confusion matrices and the trajectory
    Run {
        /// Counts CSV/TSV: genes as rows, samples as columns
        #[arg(short, long)]
        counts: PathBuf,

        /// Output directory for reports and figures
        #[arg(short, long, default_value = "./celltyper_output")]
        output_dir: PathBuf,

        /// Treat input as TSV instead of CSV
        #[arg(long)]
        tsv: bool,

        /// Sample identifiers are truncated at the first occurrence of this character
        #[arg(long, default_value_t = SAMPLE_DELIMITER)]
        delimiter: char,

        /// Fraction of samples held out for testing
        #[arg(long, default_value = "0.25")]
        test_fraction: f64,

        /// Seed for the train/test shuffle
        #[arg(long, default_value = "1")]
        split_seed: u64,

        /// Seed for the random forest
        #[arg(long, default_value = "42")]
        model_seed: u64,

        /// Number of random forest trees
        #[arg(long, default_value = "1000")]
        trees: usize,

        /// Train on standardized features instead of raw counts
        #[arg(long)]
        scaled: bool,

        /// Skip the trajectory embedding
        #[arg(long)]
        no_trajectory: bool,
    },

    /// Clean the counts and write the labelled sample table
    Preprocess {
        /// Counts CSV/TSV: genes as rows, samples as columns
        #[arg(short, long)]
        counts: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "samples.csv")]
        output: PathBuf,

        /// Treat input as TSV instead of CSV
        #[arg(long)]
        tsv: bool,

        /// Sample identifiers are truncated at the first occurrence of this character
        #[arg(long, default_value_t = SAMPLE_DELIMITER)]
        delimiter: char,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Commands::Run {
            counts,
            output_dir,
            tsv,
            delimiter,
            test_fraction,
            split_seed,
            model_seed,
            trees,
            scaled,
            no_trajectory,
        }) => run_classify(
            &counts,
            &output_dir,
            &PipelineConfig {
                test_fraction,
                split_seed,
                model_seed,
                n_trees: trees,
                use_scaled: scaled,
                trajectory: !no_trajectory,
                delimiter,
            },
            tsv,
        ),

        Some(Commands::Preprocess {
            counts,
            output,
            tsv,
            delimiter,
        }) => run_preprocess(&counts, &output, delimiter, tsv),

        None => {
            eprintln!("No subcommand provided. Use 'celltyper run' or 'celltyper preprocess'.");
            eprintln!("Run 'celltyper --help' for usage information.");
            std::process::exit(1);
        }
    }
}

fn load_counts(path: &Path, tsv: bool) -> Result<CountsTable> {
    if !path.exists() {
        return Err(TyperError::Config(format!(
            "Counts file not found: {}",
            path.display()
        )));
    }

    log::info!("Loading counts: {}", path.display());
    let counts = CountsTable::from_file(path, tsv)?;
    log::info!(
        "Loaded {} genes x {} samples",
        counts.n_genes(),
        counts.n_samples()
    );
    Ok(counts)
}

/// Run classification and the trajectory, then write every output file
fn run_classify(counts_path: &Path, output_dir: &Path, config: &PipelineConfig, tsv: bool) -> Result<()> {
    let counts = load_counts(counts_path, tsv)?;
    std::fs::create_dir_all(output_dir)?;

    let result = ml::pipeline::run_pipeline(&counts, config)?;
    log::info!(
        "{} of {} classifiers succeeded",
        result.n_succeeded(),
        result.outcomes.len()
    );

    for outcome in &result.outcomes {
        match &outcome.result {
            Ok(eval) => {
                println!("{}", accuracy_line(&eval.label, eval.accuracy));
                println!("{}", eval.report);
            }
            Err(e) => println!("{} failed: {e}\n", outcome.label()),
        }
    }

    log::info!("Writing output files...");
    ml::output::write_report(output_dir, &result.outcomes)?;
    ml::output::write_metrics_json(
        output_dir,
        &result.samples,
        result.inputs.train_indices.len(),
        result.inputs.test_indices.len(),
        &result.outcomes,
    )?;
    ml::output::write_categories(output_dir, &result.samples.categories)?;
    ConfusionFigure::from_outcomes(&result.outcomes)
        .render_svg(&output_dir.join("confusion_matrices.svg"))?;

    let mut trajectory_written = false;
    if let Some(embedding) = &result.embedding {
        ml::output::write_embedding(output_dir, &result.samples, embedding)?;
        match TrajectoryFigure::new(embedding).render_svg(&output_dir.join("trajectory.svg")) {
            Ok(()) => trajectory_written = true,
            Err(e) => log::warn!("Trajectory figure failed: {e}"),
        }
    }

    eprintln!("Output written to {}", output_dir.display());
    eprintln!("  - report.txt");
    eprintln!("  - metrics.json");
    eprintln!("  - categories.csv");
    eprintln!("  - confusion_matrices.svg");
    if result.embedding.is_some() {
        eprintln!("  - embedding.csv");
    }
    if trajectory_written {
        eprintln!("  - trajectory.svg");
    }

    Ok(())
}

/// Clean and reorient the counts without training anything
fn run_preprocess(counts_path: &Path, output: &Path, delimiter: char, tsv: bool) -> Result<()> {
    let counts = load_counts(counts_path, tsv)?;
    let samples = ml::pipeline::prepare(&counts, delimiter)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    ml::output::write_sample_table(output, &samples)?;

    eprintln!(
        "Wrote {} samples x {} genes to {}",
        samples.n_samples(),
        samples.n_features(),
        output.display()
    );
    Ok(())
}
