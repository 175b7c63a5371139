//! keprep CLI - negative sampling and corpus dumps for knowledge-embedding pretraining.
//!
//! # Usage
//!
//! ```bash
//! # Sample one negative head and tail per triplet, scoped by a citation corpus
//! keprep prepare --dump-path out/ke --train train.txt --valid valid.txt --test test.txt \
//!     --ent-desc desc.bpe --json citations_per_paper_id.json
//!
//! # Corpus-wide sampling, 4 negatives per side
//! keprep prepare --dump-path out/ke -n 4 --negative-sampling-type global ...
//!
//! # Inspect inputs without writing anything
//! keprep stats --train train.txt --valid valid.txt --test test.txt --ent-desc desc.bpe
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use keprep_core::{
    run_with_progress, Corpus, CorpusPaths, EmitterConfig, Progress, SamplingMode, Split,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "keprep")]
#[command(about = "Knowledge-embedding corpus preparation", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample negatives and dump aligned training streams
    Prepare {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output directory (must not exist yet)
        #[arg(long)]
        dump_path: PathBuf,

        /// Negatives drawn per side per triplet
        #[arg(short = 'n', long, default_value = "1")]
        negative_sampling_size: usize,

        /// Candidate scoping
        #[arg(long, default_value = "local")]
        negative_sampling_type: SamplingType,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Show statistics about the inputs
    Stats {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Training triplets (`head relation tail` per line)
    #[arg(long)]
    train: PathBuf,

    /// Validation triplets
    #[arg(long)]
    valid: PathBuf,

    /// Test triplets
    #[arg(long)]
    test: PathBuf,

    /// Entity descriptions, one BPE-encoded line per entity id
    #[arg(long)]
    ent_desc: PathBuf,

    /// Citation-context corpus (JSON). Without it every entity is a candidate.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl InputArgs {
    fn paths(&self) -> CorpusPaths {
        CorpusPaths {
            train: self.train.clone(),
            valid: self.valid.clone(),
            test: self.test.clone(),
            descriptions: self.ent_desc.clone(),
            context: self.json.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SamplingType {
    /// Candidates share a document with the anchor entity
    Local,
    /// Candidates from the whole corpus
    Global,
}

impl From<SamplingType> for SamplingMode {
    fn from(t: SamplingType) -> Self {
        match t {
            SamplingType::Local => SamplingMode::Local,
            SamplingType::Global => SamplingMode::Global,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Prepare {
            inputs,
            dump_path,
            negative_sampling_size,
            negative_sampling_type,
            seed,
            threads,
        } => {
            let mut config = EmitterConfig::default()
                .with_negative_sampling_size(negative_sampling_size)
                .with_mode(negative_sampling_type.into())
                .with_seed(seed);
            config.threads = threads;
            cmd_prepare(&inputs, &dump_path, config)
        }
        Commands::Stats { inputs } => cmd_stats(&inputs),
    }
}

fn load_corpus(inputs: &InputArgs) -> Result<Corpus> {
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Loading {}...", inputs.train.display()));

    let corpus = Corpus::load(&inputs.paths()).context("Failed to load inputs")?;

    pb.finish_with_message(format!("Loaded in {:.2?}", start.elapsed()));
    Ok(corpus)
}

fn cmd_prepare(inputs: &InputArgs, dump_path: &PathBuf, config: EmitterConfig) -> Result<()> {
    config.validate()?;
    if dump_path.exists() {
        anyhow::bail!("Dump directory {} already exists", dump_path.display());
    }
    let corpus = load_corpus(inputs)?;
    println!("Load finished");

    if corpus.context.is_none() {
        warn!(
            entities = corpus.descriptions.len(),
            "no context corpus given; sampling from the whole vocabulary"
        );
    }

    let mut spinner: Option<(ProgressBar, Instant)> = None;
    run_with_progress(&corpus, dump_path, &config, |event| match event {
        Progress::Prepared { .. } => println!("Preparation finished"),
        Progress::SplitStarted { split, triplets } => {
            let pb = ProgressBar::new_spinner();
            pb.set_message(format!("Sampling {} ({} triplets)...", split, triplets));
            spinner = Some((pb, Instant::now()));
        }
        Progress::SplitFinished(report) => {
            if let Some((pb, start)) = spinner.take() {
                pb.finish_with_message(format!(
                    "{}: emitted {}/{} in {:.2?}",
                    report.split,
                    report.emitted,
                    report.processed,
                    start.elapsed()
                ));
            }
            println!("{}", report);
            println!("{} set finished", report.split);
        }
    })
    .with_context(|| format!("Failed to prepare {}", dump_path.display()))?;

    Ok(())
}

fn cmd_stats(inputs: &InputArgs) -> Result<()> {
    let corpus = load_corpus(inputs)?;
    let counts = corpus.store.frequency(keprep_core::store::DEFAULT_FREQUENCY_START);
    let facts = corpus.store.true_facts();
    let (head_keys, tail_keys) = facts.key_counts();

    println!("Corpus Statistics");
    println!("=================");
    println!("Entities:         {}", corpus.descriptions.len());
    for split in Split::ALL {
        let label = format!("{} triplets:", split);
        println!("{:<17} {}", label, corpus.store.split(split).len());
    }
    println!("Frequency keys:   {}", counts.len());
    println!("(relation, tail): {}", head_keys);
    println!("(head, relation): {}", tail_keys);
    match &corpus.context {
        Some(index) => println!("Context docs:     {}", index.len()),
        None => println!("Context docs:     none"),
    }

    Ok(())
}
