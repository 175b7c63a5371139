//! Per-split negative sampling and output emission.
//!
//! # Dump layout
//!
//! ```text
//! <dump>/count.json
//! <dump>/head/<split>.bpe       one description per emitted triplet
//! <dump>/tail/<split>.bpe
//! <dump>/negHead/<split>.bpe    k descriptions per emitted triplet, in draw order
//! <dump>/negTail/<split>.bpe
//! <dump>/relation/<split>.npy   int64, one per emitted triplet
//! <dump>/sizes/<split>.npy      int64 token estimate, one per emitted triplet
//! ```
//!
//! A triplet is emitted only when both its head and its tail corruption
//! succeed. Failed triplets are counted and dropped, never retried.
//!
//! # Determinism
//!
//! Each triplet draws from its own `XorShiftRng`, seeded from the run seed,
//! the split, and the triplet's position. Triplets are sampled in parallel
//! chunks and written back in input order, so output does not depend on the
//! number of worker threads.

use crate::candidates::{CandidatePool, Corruption, SamplingMode};
use crate::corpus::Corpus;
use crate::descriptions::{token_count, Descriptions, DEFAULT_MAX_TOKENS};
use crate::npy;
use crate::sampler::{NegativeSampler, SamplingStats};
use crate::store::{FrequencyCount, Split, TrueFacts, DEFAULT_FREQUENCY_START};
use crate::triplet::{EntityId, RelationId, Triplet};
use crate::{Error, Result};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Triplets handled per worker task.
const CHUNK_SIZE: usize = 1024;

/// Output stream kinds, one subdirectory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Head,
    Tail,
    NegHead,
    NegTail,
    Relation,
    Sizes,
}

impl Stream {
    pub const ALL: [Stream; 6] = [
        Stream::Head,
        Stream::Tail,
        Stream::NegHead,
        Stream::NegTail,
        Stream::Relation,
        Stream::Sizes,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Stream::Head => "head",
            Stream::Tail => "tail",
            Stream::NegHead => "negHead",
            Stream::NegTail => "negTail",
            Stream::Relation => "relation",
            Stream::Sizes => "sizes",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Stream::Relation | Stream::Sizes => "npy",
            _ => "bpe",
        }
    }
}

/// Emitter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Negatives drawn per side per triplet (default: 1).
    pub negative_sampling_size: usize,
    /// Candidate scoping (default: local).
    pub mode: SamplingMode,
    /// Run seed (default: 42).
    pub seed: u64,
    /// Seed value of unseen frequency keys (default: 4).
    pub frequency_start: u64,
    /// Per-entry token cap for the sizes array (default: 512).
    pub max_token_count: usize,
    /// Worker threads (None = rayon default).
    pub threads: Option<usize>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            negative_sampling_size: 1,
            mode: SamplingMode::Local,
            seed: 42,
            frequency_start: DEFAULT_FREQUENCY_START,
            max_token_count: DEFAULT_MAX_TOKENS,
            threads: None,
        }
    }
}

impl EmitterConfig {
    pub fn with_negative_sampling_size(mut self, n: usize) -> Self {
        self.negative_sampling_size = n;
        self
    }

    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_frequency_start(mut self, start: u64) -> Self {
        self.frequency_start = start;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.negative_sampling_size == 0 {
            return Err(Error::InvalidConfig(
                "negative sampling size must be at least 1".into(),
            ));
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidConfig("threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// A freshly created dump directory.
#[derive(Debug, Clone)]
pub struct DumpDir {
    root: PathBuf,
}

impl DumpDir {
    /// Create `root` and its stream subdirectories. `root` must not exist.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if root.exists() {
            return Err(Error::DumpExists(root.to_path_buf()));
        }
        fs::create_dir(root)?;
        for stream in Stream::ALL {
            fs::create_dir(root.join(stream.dir_name()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<stream>/<split>.<ext>`
    pub fn path(&self, stream: Stream, split: Split) -> PathBuf {
        self.root
            .join(stream.dir_name())
            .join(format!("{}.{}", split.as_str(), stream.extension()))
    }

    pub fn count_path(&self) -> PathBuf {
        self.root.join("count.json")
    }

    pub fn write_counts(&self, counts: &FrequencyCount) -> Result<()> {
        counts.write_json(self.count_path())
    }

    fn text_stream(&self, stream: Stream, split: Split) -> Result<BufWriter<File>> {
        Ok(BufWriter::new(File::create(self.path(stream, split))?))
    }
}

/// A triplet that passed the emission gate, with its drawn negatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub head: EntityId,
    pub relation: RelationId,
    pub tail: EntityId,
    pub negative_heads: Vec<EntityId>,
    pub negative_tails: Vec<EntityId>,
}

impl Emission {
    /// Capped token estimate over head, tail, and all negatives.
    pub fn token_size(&self, descriptions: &Descriptions, max_tokens: usize) -> Result<usize> {
        let entities = [self.head, self.tail]
            .into_iter()
            .chain(self.negative_heads.iter().copied())
            .chain(self.negative_tails.iter().copied());
        let mut total = 0;
        for e in entities {
            total += token_count(descriptions.get(e)?, max_tokens);
        }
        Ok(total)
    }
}

/// Outcome of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub split: Split,
    pub mode: SamplingMode,
    /// Triplets in the split.
    pub processed: usize,
    /// Triplets written.
    pub emitted: usize,
    pub stats: SamplingStats,
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "> {} nHead sampling = {}", self.mode, self.stats.head.succeeded)?;
        writeln!(f, "> missing nHead sampling = {}", self.stats.head.missing)?;
        writeln!(f, "> {} nTail sampling = {}", self.mode, self.stats.tail.succeeded)?;
        write!(f, "> missing nTail sampling = {}", self.stats.tail.missing)
    }
}

/// Seed for the triplet at `index` of `split`.
pub fn triplet_seed(seed: u64, split: Split, index: usize) -> u64 {
    let salt = match split {
        Split::Train => 0u64,
        Split::Valid => 1,
        Split::Test => 2,
    };
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(salt << 48)
        .wrapping_add(index as u64)
}

/// Draws negatives for each triplet of a split and writes the aligned streams.
///
/// Holds only shared references to the immutable tables, so one emitter
/// serves every worker thread.
pub struct DatasetEmitter<'a> {
    descriptions: &'a Descriptions,
    facts: &'a TrueFacts,
    pool: CandidatePool<'a>,
    config: EmitterConfig,
}

impl<'a> DatasetEmitter<'a> {
    pub fn new(
        descriptions: &'a Descriptions,
        facts: &'a TrueFacts,
        pool: CandidatePool<'a>,
        config: EmitterConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            descriptions,
            facts,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Sample both corruptions of one triplet. `None` unless both succeed.
    fn sample_triplet(
        &self,
        sampler: &mut NegativeSampler,
        split: Split,
        index: usize,
        t: &Triplet,
    ) -> Option<Emission> {
        let mut rng = XorShiftRng::seed_from_u64(triplet_seed(self.config.seed, split, index));

        let head_candidates = self.pool.candidates_for(Corruption::Head, t);
        let negative_heads = sampler.sample(
            Corruption::Head,
            &head_candidates,
            self.facts.true_heads(t.relation, t.tail),
            &mut rng,
        );
        let tail_candidates = self.pool.candidates_for(Corruption::Tail, t);
        let negative_tails = sampler.sample(
            Corruption::Tail,
            &tail_candidates,
            self.facts.true_tails(t.head, t.relation),
            &mut rng,
        );

        Some(Emission {
            head: t.head,
            relation: t.relation,
            tail: t.tail,
            negative_heads: negative_heads?,
            negative_tails: negative_tails?,
        })
    }

    /// Sample every triplet of a split. Emissions keep input order.
    pub fn sample_split(
        &self,
        split: Split,
        triplets: &[Triplet],
    ) -> Result<(Vec<Emission>, SamplingStats)> {
        let k = self.config.negative_sampling_size;
        let work = || {
            triplets
                .par_chunks(CHUNK_SIZE)
                .enumerate()
                .map(|(c, chunk)| {
                    let mut sampler = NegativeSampler::new(k);
                    let out: Vec<Option<Emission>> = chunk
                        .iter()
                        .enumerate()
                        .map(|(i, t)| {
                            self.sample_triplet(&mut sampler, split, c * CHUNK_SIZE + i, t)
                        })
                        .collect();
                    (out, sampler.stats())
                })
                .collect::<Vec<_>>()
        };

        let chunks = match self.config.threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| Error::InvalidConfig(format!("thread pool: {e}")))?
                .install(work),
            None => work(),
        };

        let mut stats = SamplingStats::default();
        let mut emissions = Vec::new();
        for (out, chunk_stats) in chunks {
            stats += chunk_stats;
            emissions.extend(out.into_iter().flatten());
        }
        Ok((emissions, stats))
    }

    /// Sample a split and write its six output files.
    pub fn emit_split(
        &self,
        dump: &DumpDir,
        split: Split,
        triplets: &[Triplet],
    ) -> Result<SplitReport> {
        debug!(
            %split,
            triplets = triplets.len(),
            k = self.config.negative_sampling_size,
            mode = %self.config.mode,
            "sampling split"
        );
        let (emissions, stats) = self.sample_split(split, triplets)?;

        let mut head = dump.text_stream(Stream::Head, split)?;
        let mut tail = dump.text_stream(Stream::Tail, split)?;
        let mut neg_head = dump.text_stream(Stream::NegHead, split)?;
        let mut neg_tail = dump.text_stream(Stream::NegTail, split)?;
        let mut relations = Vec::with_capacity(emissions.len());
        let mut sizes = Vec::with_capacity(emissions.len());

        for e in &emissions {
            writeln!(head, "{}", self.descriptions.get(e.head)?)?;
            writeln!(tail, "{}", self.descriptions.get(e.tail)?)?;
            relations.push(e.relation);
            for &n in &e.negative_heads {
                writeln!(neg_head, "{}", self.descriptions.get(n)?)?;
            }
            for &n in &e.negative_tails {
                writeln!(neg_tail, "{}", self.descriptions.get(n)?)?;
            }
            sizes.push(e.token_size(self.descriptions, self.config.max_token_count)? as i64);
        }

        for mut stream in [head, tail, neg_head, neg_tail] {
            stream.flush()?;
        }
        npy::write_i64(dump.path(Stream::Relation, split), &relations)?;
        npy::write_i64(dump.path(Stream::Sizes, split), &sizes)?;

        let report = SplitReport {
            split,
            mode: self.config.mode,
            processed: triplets.len(),
            emitted: emissions.len(),
            stats,
        };
        if report.emitted == 0 && report.processed > 0 {
            warn!(%split, processed = report.processed, "no triplet passed negative sampling");
        }
        info!(
            %split,
            emitted = report.emitted,
            processed = report.processed,
            head_missing = stats.head.missing,
            tail_missing = stats.tail.missing,
            "split finished"
        );
        Ok(report)
    }
}

/// Stage events reported by [`run_with_progress`].
#[derive(Debug)]
pub enum Progress<'a> {
    /// `count.json` is written and the split directories exist.
    Prepared { dump: &'a DumpDir, keys: usize },
    SplitStarted { split: Split, triplets: usize },
    SplitFinished(&'a SplitReport),
}

/// Full pass: frequency counts, true facts, dump directory, all three splits.
pub fn run(
    corpus: &Corpus,
    dump_path: impl AsRef<Path>,
    config: &EmitterConfig,
) -> Result<Vec<SplitReport>> {
    run_with_progress(corpus, dump_path, config, |_| {})
}

/// [`run`], calling `progress` as each stage starts or finishes.
pub fn run_with_progress<F>(
    corpus: &Corpus,
    dump_path: impl AsRef<Path>,
    config: &EmitterConfig,
    mut progress: F,
) -> Result<Vec<SplitReport>>
where
    F: FnMut(Progress<'_>),
{
    config.validate()?;
    corpus.validate()?;

    let counts = corpus.store.frequency(config.frequency_start);
    let facts = corpus.store.true_facts();
    let dump = DumpDir::create(dump_path)?;
    dump.write_counts(&counts)?;
    info!(keys = counts.len(), dump = %dump.root().display(), "preparation finished");
    progress(Progress::Prepared {
        dump: &dump,
        keys: counts.len(),
    });

    let emitter = DatasetEmitter::new(
        &corpus.descriptions,
        &facts,
        corpus.candidate_pool(config.mode),
        config.clone(),
    )?;
    let mut reports = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        let triplets = corpus.store.split(split);
        progress(Progress::SplitStarted {
            split,
            triplets: triplets.len(),
        });
        let report = emitter.emit_split(&dump, split, triplets)?;
        progress(Progress::SplitFinished(&report));
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextEntry, ContextIndex};
    use crate::store::TripletStore;

    fn descriptions(n: usize) -> Descriptions {
        Descriptions::from_lines((0..n).map(|i| format!("entity {i}")).collect())
    }

    #[test]
    fn test_config_validation() {
        assert!(EmitterConfig::default().validate().is_ok());
        assert!(EmitterConfig::default()
            .with_negative_sampling_size(0)
            .validate()
            .is_err());
        assert!(EmitterConfig::default().with_threads(0).validate().is_err());
    }

    #[test]
    fn test_global_scenario_never_samples_true_tail() {
        let train = vec![Triplet::new(0, 0, 1), Triplet::new(1, 0, 2)];
        let store = TripletStore::new(train, vec![], vec![]);
        let facts = store.true_facts();
        let descs = descriptions(4);
        let pool = CandidatePool::from_vocabulary(4);

        for seed in 0..20 {
            let config = EmitterConfig::default()
                .with_mode(SamplingMode::Global)
                .with_seed(seed);
            let emitter = DatasetEmitter::new(&descs, &facts, pool.clone(), config).unwrap();
            let (emissions, stats) = emitter
                .sample_split(Split::Train, store.split(Split::Train))
                .unwrap();

            assert_eq!(emissions.len(), 2);
            assert_eq!(stats.tail.succeeded, 2);
            assert_ne!(emissions[0].negative_tails, vec![1]);
            assert_ne!(emissions[1].negative_tails, vec![2]);
            assert_ne!(emissions[0].negative_heads, vec![0]);
            assert_ne!(emissions[1].negative_heads, vec![1]);
        }
    }

    #[test]
    fn test_gate_drops_triplet_when_one_side_fails() {
        // Tail 1 is cited by one document whose only context is head 0, so no
        // head negative survives the filter.
        let index = ContextIndex::new(vec![ContextEntry {
            paper_contexts: vec![0],
            citations: vec![1, 2],
        }]);
        let store = TripletStore::new(vec![Triplet::new(0, 0, 1)], vec![], vec![]);
        let facts = store.true_facts();
        let descs = descriptions(3);
        let pool = CandidatePool::from_context(&index, SamplingMode::Local);
        let emitter = DatasetEmitter::new(&descs, &facts, pool, EmitterConfig::default()).unwrap();

        let (emissions, stats) = emitter
            .sample_split(Split::Train, store.split(Split::Train))
            .unwrap();
        assert!(emissions.is_empty());
        assert_eq!(stats.head.missing, 1);
        // The tail side is still attempted and counted.
        assert_eq!(stats.tail.succeeded, 1);
    }

    #[test]
    fn test_sampling_independent_of_thread_count() {
        let triplets: Vec<Triplet> = (0..3000)
            .map(|i| Triplet::new(i % 50, (i % 3) as i64, (i * 7) % 50))
            .collect();
        let store = TripletStore::new(triplets, vec![], vec![]);
        let facts = store.true_facts();
        let descs = descriptions(50);
        let run = |threads| {
            let config = EmitterConfig::default()
                .with_negative_sampling_size(3)
                .with_threads(threads);
            let pool = CandidatePool::from_vocabulary(50);
            let emitter = DatasetEmitter::new(&descs, &facts, pool, config).unwrap();
            emitter.sample_split(Split::Train, store.split(Split::Train)).unwrap()
        };

        assert_eq!(run(1), run(4));
    }

    #[test]
    fn test_token_size() {
        let descs = Descriptions::from_lines(vec!["a b".into(), "c".into(), "d e f".into()]);
        let e = Emission {
            head: 0,
            relation: 0,
            tail: 1,
            negative_heads: vec![2],
            negative_tails: vec![2, 1],
        };
        assert_eq!(e.token_size(&descs, 512).unwrap(), 2 + 1 + 3 + 3 + 1);
        assert_eq!(e.token_size(&descs, 1).unwrap(), 5);
    }

    #[test]
    fn test_report_display() {
        let mut stats = SamplingStats::default();
        stats.record(Corruption::Head, true);
        stats.record(Corruption::Tail, false);
        let report = SplitReport {
            split: Split::Valid,
            mode: SamplingMode::Global,
            processed: 1,
            emitted: 0,
            stats,
        };
        let text = report.to_string();
        assert!(text.contains("> global nHead sampling = 1"));
        assert!(text.contains("> missing nTail sampling = 1"));
    }
}
