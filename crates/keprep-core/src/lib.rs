#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]

//! Corpus preparation for knowledge-embedding pretraining.
//!
//! Given a knowledge graph as integer `(head, relation, tail)` triplets and
//! one tokenized description per entity, this crate draws corrupted (negative)
//! heads and tails for every fact and writes aligned text and numeric streams
//! for a knowledge-embedding language model.
//!
//! - [`TripletStore`] - train/valid/test splits, frequency counts, true facts
//! - [`ContextIndex`] - citation-context corpus for local sampling
//! - [`CandidatePool`] - pre-filter replacement candidates
//! - [`NegativeSampler`] - filtered, fixed-size, seeded sampling
//! - [`DatasetEmitter`] - per-split emission into a dump directory
//! - [`KnowledgeEmbeddingHead`] - TransE scoring over the emitted data
//!
//! # Filtering
//!
//! A negative tail `t'` for `(h, r, t)` is never a known tail of `(h, r)` in
//! any split, and likewise for heads. The true-fact tables are therefore
//! built from the union of all three splits.
//!
//! # Example
//!
//! ```rust
//! use keprep_core::{
//!     CandidatePool, DatasetEmitter, Descriptions, EmitterConfig, Split, Triplet, TripletStore,
//! };
//!
//! let train = vec![Triplet::new(0, 0, 1), Triplet::new(1, 0, 2)];
//! let store = TripletStore::new(train, vec![], vec![]);
//! let facts = store.true_facts();
//! let descs = Descriptions::from_lines((0..4).map(|i| format!("tok{i}")).collect());
//!
//! let emitter = DatasetEmitter::new(
//!     &descs,
//!     &facts,
//!     CandidatePool::from_vocabulary(descs.len()),
//!     EmitterConfig::default(),
//! ).unwrap();
//! let (emissions, stats) = emitter.sample_split(Split::Train, store.split(Split::Train)).unwrap();
//!
//! assert_eq!(emissions.len(), 2);
//! assert_ne!(emissions[0].negative_tails, vec![1]);
//! assert_eq!(stats.tail.missing, 0);
//! ```

pub mod candidates;
pub mod context;
pub mod corpus;
pub mod descriptions;
pub mod emitter;
mod error;
pub mod npy;
pub mod sampler;
pub mod scoring;
pub mod store;
pub mod triplet;

pub use candidates::{CandidatePool, Corruption, SamplingMode};
pub use context::{Anchor, ContextEntry, ContextIndex};
pub use corpus::{Corpus, CorpusPaths};
pub use descriptions::Descriptions;
pub use emitter::{
    run, run_with_progress, DatasetEmitter, DumpDir, Emission, EmitterConfig, Progress, SplitReport,
    Stream,
};
pub use error::{Error, Result};
pub use sampler::{draw_negatives, NegativeSampler, SamplingStats, SideStats};
pub use scoring::{KeBatch, KeScores, KnowledgeEmbeddingHead};
pub use store::{FrequencyCount, FrequencyKey, Split, TripletStore, TrueFacts};
pub use triplet::{EntityId, RelationId, Triplet};
