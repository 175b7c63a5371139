//! Candidate replacement entities for a corruption request.

use crate::context::{Anchor, ContextIndex};
use crate::triplet::{EntityId, Triplet};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Which side of a triplet gets replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corruption {
    Head,
    Tail,
}

impl Corruption {
    /// The side left fixed when corrupting `self` on `triplet`.
    pub fn anchor(&self, triplet: &Triplet) -> Anchor {
        match self {
            Corruption::Head => Anchor::Tail(triplet.tail),
            Corruption::Tail => Anchor::Head(triplet.head),
        }
    }
}

/// How candidates are scoped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SamplingMode {
    /// Only entities sharing a document with the anchor.
    #[default]
    Local,
    /// Every entity of the matching role across the whole corpus.
    Global,
}

impl SamplingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingMode::Local => "local",
            SamplingMode::Global => "global",
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(SamplingMode::Local),
            "global" => Ok(SamplingMode::Global),
            other => Err(format!("unknown sampling mode: {other} (expected local or global)")),
        }
    }
}

#[derive(Debug, Clone)]
enum Source<'a> {
    Context(&'a ContextIndex),
    /// Whole vocabulary `[0, n)`, used when no context corpus is supplied.
    Vocabulary(Vec<EntityId>),
}

/// Computes the pre-filter candidate set for each corruption request.
///
/// Candidate lists are sorted and free of duplicates, which fixes the pool
/// order seen by the sampler.
#[derive(Debug, Clone)]
pub struct CandidatePool<'a> {
    source: Source<'a>,
    mode: SamplingMode,
}

impl<'a> CandidatePool<'a> {
    /// Candidates drawn from a context corpus.
    pub fn from_context(index: &'a ContextIndex, mode: SamplingMode) -> Self {
        Self {
            source: Source::Context(index),
            mode,
        }
    }

    /// Every entity id below `num_entities` is a candidate.
    pub fn from_vocabulary(num_entities: usize) -> Self {
        Self {
            source: Source::Vocabulary((0..num_entities).collect()),
            mode: SamplingMode::Global,
        }
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn has_context(&self) -> bool {
        matches!(self.source, Source::Context(_))
    }

    /// Candidates to replace `target` in `triplet`.
    pub fn candidates_for(&self, target: Corruption, triplet: &Triplet) -> Cow<'_, [EntityId]> {
        match (&self.source, self.mode) {
            (Source::Context(index), SamplingMode::Local) => {
                Cow::Owned(index.candidates_for_context(target.anchor(triplet)))
            }
            (Source::Context(index), SamplingMode::Global) => {
                Cow::Borrowed(index.candidates_global(target))
            }
            (Source::Vocabulary(all), _) => Cow::Borrowed(all.as_slice()),
        }
    }
}
