//! Filtered negative sampling.
//!
//! A negative for `(h, r, t)` is drawn from the candidate pool after removing
//! every entity known to complete the fact. When too few candidates survive
//! the filter, the request fails and is counted; it is never an error.

use crate::candidates::Corruption;
use crate::triplet::EntityId;
use rand::prelude::*;
use std::collections::HashSet;
use std::ops::AddAssign;

/// Success/failure counts for one corruption side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideStats {
    pub succeeded: u64,
    pub missing: u64,
}

impl SideStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.missing
    }
}

impl AddAssign for SideStats {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.missing += other.missing;
    }
}

/// Counters for head and tail corruption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingStats {
    pub head: SideStats,
    pub tail: SideStats,
}

impl SamplingStats {
    pub fn side(&self, target: Corruption) -> &SideStats {
        match target {
            Corruption::Head => &self.head,
            Corruption::Tail => &self.tail,
        }
    }

    pub fn record(&mut self, target: Corruption, success: bool) {
        let side = match target {
            Corruption::Head => &mut self.head,
            Corruption::Tail => &mut self.tail,
        };
        if success {
            side.succeeded += 1;
        } else {
            side.missing += 1;
        }
    }
}

impl AddAssign for SamplingStats {
    fn add_assign(&mut self, other: Self) {
        self.head += other.head;
        self.tail += other.tail;
    }
}

/// Draw `k` distinct entities from `candidates - true_set`.
///
/// `candidates` must be free of duplicates. The eligible pool keeps the
/// candidate order, so a fixed rng state and a fixed candidate order give a
/// fixed draw. Returns `None` when fewer than `k` candidates are eligible.
pub fn draw_negatives<R: Rng + ?Sized>(
    candidates: &[EntityId],
    true_set: Option<&HashSet<EntityId>>,
    k: usize,
    rng: &mut R,
) -> Option<Vec<EntityId>> {
    let eligible: Vec<EntityId> = match true_set {
        Some(known) => candidates
            .iter()
            .copied()
            .filter(|e| !known.contains(e))
            .collect(),
        None => candidates.to_vec(),
    };

    if eligible.len() < k {
        return None;
    }

    Some(eligible.choose_multiple(rng, k).copied().collect())
}

/// Fixed-size negative sampler with per-side counters.
///
/// Each worker owns one sampler; counters from several samplers are combined
/// with `+=` on [`SamplingStats`].
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    size: usize,
    stats: SamplingStats,
}

impl NegativeSampler {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            stats: SamplingStats::default(),
        }
    }

    /// Number of negatives drawn per request.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Draw negatives to replace `target`, recording the outcome.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        target: Corruption,
        candidates: &[EntityId],
        true_set: Option<&HashSet<EntityId>>,
        rng: &mut R,
    ) -> Option<Vec<EntityId>> {
        let drawn = draw_negatives(candidates, true_set, self.size, rng);
        self.stats.record(target, drawn.is_some());
        drawn
    }

    pub fn stats(&self) -> SamplingStats {
        self.stats
    }
}
