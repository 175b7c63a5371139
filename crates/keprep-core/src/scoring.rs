//! Knowledge-embedding head: TransE scoring over encoded descriptions.
//!
//! The emitter produces description streams; an encoder (out of scope here)
//! turns each into a vector. This head consumes those vectors:
//!
//! ```text
//! score(h, r, t) = gamma - ||h + r - t||_2
//! ```
//!
//! Positive scores average the two relation-conditioned views:
//! `(score(h_r, r, t) + score(h, r, t_r)) / 2`. Negative tails score as
//! `score(h_r, r, t')` and negative heads as `score(h', r, t_r)`.
//!
//! Only negative tails feed the loss by default. Negative heads are still
//! sampled and written by the emitter; set `use_negative_heads` to include
//! them.

use crate::triplet::RelationId;
use crate::{Error, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis};
use rand::prelude::*;
use rand_xorshift::XorShiftRng;

/// Added to gamma when sizing the relation embedding init range.
const EPSILON_RANGE: f32 = 2.0;

/// One batch of encoded triplets. `B` = batch, `K` = negatives, `D` = dim.
#[derive(Debug, Clone, Copy)]
pub struct KeBatch<'a> {
    /// `(B, D)`
    pub heads: ArrayView2<'a, f32>,
    /// `(B, D)`
    pub tails: ArrayView2<'a, f32>,
    /// Relation-conditioned head encodings, `(B, D)`.
    pub heads_r: ArrayView2<'a, f32>,
    /// Relation-conditioned tail encodings, `(B, D)`.
    pub tails_r: ArrayView2<'a, f32>,
    /// `(B, K, D)`
    pub negative_heads: ArrayView3<'a, f32>,
    /// `(B, K, D)`
    pub negative_tails: ArrayView3<'a, f32>,
    /// `B` relation ids.
    pub relations: &'a [RelationId],
    /// Encoded relation descriptions, `(B, D)`. Replaces the embedding table.
    pub relation_desc: Option<ArrayView2<'a, f32>>,
}

/// Scores for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct KeScores {
    /// `(B,)`
    pub positive: Array1<f32>,
    /// `(B, K)`, or `(B, 2K)` with negative heads first when enabled.
    pub negative: Array2<f32>,
}

/// TransE knowledge-embedding head.
#[derive(Debug, Clone)]
pub struct KnowledgeEmbeddingHead {
    gamma: f32,
    relation_emb: Array2<f32>,
    use_negative_heads: bool,
}

impl KnowledgeEmbeddingHead {
    /// Relation table initialised uniformly in `±(gamma + 2) / dim`.
    pub fn new(num_relations: usize, dim: usize, gamma: f32, seed: u64) -> Self {
        let range = (gamma + EPSILON_RANGE) / dim.max(1) as f32;
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let relation_emb =
            Array2::from_shape_fn((num_relations, dim), |_| rng.random_range(-range..=range));
        Self {
            gamma,
            relation_emb,
            use_negative_heads: false,
        }
    }

    /// Use a pre-trained relation table.
    pub fn from_relation_embeddings(relation_emb: Array2<f32>, gamma: f32) -> Self {
        Self {
            gamma,
            relation_emb,
            use_negative_heads: false,
        }
    }

    pub fn with_negative_heads(mut self, enabled: bool) -> Self {
        self.use_negative_heads = enabled;
        self
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn dim(&self) -> usize {
        self.relation_emb.ncols()
    }

    pub fn num_relations(&self) -> usize {
        self.relation_emb.nrows()
    }

    pub fn relation_embeddings(&self) -> &Array2<f32> {
        &self.relation_emb
    }

    /// `gamma - ||h + r - t||_2`
    pub fn transe(&self, h: ArrayView1<f32>, r: ArrayView1<f32>, t: ArrayView1<f32>) -> f32 {
        let sum_sq: f32 = h
            .iter()
            .zip(r.iter())
            .zip(t.iter())
            .map(|((h, r), t)| {
                let d = h + r - t;
                d * d
            })
            .sum();
        self.gamma - sum_sq.sqrt()
    }

    /// Positive and negative scores for a batch.
    pub fn forward(&self, batch: &KeBatch<'_>) -> Result<KeScores> {
        let (b, k) = self.check_batch(batch)?;
        let rels = self.relation_rows(batch)?;

        let positive = Array1::from_shape_fn(b, |i| {
            let r = rels.row(i);
            (self.transe(batch.heads_r.row(i), r, batch.tails.row(i))
                + self.transe(batch.heads.row(i), r, batch.tails_r.row(i)))
                / 2.0
        });

        let tail_scores = Array2::from_shape_fn((b, k), |(i, j)| {
            self.transe(
                batch.heads_r.row(i),
                rels.row(i),
                batch.negative_tails.slice(s![i, j, ..]),
            )
        });

        let negative = if self.use_negative_heads {
            let head_scores = self.negative_head_matrix(batch, &rels, b, k);
            ndarray::concatenate(Axis(1), &[head_scores.view(), tail_scores.view()])
                .map_err(|e| Error::Shape(e.to_string()))?
        } else {
            tail_scores
        };

        Ok(KeScores { positive, negative })
    }

    /// Negative-head scores `(B, K)`, regardless of `use_negative_heads`.
    pub fn negative_head_scores(&self, batch: &KeBatch<'_>) -> Result<Array2<f32>> {
        let (b, k) = self.check_batch(batch)?;
        let rels = self.relation_rows(batch)?;
        Ok(self.negative_head_matrix(batch, &rels, b, k))
    }

    fn negative_head_matrix(
        &self,
        batch: &KeBatch<'_>,
        rels: &Array2<f32>,
        b: usize,
        k: usize,
    ) -> Array2<f32> {
        Array2::from_shape_fn((b, k), |(i, j)| {
            self.transe(
                batch.negative_heads.slice(s![i, j, ..]),
                rels.row(i),
                batch.tails_r.row(i),
            )
        })
    }

    /// Relation vectors per batch row, from descriptions or the table.
    fn relation_rows(&self, batch: &KeBatch<'_>) -> Result<Array2<f32>> {
        if let Some(desc) = batch.relation_desc {
            return Ok(desc.to_owned());
        }
        let mut indices = Vec::with_capacity(batch.relations.len());
        for &r in batch.relations {
            let idx = usize::try_from(r)
                .ok()
                .filter(|&i| i < self.num_relations())
                .ok_or_else(|| {
                    Error::Shape(format!(
                        "relation {r} outside embedding table of {} rows",
                        self.num_relations()
                    ))
                })?;
            indices.push(idx);
        }
        Ok(self.relation_emb.select(Axis(0), &indices))
    }

    /// Returns `(B, K)` after checking every tensor against it and `D`.
    fn check_batch(&self, batch: &KeBatch<'_>) -> Result<(usize, usize)> {
        let d = self.dim();
        let b = batch.relations.len();
        let k = batch.negative_tails.dim().1;

        for (name, view) in [
            ("heads", batch.heads),
            ("tails", batch.tails),
            ("heads_r", batch.heads_r),
            ("tails_r", batch.tails_r),
        ] {
            if view.dim() != (b, d) {
                return Err(Error::Shape(format!(
                    "{name} is {:?}, expected ({b}, {d})",
                    view.dim()
                )));
            }
        }
        for (name, view) in [
            ("negative_heads", batch.negative_heads),
            ("negative_tails", batch.negative_tails),
        ] {
            if view.dim() != (b, k, d) {
                return Err(Error::Shape(format!(
                    "{name} is {:?}, expected ({b}, {k}, {d})",
                    view.dim()
                )));
            }
        }
        if let Some(desc) = batch.relation_desc {
            if desc.dim() != (b, d) {
                return Err(Error::Shape(format!(
                    "relation_desc is {:?}, expected ({b}, {d})",
                    desc.dim()
                )));
            }
        }
        Ok((b, k))
    }
}
