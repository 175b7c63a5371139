//! Triplet splits, frequency counts, and the true-fact tables.
//!
//! Everything here is built once from the union of the three splits and is
//! immutable afterwards. Workers share it by reference.

use crate::triplet::{load_triplets, EntityId, RelationId, Triplet};
use crate::Result;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Default seed value for unseen frequency keys.
pub const DEFAULT_FREQUENCY_START: u64 = 4;

/// One of the three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// All splits in processing order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    /// File stem used for the split's outputs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The train/valid/test triplets.
#[derive(Debug, Clone, Default)]
pub struct TripletStore {
    train: Vec<Triplet>,
    valid: Vec<Triplet>,
    test: Vec<Triplet>,
}

impl TripletStore {
    pub fn new(train: Vec<Triplet>, valid: Vec<Triplet>, test: Vec<Triplet>) -> Self {
        Self { train, valid, test }
    }

    /// Load the three split files.
    pub fn load(
        train: impl AsRef<Path>,
        valid: impl AsRef<Path>,
        test: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self::new(
            load_triplets(train)?,
            load_triplets(valid)?,
            load_triplets(test)?,
        ))
    }

    pub fn split(&self, split: Split) -> &[Triplet] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    /// Iterate the union of all splits (train, then valid, then test).
    pub fn all(&self) -> impl Iterator<Item = &Triplet> {
        self.train.iter().chain(&self.valid).chain(&self.test)
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frequency counts over the union of all splits.
    pub fn frequency(&self, start: u64) -> FrequencyCount {
        FrequencyCount::from_triplets(self.all(), start)
    }

    /// True-fact tables over the union of all splits.
    pub fn true_facts(&self) -> TrueFacts {
        TrueFacts::from_triplets(self.all())
    }
}

/// Composite `(entity, relation)` key used for frequency counting.
///
/// Serialises as the string `"entity,relation"`. Tail keys carry the inverse
/// relation `-relation - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrequencyKey {
    pub entity: EntityId,
    pub relation: RelationId,
}

impl FrequencyKey {
    pub fn new(entity: EntityId, relation: RelationId) -> Self {
        Self { entity, relation }
    }

    /// Key for the `(head, relation)` side of a triplet.
    pub fn head_side(t: &Triplet) -> Self {
        Self::new(t.head, t.relation)
    }

    /// Key for the `(tail, inverse relation)` side of a triplet.
    pub fn tail_side(t: &Triplet) -> Self {
        Self::new(t.tail, inverse_relation(t.relation))
    }
}

impl fmt::Display for FrequencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.entity, self.relation)
    }
}

/// `-r - 1`: maps relation ids `0, 1, 2, ..` onto `-1, -2, -3, ..`.
pub fn inverse_relation(relation: RelationId) -> RelationId {
    -relation - 1
}

/// Occurrence counts per [`FrequencyKey`]. Exported metadata only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyCount {
    counts: BTreeMap<FrequencyKey, u64>,
}

impl FrequencyCount {
    /// Count both sides of every triplet; unseen keys start at `start`.
    pub fn from_triplets<'a>(triplets: impl IntoIterator<Item = &'a Triplet>, start: u64) -> Self {
        let mut counts = BTreeMap::new();
        for t in triplets {
            for key in [FrequencyKey::head_side(t), FrequencyKey::tail_side(t)] {
                counts
                    .entry(key)
                    .and_modify(|c| *c += 1)
                    .or_insert(start);
            }
        }
        Self { counts }
    }

    pub fn get(&self, key: &FrequencyKey) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrequencyKey, &u64)> {
        self.counts.iter()
    }

    /// Write as a JSON object (`count.json`).
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

impl Serialize for FrequencyCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (key, count) in &self.counts {
            map.serialize_entry(&key.to_string(), count)?;
        }
        map.end()
    }
}

/// Lookup tables of known true heads and tails.
///
/// Built from the union of all splits so that a fact from any split is never
/// drawn as a negative for any other split.
#[derive(Debug, Clone, Default)]
pub struct TrueFacts {
    /// `(relation, tail)` -> true heads.
    heads: HashMap<(RelationId, EntityId), HashSet<EntityId>>,
    /// `(head, relation)` -> true tails.
    tails: HashMap<(EntityId, RelationId), HashSet<EntityId>>,
}

impl TrueFacts {
    pub fn from_triplets<'a>(triplets: impl IntoIterator<Item = &'a Triplet>) -> Self {
        let mut heads: HashMap<_, HashSet<_>> = HashMap::new();
        let mut tails: HashMap<_, HashSet<_>> = HashMap::new();
        for t in triplets {
            heads
                .entry((t.relation, t.tail))
                .or_default()
                .insert(t.head);
            tails
                .entry((t.head, t.relation))
                .or_default()
                .insert(t.tail);
        }
        Self { heads, tails }
    }

    /// Known heads `h` with `(h, relation, tail)` true.
    pub fn true_heads(&self, relation: RelationId, tail: EntityId) -> Option<&HashSet<EntityId>> {
        self.heads.get(&(relation, tail))
    }

    /// Known tails `t` with `(head, relation, t)` true.
    pub fn true_tails(&self, head: EntityId, relation: RelationId) -> Option<&HashSet<EntityId>> {
        self.tails.get(&(head, relation))
    }

    /// Whether `triplet` is a known fact.
    pub fn contains(&self, triplet: &Triplet) -> bool {
        self.true_tails(triplet.head, triplet.relation)
            .is_some_and(|tails| tails.contains(&triplet.tail))
    }

    /// Number of distinct `(relation, tail)` and `(head, relation)` keys.
    pub fn key_counts(&self) -> (usize, usize) {
        (self.heads.len(), self.tails.len())
    }
}
