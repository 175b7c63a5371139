//! Triplet type and the integer triplet file format.
//!
//! Each line of a triplet file holds `head relation tail` as
//! whitespace-separated integers. Entity ids index the description file;
//! relation ids are dense and non-negative, with `-r - 1` reserved for the
//! inverse direction (see [`crate::store::FrequencyKey`]).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dense entity id, equal to the entity's line number in the description file.
pub type EntityId = usize;

/// Relation id. Signed so that inverse relations (`-r - 1`) share the type.
pub type RelationId = i64;

/// A `(head, relation, tail)` fact.
///
/// # Example
///
/// ```rust
/// use keprep_core::Triplet;
///
/// let t = Triplet::parse_line("3 0 7").unwrap();
/// assert_eq!(t, Triplet::new(3, 0, 7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triplet {
    pub head: EntityId,
    pub relation: RelationId,
    pub tail: EntityId,
}

impl Triplet {
    pub fn new(head: EntityId, relation: RelationId, tail: EntityId) -> Self {
        Self {
            head,
            relation,
            tail,
        }
    }

    /// Parse a single `head relation tail` line.
    ///
    /// Returns `None` unless the line holds exactly three non-negative
    /// integers. Negative relation ids are reserved for inverse keys.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let head = fields.next()?.parse().ok()?;
        let relation: RelationId = fields.next()?.parse().ok()?;
        let tail = fields.next()?.parse().ok()?;
        if relation < 0 || fields.next().is_some() {
            return None;
        }
        Some(Self::new(head, relation, tail))
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.head, self.relation, self.tail)
    }
}

/// Read every triplet from `reader`. `path` is only used in error messages.
pub fn read_triplets<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Triplet>> {
    let mut triplets = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let triplet = Triplet::parse_line(&line).ok_or_else(|| Error::ParseTriplet {
            path: path.to_path_buf(),
            line: idx + 1,
            content: line.clone(),
        })?;
        triplets.push(triplet);
    }
    Ok(triplets)
}

/// Load a triplet file.
pub fn load_triplets(path: impl AsRef<Path>) -> Result<Vec<Triplet>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)?;
    read_triplets(BufReader::new(file), path)
}
