//! Entity description table.
//!
//! One line per entity; the line number is the entity id. Lines are already
//! tokenized (BPE) and length-bounded upstream.

use crate::triplet::EntityId;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Cap applied to per-entry token counts in the `sizes` arrays.
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Read-only description lines, indexed by entity id.
#[derive(Debug, Clone, Default)]
pub struct Descriptions {
    lines: Vec<String>,
}

impl Descriptions {
    /// Build from lines without terminators.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { lines })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, entity: EntityId) -> Result<&str> {
        self.lines
            .get(entity)
            .map(String::as_str)
            .ok_or_else(|| Error::EntityOutOfRange {
                entity,
                num_entities: self.lines.len(),
            })
    }

    /// Fail with [`Error::EntityOutOfRange`] on the first id without a line.
    pub fn check_entities(&self, entities: impl IntoIterator<Item = EntityId>) -> Result<()> {
        for entity in entities {
            self.get(entity)?;
        }
        Ok(())
    }
}

/// Whitespace token count, capped at `max`.
pub fn token_count(line: &str, max: usize) -> usize {
    line.split_whitespace().take(max).count()
}
