//! Citation-context corpus used for local negative sampling.
//!
//! The corpus is a JSON array of documents. Each document lists the entities
//! it mentions as context (`paper_contexts`) and the entities it cites
//! (`citations`). Heads are drawn from the context role and tails from the
//! citation role:
//!
//! | Corrupting | Anchor | Matching documents | Candidates |
//! |------------|--------|--------------------|------------|
//! | head | tail `t` | `t` in `citations` | their `paper_contexts` |
//! | tail | head `h` | `h` in `paper_contexts` | their `citations` |
//!
//! Global sampling ignores the anchor and takes the role-wide union.

use crate::candidates::Corruption;
use crate::triplet::EntityId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One document of the context corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Entities appearing in the document.
    #[serde(default)]
    pub paper_contexts: Vec<EntityId>,
    /// Entities cited by the document.
    #[serde(default)]
    pub citations: Vec<EntityId>,
}

impl ContextEntry {
    /// The role that supplies replacements for `target`.
    pub fn candidates(&self, target: Corruption) -> &[EntityId] {
        match target {
            Corruption::Head => &self.paper_contexts,
            Corruption::Tail => &self.citations,
        }
    }
}

/// The known side of a triplet, used to scope candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Head is fixed; candidates replace the tail.
    Head(EntityId),
    /// Tail is fixed; candidates replace the head.
    Tail(EntityId),
}

impl Anchor {
    /// Build an anchor from an optional `(head, tail)` pair.
    ///
    /// Exactly one side must be given.
    pub fn from_selection(head: Option<EntityId>, tail: Option<EntityId>) -> Result<Self> {
        match (head, tail) {
            (Some(h), None) => Ok(Anchor::Head(h)),
            (None, Some(t)) => Ok(Anchor::Tail(t)),
            (None, None) => Err(Error::InvalidSelection(
                "either head or tail should be specified".into(),
            )),
            (Some(_), Some(_)) => Err(Error::InvalidSelection(
                "only one of head or tail should be specified".into(),
            )),
        }
    }

    /// Which side of the triplet the candidates replace.
    pub fn corruption(&self) -> Corruption {
        match self {
            Anchor::Head(_) => Corruption::Tail,
            Anchor::Tail(_) => Corruption::Head,
        }
    }

    pub fn entity(&self) -> EntityId {
        match *self {
            Anchor::Head(e) | Anchor::Tail(e) => e,
        }
    }
}

/// Indexed context corpus.
///
/// Inverted maps point each entity at the documents containing it in either
/// role, so a local lookup only visits matching documents.
#[derive(Debug, Clone, Default)]
pub struct ContextIndex {
    entries: Vec<ContextEntry>,
    /// entity -> documents listing it in `paper_contexts`
    by_context: HashMap<EntityId, Vec<usize>>,
    /// entity -> documents listing it in `citations`
    by_citation: HashMap<EntityId, Vec<usize>>,
    /// Sorted union of all `paper_contexts`.
    all_contexts: Vec<EntityId>,
    /// Sorted union of all `citations`.
    all_citations: Vec<EntityId>,
}

impl ContextIndex {
    pub fn new(entries: Vec<ContextEntry>) -> Self {
        let mut by_context: HashMap<EntityId, Vec<usize>> = HashMap::new();
        let mut by_citation: HashMap<EntityId, Vec<usize>> = HashMap::new();

        for (doc, entry) in entries.iter().enumerate() {
            for &e in &entry.paper_contexts {
                push_doc(by_context.entry(e).or_default(), doc);
            }
            for &e in &entry.citations {
                push_doc(by_citation.entry(e).or_default(), doc);
            }
        }

        let all_contexts = sorted_unique(entries.iter().flat_map(|e| e.paper_contexts.iter()));
        let all_citations = sorted_unique(entries.iter().flat_map(|e| e.citations.iter()));

        Self {
            entries,
            by_context,
            by_citation,
            all_contexts,
            all_citations,
        }
    }

    /// Load a JSON array of [`ContextEntry`] records.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let entries: Vec<ContextEntry> = serde_json::from_reader(reader)?;
        Ok(Self::new(entries))
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Every entity mentioned in either role, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.all_contexts
            .iter()
            .chain(&self.all_citations)
            .copied()
    }

    /// Candidates scoped to the documents the anchor appears in.
    ///
    /// Returns a sorted, de-duplicated list. An anchor that appears in no
    /// document yields an empty list.
    pub fn candidates_for_context(&self, anchor: Anchor) -> Vec<EntityId> {
        let docs = match anchor {
            Anchor::Tail(t) => self.by_citation.get(&t),
            Anchor::Head(h) => self.by_context.get(&h),
        };
        let Some(docs) = docs else {
            return Vec::new();
        };
        let target = anchor.corruption();
        sorted_unique(docs.iter().flat_map(|&d| self.entries[d].candidates(target).iter()))
    }

    /// Role-wide candidates for replacing `target`, ignoring any anchor.
    pub fn candidates_global(&self, target: Corruption) -> &[EntityId] {
        match target {
            Corruption::Head => &self.all_contexts,
            Corruption::Tail => &self.all_citations,
        }
    }
}

fn push_doc(docs: &mut Vec<usize>, doc: usize) {
    if docs.last() != Some(&doc) {
        docs.push(doc);
    }
}

fn sorted_unique<'a>(entities: impl Iterator<Item = &'a EntityId>) -> Vec<EntityId> {
    let mut out: Vec<EntityId> = entities.copied().collect();
    out.sort_unstable();
    out.dedup();
    out
}
