//! Input bundle: triplet splits, entity descriptions, optional context corpus.

use crate::candidates::{CandidatePool, SamplingMode};
use crate::context::ContextIndex;
use crate::descriptions::Descriptions;
use crate::store::TripletStore;
use crate::{Error, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Locations of every input file.
#[derive(Debug, Clone)]
pub struct CorpusPaths {
    pub train: PathBuf,
    pub valid: PathBuf,
    pub test: PathBuf,
    /// One tokenized description per line; line number = entity id.
    pub descriptions: PathBuf,
    /// JSON context corpus. Without it, negatives come from the whole vocabulary.
    pub context: Option<PathBuf>,
}

impl CorpusPaths {
    /// Fail on the first required path that does not exist.
    pub fn check_exist(&self) -> Result<()> {
        let required = [&self.train, &self.valid, &self.test, &self.descriptions];
        for path in required.into_iter().chain(self.context.as_ref()) {
            if !path.exists() {
                return Err(Error::MissingInput(path.clone()));
            }
        }
        Ok(())
    }
}

/// All loaded inputs. Immutable once built.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub store: TripletStore,
    pub descriptions: Descriptions,
    pub context: Option<ContextIndex>,
}

impl Corpus {
    /// Load every input and check that all referenced entities have a description.
    pub fn load(paths: &CorpusPaths) -> Result<Self> {
        paths.check_exist()?;

        let store = TripletStore::load(&paths.train, &paths.valid, &paths.test)?;
        let descriptions = Descriptions::load(&paths.descriptions)?;
        let context = paths
            .context
            .as_ref()
            .map(ContextIndex::from_json_file)
            .transpose()?;

        let corpus = Self {
            store,
            descriptions,
            context,
        };
        corpus.validate()?;

        info!(
            triplets = corpus.store.len(),
            entities = corpus.descriptions.len(),
            documents = corpus.context.as_ref().map_or(0, ContextIndex::len),
            "load finished"
        );
        Ok(corpus)
    }

    /// Every triplet entity and every context entity must index a description.
    pub fn validate(&self) -> Result<()> {
        self.descriptions
            .check_entities(self.store.all().flat_map(|t| [t.head, t.tail]))?;
        if let Some(index) = &self.context {
            self.descriptions.check_entities(index.entities())?;
        }
        debug!("all entity ids resolve to descriptions");
        Ok(())
    }

    /// Candidate source for `mode`, falling back to the whole vocabulary.
    pub fn candidate_pool(&self, mode: SamplingMode) -> CandidatePool<'_> {
        match &self.context {
            Some(index) => CandidatePool::from_context(index, mode),
            None => CandidatePool::from_vocabulary(self.descriptions.len()),
        }
    }
}
