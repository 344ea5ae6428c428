//! The knowledge index handle and its process-wide cache.
//!
//! Connecting registers the embedding model, resolves the vector index host
//! and wraps both into a [`KnowledgeIndex`]. The handle is read-only once
//! built, so sessions share it through an `Arc`.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::Config;
use crate::embed_query::{Embedder, TogetherEmbedder};
use crate::error::RagError;
use crate::http::HttpClient;
use crate::retrieve_chunks::{rank_hits, Hit, PineconeIndex, VectorIndex};

pub struct KnowledgeIndex {
    name: String,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorIndex>,
}

impl fmt::Debug for KnowledgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeIndex")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl KnowledgeIndex {
    pub fn new(name: impl Into<String>, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorIndex>) -> Self {
        Self {
            name: name.into(),
            embedder,
            store,
        }
    }

    pub fn connect(cfg: &Config) -> Result<Self, RagError> {
        info!(index = %cfg.pinecone_index, embed_model = %cfg.embed_model, "connecting knowledge index");
        let http = HttpClient::new(cfg.http_timeout).map_err(RagError::service_unavailable)?;
        let embedder = TogetherEmbedder::new(http.clone(), cfg);
        let store = PineconeIndex::connect(http, cfg)?;
        Ok(Self::new(cfg.pinecone_index.clone(), Arc::new(embedder), Arc::new(store)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Embeds `query` and returns at most `top_k` chunks, best first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Hit>, RagError> {
        let vector = self.embedder.embed_query(query)?;
        let hits = self.store.query(&vector, top_k)?;
        Ok(rank_hits(hits, top_k))
    }
}

/// Compute-once slot for the index handle. A failed connection is not
/// stored, so the next caller tries again.
pub struct IndexCache {
    cell: OnceCell<Arc<KnowledgeIndex>>,
}

impl IndexCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_connect<F>(&self, connect: F) -> Result<Arc<KnowledgeIndex>, RagError>
    where
        F: FnOnce() -> Result<KnowledgeIndex, RagError>,
    {
        self.cell
            .get_or_try_init(|| {
                connect().map(Arc::new).inspect_err(|err| {
                    warn!(error = %err, "knowledge index connection failed");
                })
            })
            .map(Arc::clone)
    }

    pub fn get(&self) -> Option<Arc<KnowledgeIndex>> {
        self.cell.get().cloned()
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

static INDEX: IndexCache = IndexCache::new();

pub fn get_index(cfg: &Config) -> Result<Arc<KnowledgeIndex>, RagError> {
    INDEX.get_or_connect(|| KnowledgeIndex::connect(cfg))
}
