//! Knowledge store
//!
//! A small embedding index of UMKM guidance passages. Entries are embedded
//! once on `add`; re-adding an id overwrites it in place. The store is
//! populated explicitly through `initialize`, never as a load-time side
//! effect.

pub mod embedder;
pub mod seed;

pub use embedder::{cosine_similarity, Embedder, HashedEmbedder, HttpEmbedder};

use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A passage waiting to be embedded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeDocument {
    pub id: String,
    pub text: String,
    pub category: String,
}

impl KnowledgeDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category: category.into(),
        }
    }
}

/// An indexed passage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntry {
    pub id: String,
    pub text: String,
    pub category: String,
    pub embedding: Vec<f32>,
}

/// On-disk form of the index
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    embedder: String,
    entries: Vec<KnowledgeEntry>,
}

#[derive(Default)]
struct StoreInner {
    /// Insertion order is the tie-break order for equal scores
    entries: Vec<KnowledgeEntry>,
    id_map: HashMap<String, usize>,
    dimension: Option<usize>,
}

impl StoreInner {
    fn upsert(&mut self, entry: KnowledgeEntry) -> Result<()> {
        if entry.id.trim().is_empty() {
            return Err(AdvisorError::InvalidInput(
                "knowledge entry id must not be empty".to_string(),
            ));
        }

        let dimension = entry.embedding.len();
        match self.dimension {
            Some(expected) if expected != dimension => {
                return Err(AdvisorError::InvalidInput(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    expected, dimension
                )));
            }
            None => self.dimension = Some(dimension),
            _ => {}
        }

        if let Some(&index) = self.id_map.get(&entry.id) {
            self.entries[index] = entry;
        } else {
            self.id_map.insert(entry.id.clone(), self.entries.len());
            self.entries.push(entry);
        }
        Ok(())
    }
}

pub struct KnowledgeStore {
    embedder: Box<dyn Embedder>,
    inner: RwLock<StoreInner>,
    min_score: f32,
    index_path: Option<PathBuf>,
}

impl KnowledgeStore {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            inner: RwLock::new(StoreInner::default()),
            min_score: 0.0,
            index_path: None,
        }
    }

    /// Only results scoring strictly above this are returned
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_index_path(mut self, path: PathBuf) -> Self {
        self.index_path = Some(path);
        self
    }

    /// Build the store described by the config: load the persisted index
    /// snapshot if there is one, otherwise index the built-in corpus.
    pub async fn initialize(config: &AdvisorConfig) -> Result<Self> {
        let embedder = embedder::embedder_from_settings(&config.embedding)?;
        let mut store = Self::new(embedder).with_min_score(config.knowledge_min_score);
        if let Some(path) = &config.knowledge_index_path {
            store = store.with_index_path(path.clone());
        }

        if !store.load_snapshot().await? {
            let added = store.add(seed::seed_documents()).await?;
            info!(entries = added, "Knowledge store seeded with built-in corpus");
        }

        Ok(store)
    }

    /// Persist the index snapshot, if a path is configured
    pub async fn shutdown(&self) -> Result<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };

        let snapshot = {
            let inner = self.inner.read().await;
            IndexSnapshot {
                embedder: self.embedder.id(),
                entries: inner.entries.clone(),
            }
        };

        let bytes = serde_json::to_vec(&snapshot)?;
        tokio::fs::write(path, bytes).await?;
        info!(path = %path.display(), entries = snapshot.entries.len(), "Knowledge index saved");
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<bool> {
        let Some(path) = &self.index_path else {
            return Ok(false);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.embedder != self.embedder.id() {
            warn!(
                stored = %snapshot.embedder,
                current = %self.embedder.id(),
                "Knowledge index built with a different embedder, re-indexing"
            );
            return Ok(false);
        }

        let mut inner = self.inner.write().await;
        for entry in snapshot.entries {
            inner.upsert(entry)?;
        }
        info!(path = %path.display(), entries = inner.entries.len(), "Knowledge index loaded");
        Ok(true)
    }

    /// Embed and index documents. Existing ids are overwritten in place.
    pub async fn add(&self, documents: Vec<KnowledgeDocument>) -> Result<usize> {
        let mut embedded = Vec::with_capacity(documents.len());
        for doc in documents {
            let embedding = self.embedder.embed(&doc.text).await?;
            embedded.push(KnowledgeEntry {
                id: doc.id,
                text: doc.text,
                category: doc.category,
                embedding,
            });
        }

        let count = embedded.len();
        let mut inner = self.inner.write().await;
        for entry in embedded {
            inner.upsert(entry)?;
        }

        debug!(added = count, total = inner.entries.len(), "Knowledge entries indexed");
        Ok(count)
    }

    /// Best matches for `text`, highest score first, at most `top_k`.
    ///
    /// An empty result is valid; only querying a store that never received
    /// an entry is an error.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<(KnowledgeEntry, f32)>> {
        if self.inner.read().await.entries.is_empty() {
            return Err(AdvisorError::EmptyIndex(
                "no knowledge entries have been added".to_string(),
            ));
        }

        let query_embedding = self.embedder.embed(text).await?;
        let inner = self.inner.read().await;

        let mut scored: Vec<(KnowledgeEntry, f32)> = inner
            .entries
            .iter()
            .filter_map(|entry| {
                let score = cosine_similarity(&query_embedding, &entry.embedding);
                (score.is_finite() && score > self.min_score).then(|| (entry.clone(), score))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        debug!(query = %text, results = scored.len(), "Knowledge query");
        Ok(scored)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
