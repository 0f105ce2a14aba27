//! Brute-force flat vector index, partitioned by owner.
//!
//! Each owner gets an independent arena of normalized vectors. Search is
//! an exhaustive inner-product scan; with vectors normalized at insert
//! time, inner product equals cosine similarity. Arenas persist to a
//! per-owner directory holding raw little-endian floats plus a JSON
//! sidecar with chunk metadata.

use async_trait::async_trait;
use ragline_core::{
    IndexEntry, IndexError, IndexStats, SearchQuery, SearchResult, VectorIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const VECTORS_FILE: &str = "vectors.bin";
const META_FILE: &str = "meta.json";

/// One indexed chunk with its normalized vector.
#[derive(Debug, Clone)]
struct StoredEntry {
    chunk_id: Uuid,
    document_id: Uuid,
    content: String,
    page: Option<u32>,
    section: Option<String>,
    token_count: usize,
    vector: Vec<f32>,
}

/// Metadata row persisted alongside the vector file, one per entry in
/// the same order.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    chunk_id: Uuid,
    document_id: Uuid,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    section: Option<String>,
    token_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct OwnerMeta {
    dimension: usize,
    entries: Vec<EntryMeta>,
}

type Arena = Arc<RwLock<Vec<StoredEntry>>>;

/// Flat cosine-similarity index with per-owner partitions.
///
/// Appends to one owner are serialized through the owner's write lock;
/// searches take a read lock and run concurrently. Operations on
/// different owners never contend.
pub struct FlatIndex {
    dimension: usize,
    root: Option<PathBuf>,
    owners: RwLock<HashMap<String, Arena>>,
}

impl FlatIndex {
    /// Create an in-memory index with no persistence.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            root: None,
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Create an index persisting owner partitions under `root`.
    ///
    /// Partitions load lazily on first access; an owner with no saved
    /// partition starts empty.
    #[must_use]
    pub fn with_root(dimension: usize, root: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            root: Some(root.into()),
            owners: RwLock::new(HashMap::new()),
        }
    }

    fn owner_dir(&self, owner_id: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(owner_id))
    }

    /// Fetch an owner's arena, loading it from disk on first access.
    async fn arena(&self, owner_id: &str) -> Result<Arena, IndexError> {
        {
            let owners = self.owners.read().await;
            if let Some(arena) = owners.get(owner_id) {
                return Ok(arena.clone());
            }
        }

        let loaded = match self.owner_dir(owner_id) {
            Some(dir) if dir.join(META_FILE).exists() => {
                load_partition(&dir, self.dimension).await?
            }
            _ => Vec::new(),
        };

        let mut owners = self.owners.write().await;
        // another task may have loaded it while we read the disk
        let arena = owners
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(loaded)))
            .clone();
        Ok(arena)
    }

    fn check_entries(&self, entries: &[IndexEntry]) -> Result<Vec<StoredEntry>, IndexError> {
        entries
            .iter()
            .map(|entry| {
                if entry.embedding.vector.len() != self.dimension {
                    return Err(IndexError::DimensionMismatch {
                        expected: self.dimension,
                        got: entry.embedding.vector.len(),
                    });
                }
                Ok(StoredEntry {
                    chunk_id: entry.chunk.id,
                    document_id: entry.chunk.document_id,
                    content: entry.chunk.content.clone(),
                    page: entry.chunk.metadata.page,
                    section: entry.chunk.metadata.section.clone(),
                    token_count: entry.chunk.metadata.token_count,
                    vector: normalize(&entry.embedding.vector),
                })
            })
            .collect()
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn append(&self, owner_id: &str, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        let stored = self.check_entries(&entries)?;
        let arena = self.arena(owner_id).await?;
        let mut guard = arena.write().await;
        guard.extend(stored);
        debug!(owner = owner_id, added = entries.len(), total = guard.len(), "appended entries");
        Ok(())
    }

    async fn try_append(
        &self,
        owner_id: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<(), IndexError> {
        let stored = self.check_entries(&entries)?;
        let arena = self.arena(owner_id).await?;
        let mut guard = arena
            .try_write()
            .map_err(|_| IndexError::OwnerBusy(owner_id.to_string()))?;
        guard.extend(stored);
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, IndexError> {
        if query.embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.embedding.len(),
            });
        }

        let arena = self.arena(&query.owner_id).await?;
        let guard = arena.read().await;
        let needle = normalize(&query.embedding);

        let mut scored: Vec<(f32, &StoredEntry)> = guard
            .iter()
            .filter(|entry| match &query.document_ids {
                Some(ids) => ids.contains(&entry.document_id),
                None => true,
            })
            .map(|entry| (dot(&needle, &entry.vector), entry))
            .filter(|(score, _)| query.min_similarity <= 0.0 || *score >= query.min_similarity)
            .collect();

        // stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(score, entry)| SearchResult {
                chunk_id: entry.chunk_id,
                document_id: entry.document_id,
                content: entry.content.clone(),
                page: entry.page,
                section: entry.section.clone(),
                token_count: entry.token_count,
                similarity: score,
            })
            .collect())
    }

    async fn remove_document(
        &self,
        owner_id: &str,
        document_id: Uuid,
    ) -> Result<usize, IndexError> {
        let arena = self.arena(owner_id).await?;
        let mut guard = arena.write().await;
        let before = guard.len();
        guard.retain(|entry| entry.document_id != document_id);
        let removed = before - guard.len();
        debug!(owner = owner_id, %document_id, removed, "removed document entries");
        Ok(removed)
    }

    async fn save(&self, owner_id: &str) -> Result<(), IndexError> {
        let Some(dir) = self.owner_dir(owner_id) else {
            return Err(IndexError::Persist("index has no storage root".to_string()));
        };

        let arena = self.arena(owner_id).await?;
        let guard = arena.read().await;

        let mut vectors = Vec::with_capacity(guard.len() * self.dimension * 4);
        let mut entries = Vec::with_capacity(guard.len());
        for entry in guard.iter() {
            for value in &entry.vector {
                vectors.extend_from_slice(&value.to_le_bytes());
            }
            entries.push(EntryMeta {
                chunk_id: entry.chunk_id,
                document_id: entry.document_id,
                content: entry.content.clone(),
                page: entry.page,
                section: entry.section.clone(),
                token_count: entry.token_count,
            });
        }
        let meta = OwnerMeta {
            dimension: self.dimension,
            entries,
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| IndexError::Persist(e.to_string()))?;

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(VECTORS_FILE), &vectors).await?;
        tokio::fs::write(dir.join(META_FILE), &meta_json).await?;

        info!(owner = owner_id, vectors = guard.len(), path = %dir.display(), "saved index partition");
        Ok(())
    }

    async fn stats(&self, owner_id: &str) -> Result<IndexStats, IndexError> {
        let arena = self.arena(owner_id).await?;
        let guard = arena.read().await;
        let documents: HashSet<Uuid> = guard.iter().map(|entry| entry.document_id).collect();
        Ok(IndexStats {
            owner_id: owner_id.to_string(),
            total_vectors: guard.len(),
            total_documents: documents.len(),
            dimension: self.dimension,
        })
    }
}

async fn load_partition(dir: &Path, dimension: usize) -> Result<Vec<StoredEntry>, IndexError> {
    let meta_bytes = tokio::fs::read(dir.join(META_FILE)).await?;
    let meta: OwnerMeta =
        serde_json::from_slice(&meta_bytes).map_err(|e| IndexError::Load(e.to_string()))?;
    if meta.dimension != dimension {
        return Err(IndexError::Load(format!(
            "saved partition has dimension {}, index expects {}",
            meta.dimension, dimension
        )));
    }

    let vector_bytes = tokio::fs::read(dir.join(VECTORS_FILE)).await?;
    let expected = meta.entries.len() * dimension * 4;
    if vector_bytes.len() != expected {
        return Err(IndexError::Load(format!(
            "vector file holds {} bytes, expected {} for {} entries",
            vector_bytes.len(),
            expected,
            meta.entries.len()
        )));
    }

    let entries = meta
        .entries
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let offset = i * dimension * 4;
            let vector = vector_bytes[offset..offset + dimension * 4]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            StoredEntry {
                chunk_id: row.chunk_id,
                document_id: row.document_id,
                content: row.content,
                page: row.page,
                section: row.section,
                token_count: row.token_count,
                vector,
            }
        })
        .collect();

    debug!(path = %dir.display(), "loaded index partition");
    Ok(entries)
}

/// L2-normalize a vector. Zero vectors pass through unchanged and score
/// zero against everything.
fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
