//! Context retrieval for the ragline pipeline.
//!
//! [`ContextRetriever`] embeds a query, searches the owner's index,
//! reranks candidates with a blend of vector similarity and query-term
//! overlap, and assembles the survivors into a token-budgeted context
//! block with numbered source markers.

use ragline_core::{
    estimate_tokens, ContextBlock, Result, RetrievalConfig, RetrievalResult, RetrievedChunk,
    SearchQuery, SearchResult, VectorIndex,
};
use ragline_embed::EmbedderPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Retrieves and assembles context for a query against one owner's index.
pub struct ContextRetriever {
    embedder: Arc<EmbedderPool>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl ContextRetriever {
    /// Create a retriever over the given embedder and index.
    pub fn new(
        embedder: Arc<EmbedderPool>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Retrieve context for `query` from `owner_id`'s index.
    ///
    /// An empty index, or no candidate above the similarity floor, yields
    /// an empty context block rather than an error. `document_ids`
    /// restricts candidates to those documents when set.
    pub async fn retrieve(
        &self,
        owner_id: &str,
        query: &str,
        document_ids: Option<Vec<Uuid>>,
    ) -> Result<RetrievalResult> {
        let embedded = self.embedder.embed_query(query).await?;

        // over-fetch so reranking has room to reorder
        let candidate_limit = (2 * self.config.top_k).max(10);
        let hits = self
            .index
            .search(&SearchQuery {
                owner_id: owner_id.to_string(),
                embedding: embedded.embedding,
                limit: candidate_limit,
                min_similarity: self.config.min_similarity,
                document_ids,
            })
            .await?;
        debug!(owner = owner_id, candidates = hits.len(), "search complete");

        let mut chunks = self.rerank(query, hits);
        chunks.truncate(self.config.top_k);

        let context = assemble_context(&chunks, self.config.token_budget);
        debug!(
            retained = chunks.len(),
            included = context.chunk_ids.len(),
            context_tokens = context.token_count,
            "context assembled"
        );

        Ok(RetrievalResult {
            query: query.to_string(),
            chunks,
            context,
        })
    }

    /// Score candidates by blended vector similarity and query-term
    /// overlap, best first. The sort is stable, so equal scores keep the
    /// search order.
    fn rerank(&self, query: &str, hits: Vec<SearchResult>) -> Vec<RetrievedChunk> {
        let query_terms: HashSet<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| {
                let overlap = term_overlap(&query_terms, &hit.content);
                let rerank_score =
                    self.config.vector_weight * hit.similarity + self.config.lexical_weight * overlap;
                RetrievedChunk {
                    chunk_id: hit.chunk_id,
                    document_id: hit.document_id,
                    content: hit.content,
                    page: hit.page,
                    section: hit.section,
                    token_count: hit.token_count,
                    similarity: hit.similarity,
                    rerank_score,
                }
            })
            .collect();

        chunks.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks
    }
}

/// Fraction of query terms that appear in the chunk text.
fn term_overlap(query_terms: &HashSet<String>, content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let chunk_terms: HashSet<String> = content
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    let shared = query_terms.intersection(&chunk_terms).count();
    shared as f32 / query_terms.len() as f32
}

/// Concatenate chunks under the token budget, each behind a numbered
/// source marker. A chunk that would overflow the remaining budget is
/// omitted entirely and assembly continues with the next candidate.
fn assemble_context(chunks: &[RetrievedChunk], token_budget: usize) -> ContextBlock {
    let mut text = String::new();
    let mut chunk_ids = Vec::new();

    for chunk in chunks {
        let entry = format!("{}\n{}", source_marker(chunk_ids.len() + 1, chunk), chunk.content);
        let candidate = if text.is_empty() {
            entry
        } else {
            format!("{text}\n\n{entry}")
        };
        if estimate_tokens(&candidate) > token_budget {
            continue;
        }
        text = candidate;
        chunk_ids.push(chunk.chunk_id);
    }

    let token_count = estimate_tokens(&text);
    ContextBlock {
        text,
        token_count,
        chunk_ids,
    }
}

fn source_marker(n: usize, chunk: &RetrievedChunk) -> String {
    let mut marker = format!("[Source {n}: {}", chunk.document_id);
    if let Some(page) = chunk.page {
        marker.push_str(&format!(", Page {page}"));
    }
    if let Some(section) = &chunk.section {
        marker.push_str(&format!(", Section: {section}"));
    }
    marker.push(']');
    marker
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragline_core::{
        Chunk, ChunkMetadata, EmbedBatch, EmbedError, Embedder, Embedding, EmbeddingOutput,
        IndexEntry,
    };
    use ragline_store::FlatIndex;

    /// Test embedder that maps every query to the x axis.
    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dimension(&self) -> usize {
            2
        }
        fn max_input_tokens(&self) -> usize {
            usize::MAX
        }
        async fn embed_batch(&self, texts: &[&str]) -> std::result::Result<EmbedBatch, EmbedError> {
            Ok(EmbedBatch {
                outputs: texts
                    .iter()
                    .map(|t| EmbeddingOutput {
                        embedding: vec![1.0, 0.0],
                        token_count: estimate_tokens(t),
                        truncated: false,
                    })
                    .collect(),
                retries: 0,
            })
        }
    }

    fn entry(
        document_id: Uuid,
        sequence: u32,
        content: &str,
        vector: Vec<f32>,
        page: Option<u32>,
        section: Option<&str>,
    ) -> IndexEntry {
        let chunk_id = Uuid::new_v4();
        IndexEntry {
            chunk: Chunk {
                id: chunk_id,
                document_id,
                sequence,
                content: content.to_string(),
                byte_range: 0..content.len() as u64,
                metadata: ChunkMetadata {
                    token_count: estimate_tokens(content),
                    page,
                    section: section.map(str::to_string),
                    truncated: false,
                },
            },
            embedding: Embedding {
                chunk_id,
                vector,
                model: "fixed".to_string(),
            },
        }
    }

    fn retriever(index: Arc<FlatIndex>, config: RetrievalConfig) -> ContextRetriever {
        ContextRetriever::new(
            Arc::new(EmbedderPool::new(Arc::new(FixedEmbedder), 2, 100)),
            index,
            config,
        )
    }

    #[tokio::test]
    async fn retrieves_most_similar_with_source_marker() {
        let index = Arc::new(FlatIndex::new(2));
        let doc = Uuid::new_v4();
        index
            .append(
                "o",
                vec![
                    entry(doc, 0, "relevant passage", vec![1.0, 0.0], Some(3), Some("Intro")),
                    entry(doc, 1, "off-topic passage", vec![0.0, 1.0], None, None),
                ],
            )
            .await
            .unwrap();

        let retriever = retriever(index, RetrievalConfig::default());
        let result = retriever.retrieve("o", "anything", None).await.unwrap();

        assert_eq!(result.chunks[0].content, "relevant passage");
        let marker = format!("[Source 1: {doc}, Page 3, Section: Intro]");
        assert!(result.context.text.starts_with(&marker));
        assert!(result.context.text.contains("relevant passage"));
    }

    #[tokio::test]
    async fn rerank_scores_are_non_increasing() {
        let index = Arc::new(FlatIndex::new(2));
        let doc = Uuid::new_v4();
        index
            .append(
                "o",
                vec![
                    entry(doc, 0, "alpha beta gamma", vec![0.8, 0.6], None, None),
                    entry(doc, 1, "delta epsilon", vec![1.0, 0.0], None, None),
                    entry(doc, 2, "alpha delta", vec![0.6, 0.8], None, None),
                ],
            )
            .await
            .unwrap();

        let retriever = retriever(index, RetrievalConfig::default());
        let result = retriever.retrieve("o", "alpha delta", None).await.unwrap();

        for pair in result.chunks.windows(2) {
            assert!(pair[0].rerank_score >= pair[1].rerank_score);
        }
    }

    #[tokio::test]
    async fn term_overlap_breaks_similarity_ties() {
        let index = Arc::new(FlatIndex::new(2));
        let doc = Uuid::new_v4();
        // identical vectors; only the lexical signal differs, and the
        // non-matching chunk is inserted first
        index
            .append(
                "o",
                vec![
                    entry(doc, 0, "completely unrelated words", vec![1.0, 0.0], None, None),
                    entry(doc, 1, "rust ownership rules", vec![1.0, 0.0], None, None),
                ],
            )
            .await
            .unwrap();

        let retriever = retriever(index, RetrievalConfig::default());
        let result = retriever.retrieve("o", "rust ownership", None).await.unwrap();

        assert_eq!(result.chunks[0].content, "rust ownership rules");
        assert!(result.chunks[0].rerank_score > result.chunks[1].rerank_score);
    }

    #[tokio::test]
    async fn context_never_exceeds_budget_and_skips_oversized() {
        let index = Arc::new(FlatIndex::new(2));
        let doc = Uuid::new_v4();
        let huge = "word ".repeat(400);
        index
            .append(
                "o",
                vec![
                    entry(doc, 0, &huge, vec![1.0, 0.0], None, None),
                    entry(doc, 1, "short chunk", vec![0.9, 0.1], None, None),
                ],
            )
            .await
            .unwrap();

        let config = RetrievalConfig {
            token_budget: 60,
            ..RetrievalConfig::default()
        };
        let retriever = retriever(index, config);
        let result = retriever.retrieve("o", "query", None).await.unwrap();

        // the oversized top hit is skipped, the smaller one still lands
        assert_eq!(result.context.chunk_ids.len(), 1);
        assert!(result.context.text.contains("short chunk"));
        assert!(result.context.token_count <= 60);
        assert_eq!(result.chunks.len(), 2);
    }

    #[tokio::test]
    async fn empty_index_yields_empty_block() {
        let index = Arc::new(FlatIndex::new(2));
        let retriever = retriever(index, RetrievalConfig::default());
        let result = retriever.retrieve("o", "anything", None).await.unwrap();

        assert!(result.chunks.is_empty());
        assert!(result.context.is_empty());
        assert_eq!(result.context.text, "");
        assert_eq!(result.context.token_count, 0);
    }

    #[tokio::test]
    async fn similarity_floor_filters_everything() {
        let index = Arc::new(FlatIndex::new(2));
        let doc = Uuid::new_v4();
        index
            .append("o", vec![entry(doc, 0, "orthogonal", vec![0.0, 1.0], None, None)])
            .await
            .unwrap();

        let config = RetrievalConfig {
            min_similarity: 0.5,
            ..RetrievalConfig::default()
        };
        let retriever = retriever(index, config);
        let result = retriever.retrieve("o", "query", None).await.unwrap();
        assert!(result.context.is_empty());
    }

    #[tokio::test]
    async fn document_filter_is_honored() {
        let index = Arc::new(FlatIndex::new(2));
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        index
            .append(
                "o",
                vec![
                    entry(doc_a, 0, "from document a", vec![1.0, 0.0], None, None),
                    entry(doc_b, 0, "from document b", vec![1.0, 0.0], None, None),
                ],
            )
            .await
            .unwrap();

        let retriever = retriever(index, RetrievalConfig::default());
        let result = retriever
            .retrieve("o", "query", Some(vec![doc_b]))
            .await
            .unwrap();

        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].document_id, doc_b);
    }

    #[test]
    fn marker_omits_missing_attribution() {
        let chunk = RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::nil(),
            content: "text".to_string(),
            page: None,
            section: None,
            token_count: 1,
            similarity: 1.0,
            rerank_score: 1.0,
        };
        assert_eq!(
            source_marker(2, &chunk),
            format!("[Source 2: {}]", Uuid::nil())
        );
    }
}
