//! In-memory vector index over the chunks of one ingested corpus.
//!
//! Built once per submitted folder link and immutable afterwards. Lookup is
//! brute-force cosine similarity, which is plenty for the few hundred
//! chunks a folder of lecture notes produces.

use anyhow::{bail, Result};

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};
use crate::models::{Chunk, SearchHit};

struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    model: String,
    dims: usize,
}

impl VectorIndex {
    /// Embed every chunk (in batches of `batch_size`) and store the pairs.
    ///
    /// Any embedding failure aborts the build; nothing is retained.
    pub async fn build(
        provider: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self> {
        let batch_size = batch_size.max(1);
        let mut entries = Vec::with_capacity(chunks.len());
        let mut dims: Option<usize> = None;

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = provider.embed(&texts).await?;
            if vectors.len() != texts.len() {
                bail!(
                    "embedding batch {} returned {} vectors for {} texts",
                    batch_no,
                    vectors.len(),
                    texts.len()
                );
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                match dims {
                    None => dims = Some(vector.len()),
                    Some(d) if d != vector.len() => bail!(
                        "inconsistent embedding dimensions: expected {}, got {} for chunk {}",
                        d,
                        vector.len(),
                        chunk.index
                    ),
                    Some(_) => {}
                }
                entries.push(IndexedChunk {
                    chunk: chunk.clone(),
                    vector,
                });
            }
            tracing::debug!(batch = batch_no, embedded = entries.len(), "embedded batch");
        }

        Ok(Self {
            entries,
            model: provider.model_name().to_string(),
            dims: dims.unwrap_or(0),
        })
    }

    /// Return the `k` chunks most similar to `text`, best first.
    ///
    /// Ties keep ingestion order. An empty index answers without calling the
    /// embedding provider.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(provider, text).await?;
        if query_vec.len() != self.dims {
            bail!(
                "query embedding has {} dimensions but the index was built with {} ({})",
                query_vec.len(),
                self.dims,
                self.model
            );
        }
        Ok(self.nearest(&query_vec, k))
    }

    /// Rank stored chunks against a pre-computed query vector.
    pub fn nearest(&self, query_vec: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_vec, &e.vector)))
            .collect();
        // sort_by is stable: equal scores stay in ingestion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model that produced the stored vectors.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}
