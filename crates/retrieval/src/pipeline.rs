use crate::assembler::ContextAssembler;
use crate::corpus::DocumentStore;
use crate::embeddings::{EmbeddingMode, Encoder};
use crate::index::{FlatIndex, DEFAULT_TOP_K};
use std::path::PathBuf;

/// Context returned whenever the corpus cannot be searched.
pub const NO_CONTEXT_SENTINEL: &str = "No context available (Index/Documents not loaded).";

/// Where the offline-built corpus lives and how to embed queries against it.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub index_path: PathBuf,
    pub documents_path: PathBuf,
    pub model_dir: PathBuf,
    pub embedding_mode: EmbeddingMode,
}

/// Encoder, index and document store, loaded once and read-only afterwards.
///
/// Any component may be missing; searches then degrade to [`NO_CONTEXT_SENTINEL`].
#[derive(Debug, Default)]
pub struct Retrieval {
    encoder: Option<Encoder>,
    index: Option<FlatIndex>,
    documents: Option<DocumentStore>,
}

impl Retrieval {
    #[must_use]
    pub const fn new(
        encoder: Option<Encoder>,
        index: Option<FlatIndex>,
        documents: Option<DocumentStore>,
    ) -> Self {
        Self {
            encoder,
            index,
            documents,
        }
    }

    /// A pipeline with nothing loaded.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Loads every component it can. Failures are logged and leave that component absent.
    pub async fn load(settings: &RetrievalSettings) -> Self {
        let (index, documents) = if settings.index_path.exists()
            && settings.documents_path.exists()
        {
            let index = FlatIndex::load(&settings.index_path)
                .await
                .map_err(|err| log::warn!("Failed to load vector index: {err}"))
                .ok();
            let documents = DocumentStore::load(&settings.documents_path)
                .await
                .map_err(|err| log::warn!("Failed to load documents: {err}"))
                .ok();
            (index, documents)
        } else {
            log::warn!(
                "Corpus files not found ({} / {}); answering without reference context",
                settings.index_path.display(),
                settings.documents_path.display()
            );
            (None, None)
        };

        let dimension = index
            .as_ref()
            .map_or(crate::embeddings::MINILM_L6_V2.dimension, FlatIndex::dimension);
        let encoder = Encoder::load(settings.embedding_mode, &settings.model_dir, dimension)
            .map_err(|err| log::warn!("Failed to load embedding model: {err}"))
            .ok();

        Self::new(encoder, index, documents)
    }

    /// True when both the index and the document store loaded.
    #[must_use]
    pub const fn corpus_loaded(&self) -> bool {
        self.index.is_some() && self.documents.is_some()
    }

    #[must_use]
    pub const fn encoder(&self) -> Option<&Encoder> {
        self.encoder.as_ref()
    }

    #[must_use]
    pub const fn index(&self) -> Option<&FlatIndex> {
        self.index.as_ref()
    }

    #[must_use]
    pub const fn documents(&self) -> Option<&DocumentStore> {
        self.documents.as_ref()
    }

    /// Reference text for `query` from the `k` nearest passages, or the sentinel.
    pub async fn retrieve_context(&self, query: &str, k: usize) -> String {
        let (Some(encoder), Some(index), Some(documents)) =
            (&self.encoder, &self.index, &self.documents)
        else {
            return NO_CONTEXT_SENTINEL.to_string();
        };

        let hits = match encoder.encode(query).await {
            Ok(vector) => index.search(&vector, k),
            Err(err) => Err(err),
        };
        match hits {
            Ok(hits) => {
                log::debug!("Retrieved ids {:?}", hits.iter().map(|h| h.0).collect::<Vec<_>>());
                ContextAssembler::new(documents).assemble(&hits)
            }
            Err(err) => {
                log::warn!("Context retrieval failed: {err}");
                NO_CONTEXT_SENTINEL.to_string()
            }
        }
    }

    pub async fn retrieve_default(&self, query: &str) -> String {
        self.retrieve_context(query, DEFAULT_TOP_K).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn stub_pipeline(passages: &[&str]) -> Retrieval {
        let encoder = Encoder::stub(8);
        let mut index = FlatIndex::new(8);
        let mut docs = DocumentStore::new();
        for passage in passages {
            index.push(encoder.encode(passage).await.unwrap()).unwrap();
            docs.push(*passage);
        }
        Retrieval::new(Some(encoder), Some(index), Some(docs))
    }

    #[tokio::test]
    async fn exact_passage_is_the_nearest_hit() {
        let pipeline = stub_pipeline(&["ragi porridge", "spinach dal", "orange juice"]).await;
        let context = pipeline.retrieve_context("spinach dal", 1).await;
        assert_eq!(context, "spinach dal");
    }

    #[tokio::test]
    async fn default_k_caps_context_at_four_passages() {
        let pipeline = stub_pipeline(&["a", "b", "c", "d", "e", "f"]).await;
        let context = pipeline.retrieve_default("c").await;
        assert_eq!(context.lines().count(), 4);
        assert_eq!(context.lines().next(), Some("c"));
    }

    #[tokio::test]
    async fn missing_components_return_sentinel() {
        assert_eq!(
            Retrieval::unavailable().retrieve_default("iron").await,
            NO_CONTEXT_SENTINEL
        );

        let partial = Retrieval::new(Some(Encoder::stub(8)), Some(FlatIndex::new(8)), None);
        assert!(!partial.corpus_loaded());
        assert_eq!(partial.retrieve_default("iron").await, NO_CONTEXT_SENTINEL);
    }

    #[tokio::test]
    async fn dimension_mismatch_degrades_to_sentinel() {
        let pipeline = Retrieval::new(
            Some(Encoder::stub(4)),
            Some(FlatIndex::new(8)),
            Some(DocumentStore::new()),
        );
        assert_eq!(pipeline.retrieve_default("iron").await, NO_CONTEXT_SENTINEL);
    }

    #[tokio::test]
    async fn load_without_corpus_files_is_degraded_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = RetrievalSettings {
            index_path: tmp.path().join("missing.index.json"),
            documents_path: tmp.path().join("missing.docs.json"),
            model_dir: tmp.path().join("models"),
            embedding_mode: EmbeddingMode::Stub,
        };
        let pipeline = Retrieval::load(&settings).await;
        assert!(!pipeline.corpus_loaded());
        assert!(pipeline.encoder().is_some());
        assert_eq!(pipeline.retrieve_default("iron").await, NO_CONTEXT_SENTINEL);
    }
}
