//! # NutriKid Retrieval
//!
//! Semantic lookup over the offline-built pediatric nutrition corpus.
//!
//! ## Architecture
//!
//! ```text
//! question
//!     │
//!     ├──> Encoder (ONNX sentence-transformer | stub)
//!     │      └─> Vector[384/1024]
//!     │
//!     ├──> FlatIndex
//!     │      └─> (id, squared L2 distance), nearest first
//!     │
//!     └──> ContextAssembler
//!            └─> DocumentStore texts joined by '\n'
//! ```
//!
//! The index and documents are produced offline and only ever read here. When
//! either is missing the pipeline answers with [`NO_CONTEXT_SENTINEL`] instead of
//! failing.
//!
//! ## Example
//!
//! ```no_run
//! use nutrikid_retrieval::{EmbeddingMode, Retrieval, RetrievalSettings};
//!
//! # async fn demo() {
//! let settings = RetrievalSettings {
//!     index_path: "data/index.json".into(),
//!     documents_path: "data/documents.json".into(),
//!     model_dir: "models".into(),
//!     embedding_mode: EmbeddingMode::Fast,
//! };
//! let retrieval = Retrieval::load(&settings).await;
//! let context = retrieval.retrieve_default("iron rich breakfast for a toddler").await;
//! println!("{context}");
//! # }
//! ```

mod assembler;
mod corpus;
mod embeddings;
mod error;
mod index;
mod pipeline;

pub use assembler::ContextAssembler;
pub use corpus::{record_text, DocumentStore, TEXT_KEYS};
pub use embeddings::{EmbeddingMode, Encoder, ModelSpec, BGE_LARGE_EN_V15, MINILM_L6_V2};
pub use error::{Result, RetrievalError};
pub use index::{FlatIndex, DEFAULT_TOP_K, INDEX_SCHEMA_VERSION};
pub use pipeline::{Retrieval, RetrievalSettings, NO_CONTEXT_SENTINEL};
