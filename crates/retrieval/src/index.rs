use crate::error::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Default number of neighbours pulled into a prompt.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    schema_version: u32,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// Exact nearest-neighbour index over pre-embedded corpus vectors.
///
/// Vector ids are their positions in the persisted file, which is also the
/// position of the matching record in the document store.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading vector index from {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != INDEX_SCHEMA_VERSION {
            return Err(RetrievalError::UnsupportedSchema {
                what: "index",
                found: persisted.schema_version,
                expected: INDEX_SCHEMA_VERSION,
            });
        }

        let mut index = Self::new(persisted.dimension);
        for vector in persisted.vectors {
            index.push(vector)?;
        }
        log::info!(
            "Loaded {} vectors (dimension {})",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedIndex {
            schema_version: INDEX_SCHEMA_VERSION,
            dimension: self.dimension,
            vectors: self.vectors.clone(),
        };
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&persisted)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Appends a vector; its id is the previous length.
    pub fn push(&mut self, vector: Vec<f32>) -> Result<usize> {
        self.check_dimension(&vector)?;
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Returns up to `k` `(id, distance)` pairs, nearest first.
    ///
    /// Distance is squared Euclidean. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;

        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, vector)| (id, squared_l2(query, vector)))
            .collect();
        // Stable sort keeps ascending ids among ties.
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
