use crate::error::{Result, RetrievalError};
use ndarray::{Array, Axis, Ix2, Ix3};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

/// Which encoder backend a process runs with.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// ONNX Runtime sentence-transformer.
    #[default]
    Fast,
    /// Deterministic hash vectors; no model files required.
    Stub,
}

impl EmbeddingMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "stub" => Ok(Self::Stub),
            other => Err(RetrievalError::EmbeddingError(format!(
                "Unsupported embedding mode '{other}' (expected 'fast' or 'stub')"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Stub => "stub",
        }
    }
}

impl fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentence-transformer the corpus may have been built with, keyed by its output dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: &'static str,
    pub dimension: usize,
    pub max_length: usize,
    pub max_batch: usize,
}

pub const MINILM_L6_V2: ModelSpec = ModelSpec {
    id: "all-MiniLM-L6-v2",
    dimension: 384,
    max_length: 256,
    max_batch: 32,
};

pub const BGE_LARGE_EN_V15: ModelSpec = ModelSpec {
    id: "bge-large-en-v1.5",
    dimension: 1024,
    max_length: 512,
    max_batch: 8,
};

impl ModelSpec {
    /// Picks the model matching an index dimension. Unknown dimensions fall back to MiniLM.
    #[must_use]
    pub fn for_dimension(dimension: usize) -> Self {
        match dimension {
            384 => MINILM_L6_V2,
            1024 => BGE_LARGE_EN_V15,
            other => {
                log::warn!(
                    "Unknown index dimension {other}; defaulting to {}",
                    MINILM_L6_V2.id
                );
                MINILM_L6_V2
            }
        }
    }

    fn model_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.id).join("model.onnx")
    }

    fn tokenizer_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.id).join("tokenizer.json")
    }
}

struct OrtBackend {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    spec: ModelSpec,
}

impl OrtBackend {
    fn load(spec: ModelSpec, model_dir: &Path) -> Result<Self> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let model_path = spec.model_path(model_dir);
        let tokenizer_path = spec.tokenizer_path(model_dir);
        if !model_path.exists() || !tokenizer_path.exists() {
            return Err(RetrievalError::EmbeddingError(format!(
                "Model files for '{}' are missing. Expected ONNX at {} and tokenizer at {}",
                spec.id,
                model_path.display(),
                tokenizer_path.display(),
            )));
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RetrievalError::EmbeddingError(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: spec.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| {
                RetrievalError::EmbeddingError(format!("Tokenizer truncation failed: {e}"))
            })?;

        let session = Session::builder()
            .map_err(|e| RetrievalError::EmbeddingError(format!("{e}")))?
            .with_intra_threads(default_intra_threads())
            .map_err(|e| {
                RetrievalError::EmbeddingError(format!("Failed to set ORT intra threads: {e}"))
            })?
            .with_inter_threads(1)
            .map_err(|e| {
                RetrievalError::EmbeddingError(format!("Failed to set ORT inter threads: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                RetrievalError::EmbeddingError(format!("Failed to set optimization level: {e}"))
            })?
            .commit_from_file(&model_path)
            .map_err(|e| {
                RetrievalError::EmbeddingError(format!("Failed to load ONNX model: {e}"))
            })?;

        log::info!(
            "Loaded embedding model '{}' (dim {}, max_length {})",
            spec.id,
            spec.dimension,
            spec.max_length
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            spec,
        })
    }

    fn encode_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.spec.max_batch) {
            let encodings = self
                .tokenizer
                .encode_batch(batch.to_vec(), true)
                .map_err(|e| RetrievalError::EmbeddingError(format!("Tokenization failed: {e}")))?;
            if encodings.is_empty() {
                continue;
            }

            let seq_len = encodings[0].len();
            if encodings.iter().any(|e| e.len() != seq_len) {
                return Err(RetrievalError::EmbeddingError(
                    "Inconsistent sequence lengths after padding".to_string(),
                ));
            }
            let flat = FlatBatch::from_encodings(&encodings, seq_len);

            let shape = (batch.len(), seq_len);
            let ids = Array::from_shape_vec(shape, flat.ids)
                .map_err(|e| RetrievalError::EmbeddingError(format!("IDs shape error: {e}")))?;
            let mask = Array::from_shape_vec(shape, flat.masks)
                .map_err(|e| RetrievalError::EmbeddingError(format!("Mask shape error: {e}")))?;
            let types = Array::from_shape_vec(shape, flat.type_ids)
                .map_err(|e| RetrievalError::EmbeddingError(format!("Types shape error: {e}")))?;

            let mut available: HashMap<String, DynTensor> = HashMap::new();
            available.insert("input_ids".to_string(), to_tensor(ids)?);
            available.insert("attention_mask".to_string(), to_tensor(mask)?);
            available.insert("token_type_ids".to_string(), to_tensor(types)?);

            let output = {
                let mut session = self.session.lock().map_err(|_| {
                    RetrievalError::EmbeddingError("Failed to lock ONNX session".into())
                })?;

                let mut feed: HashMap<String, DynTensor> = HashMap::new();
                for input in session.inputs() {
                    if let Some(value) = available.remove(input.name()) {
                        feed.insert(input.name().to_string(), value);
                    }
                }

                let outputs = session.run(SessionInputs::from(feed)).map_err(|e| {
                    RetrievalError::EmbeddingError(format!("ONNX forward failed: {e}"))
                })?;
                if outputs.len() == 0 {
                    return Err(RetrievalError::EmbeddingError(
                        "ONNX returned no outputs".to_string(),
                    ));
                }
                let array = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| {
                        RetrievalError::EmbeddingError(format!("Failed to decode ONNX output: {e}"))
                    })?
                    .to_owned();
                array
            };

            results.extend(pool_output(output, &flat.mask_rows, self.spec.dimension)?);
        }
        Ok(results)
    }
}

fn to_tensor(array: Array<i64, Ix2>) -> Result<DynTensor> {
    Ok(Tensor::from_array(array.into_dyn())
        .map_err(|e| RetrievalError::EmbeddingError(format!("{e}")))?
        .upcast())
}

fn default_intra_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match cpus {
        0..=4 => 1,
        5..=12 => 2,
        _ => 4,
    }
}

struct FlatBatch {
    ids: Vec<i64>,
    masks: Vec<i64>,
    type_ids: Vec<i64>,
    mask_rows: Vec<Vec<i64>>,
}

impl FlatBatch {
    fn from_encodings(encodings: &[Encoding], seq_len: usize) -> Self {
        let mut batch = Self {
            ids: Vec::with_capacity(encodings.len() * seq_len),
            masks: Vec::with_capacity(encodings.len() * seq_len),
            type_ids: Vec::with_capacity(encodings.len() * seq_len),
            mask_rows: Vec::with_capacity(encodings.len()),
        };
        for encoding in encodings {
            let ids = encoding.get_ids();
            let masks = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            for idx in 0..seq_len {
                batch.ids.push(i64::from(*ids.get(idx).unwrap_or(&0)));
                batch.masks.push(i64::from(*masks.get(idx).unwrap_or(&0)));
                batch.type_ids.push(i64::from(*types.get(idx).unwrap_or(&0)));
            }
            batch
                .mask_rows
                .push(masks.iter().take(seq_len).map(|v| i64::from(*v)).collect());
        }
        batch
    }
}

fn pool_output(
    array: ndarray::ArrayD<f32>,
    mask_rows: &[Vec<i64>],
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::new();
    match array.ndim() {
        // Already pooled by the graph.
        2 => {
            let rows = array
                .into_dimensionality::<Ix2>()
                .map_err(|e| RetrievalError::EmbeddingError(format!("Bad output shape: {e}")))?;
            for row in rows.outer_iter() {
                out.push(finish_vector(row.to_vec(), dimension)?);
            }
        }
        3 => {
            let hidden = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| RetrievalError::EmbeddingError(format!("Bad output shape: {e}")))?;
            for (idx, sample) in hidden.outer_iter().enumerate() {
                let pooled = match mask_rows.get(idx) {
                    Some(mask) => mean_pool(sample, mask),
                    None => mean_pool(sample, &vec![1; sample.len_of(Axis(0))]),
                };
                out.push(finish_vector(pooled, dimension)?);
            }
        }
        _ => {
            return Err(RetrievalError::EmbeddingError(format!(
                "Unexpected ONNX output dims: {:?}",
                array.shape()
            )));
        }
    }
    Ok(out)
}

fn finish_vector(mut vector: Vec<f32>, dimension: usize) -> Result<Vec<f32>> {
    if vector.len() != dimension {
        return Err(RetrievalError::InvalidDimension {
            expected: dimension,
            actual: vector.len(),
        });
    }
    normalize(&mut vector);
    Ok(vector)
}

fn mean_pool(sample: ndarray::ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let hidden = sample.len_of(Axis(1));
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (token_idx, token) in sample.outer_iter().enumerate() {
        if mask.get(token_idx).copied().unwrap_or(0) == 0 {
            continue;
        }
        count += 1.0;
        for (dim, value) in token.iter().enumerate() {
            sum[dim] += value;
        }
    }
    if count > 0.0 {
        for value in &mut sum {
            *value /= count;
        }
    }
    sum
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector {
        *value /= norm;
    }
}

fn stub_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vector = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let mantissa = ((bits >> 32) as u32) >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vector.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vector);
    vector
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

enum EncoderBackend {
    Ort(Arc<OrtBackend>),
    Stub,
}

/// Maps free text to the fixed-dimension vectors the corpus index was built with.
pub struct Encoder {
    backend: EncoderBackend,
    dimension: usize,
    model_id: &'static str,
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("mode", &self.mode())
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl Encoder {
    /// Loads the encoder for an index of the given dimension.
    pub fn load(mode: EmbeddingMode, model_dir: &Path, dimension: usize) -> Result<Self> {
        match mode {
            EmbeddingMode::Stub => Ok(Self::stub(dimension)),
            EmbeddingMode::Fast => {
                let spec = ModelSpec::for_dimension(dimension);
                let backend = OrtBackend::load(spec, model_dir)?;
                Ok(Self {
                    backend: EncoderBackend::Ort(Arc::new(backend)),
                    dimension: spec.dimension,
                    model_id: spec.id,
                })
            }
        }
    }

    #[must_use]
    pub const fn stub(dimension: usize) -> Self {
        Self {
            backend: EncoderBackend::Stub,
            dimension,
            model_id: "stub",
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn model_id(&self) -> &'static str {
        self.model_id
    }

    #[must_use]
    pub const fn mode(&self) -> EmbeddingMode {
        match self.backend {
            EncoderBackend::Ort(_) => EmbeddingMode::Fast,
            EncoderBackend::Stub => EmbeddingMode::Stub,
        }
    }

    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode_batch(vec![text]).await?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalError::EmbeddingError("Empty embedding result".to_string()))
    }

    pub async fn encode_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        match &self.backend {
            EncoderBackend::Stub => Ok(texts
                .into_iter()
                .map(|text| stub_vector(text, self.dimension))
                .collect()),
            EncoderBackend::Ort(backend) => {
                let backend = backend.clone();
                let owned: Vec<String> = texts.into_iter().map(ToString::to_string).collect();
                spawn_blocking(move || backend.encode_blocking(&owned))
                    .await
                    .map_err(|e| RetrievalError::EmbeddingError(format!("Join error: {e}")))?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_accepts_known_values() {
        assert_eq!(EmbeddingMode::parse("FAST").unwrap(), EmbeddingMode::Fast);
        assert_eq!(EmbeddingMode::parse(" stub ").unwrap(), EmbeddingMode::Stub);
        assert!(EmbeddingMode::parse("gpu").is_err());
    }

    #[test]
    fn model_spec_follows_index_dimension() {
        assert_eq!(ModelSpec::for_dimension(384).id, "all-MiniLM-L6-v2");
        assert_eq!(ModelSpec::for_dimension(1024).id, "bge-large-en-v1.5");
        assert_eq!(ModelSpec::for_dimension(768), MINILM_L6_V2);
    }

    #[tokio::test]
    async fn stub_encoder_is_deterministic_and_normalized() {
        let encoder = Encoder::stub(16);
        let a = encoder.encode("iron rich foods").await.unwrap();
        let b = encoder.encode("iron rich foods").await.unwrap();
        let c = encoder.encode("calcium sources").await.unwrap();

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fast_mode_reports_missing_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = Encoder::load(EmbeddingMode::Fast, dir.path(), 384).unwrap_err();
        assert!(
            err.to_string().contains("all-MiniLM-L6-v2"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn mean_pool_ignores_masked_tokens() {
        let sample = ndarray::arr2(&[[1.0f32, 3.0], [3.0, 5.0], [100.0, 100.0]]);
        let pooled = mean_pool(sample.view(), &[1, 1, 0]);
        assert_eq!(pooled, vec![2.0, 4.0]);
    }
}
