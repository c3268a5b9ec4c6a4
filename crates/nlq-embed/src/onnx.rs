//! ONNX-based embedding model implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use nlq_core::{Embedder, EmbeddingConfig, NlqError, Result};

/// ONNX-based embedder for a sentence-transformer style model.
///
/// Mean pooling over valid tokens, L2 normalized output. The session
/// lives behind a Mutex because ort sessions need `&mut` to run.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Load the model and tokenizer from the configured paths.
    ///
    /// Any load failure maps to `EmbeddingUnavailable`; callers decide
    /// whether to degrade or abort.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        info!("Loading ONNX embedding model from {:?}", config.model_path);

        let session = Session::builder()
            .map_err(|e| NlqError::embedding_unavailable(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| NlqError::embedding_unavailable(format!("optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| NlqError::embedding_unavailable(format!("thread count: {}", e)))?
            .commit_from_file(&config.model_path)
            .map_err(|e| NlqError::embedding_unavailable(format!("model load: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| NlqError::embedding_unavailable(format!("tokenizer load: {}", e)))?;

        info!("Embedder initialized: dim={}", config.dimension);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension: config.dimension,
        })
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| NlqError::embedding_unavailable(format!("tokenization failed: {}", e)))?;

        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        let seq_len = ids.len();

        if seq_len == 0 {
            return Ok(vec![0.0; self.dimension]);
        }

        let input_ids: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = mask.iter().map(|&m| m as i64).collect();

        let input_ids_tensor = Tensor::from_array((vec![1, seq_len], input_ids))
            .map_err(|e| NlqError::embedding_unavailable(format!("input tensor: {}", e)))?;
        let attention_mask_tensor = Tensor::from_array((vec![1, seq_len], attention_mask))
            .map_err(|e| NlqError::embedding_unavailable(format!("mask tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| NlqError::embedding_unavailable(format!("session lock: {}", e)))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])
            .map_err(|e| NlqError::embedding_unavailable(format!("inference failed: {}", e)))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| NlqError::embedding_unavailable("no output tensor"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| NlqError::embedding_unavailable(format!("tensor extract: {}", e)))?;

        let shape: Vec<usize> = view.shape().to_vec();
        debug!("Embedding output shape: {:?}", shape);

        let embedding = match shape.len() {
            // (1, seq_len, hidden) - mean pool over valid tokens
            3 => mean_pool(&view, mask),
            // (1, hidden) - already pooled
            2 => (0..shape[1]).map(|j| view[[0, j]]).collect(),
            _ => {
                return Err(NlqError::embedding_unavailable(format!(
                    "unexpected output shape: {:?}",
                    shape
                )))
            }
        };

        Ok(l2_normalize(embedding))
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Inference is synchronous; the session is not Send.
        self.embed_text(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mean pooling over the sequence dimension with attention mask.
fn mean_pool(view: &ArrayViewD<'_, f32>, mask: &[u32]) -> Vec<f32> {
    let seq_len = view.shape()[1];
    let hidden = view.shape()[2];

    let valid: Vec<usize> = (0..seq_len)
        .filter(|&j| mask.get(j).copied().unwrap_or(0) == 1)
        .collect();
    if valid.is_empty() {
        return vec![0.0; hidden];
    }

    let mut sum = vec![0.0f32; hidden];
    for &j in &valid {
        for k in 0..hidden {
            sum[k] += view[[0, j, k]];
        }
    }
    sum.iter().map(|s| s / valid.len() as f32).collect()
}

/// L2 normalize a vector in place.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = l2_normalize(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_mean_pool_skips_padding() {
        // (1, 3, 2): token embeddings [1,2], [3,4], [100,100] with the
        // last one masked out.
        let data = vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let arr = ArrayD::from_shape_vec(vec![1, 3, 2], data).unwrap();
        let pooled = mean_pool(&arr.view(), &[1, 1, 0]);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }
}
