//! Semantic layer: local dense embeddings over symbol names.
//!
//! The embedder is a process-wide, lazily initialized resource with an
//! explicit model identity; it is reconstructed only when a caller asks
//! for a different model. fastembed models already apply mean pooling and
//! L2 normalization, so vectors come back search-ready.

pub mod cache;

use crate::error::AtlasError;
use anyhow::Result;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

pub struct Embedder {
    model_id: String,
    inner: TextEmbedding,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    fn init(model_id: &str) -> Result<Self> {
        let model = model_for_id(model_id)
            .ok_or_else(|| AtlasError::Embedding(format!("unknown model '{model_id}'")))?;
        let inner = TextEmbedding::try_new(
            InitOptions::new(model).with_show_download_progress(false),
        )
        .map_err(|e| AtlasError::Embedding(format!("failed to initialize '{model_id}': {e}")))?;
        Ok(Self {
            model_id: model_id.to_string(),
            inner,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Embed a batch of texts into sentence vectors.
    pub fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.inner
            .embed(texts, None)
            .map_err(|e| AtlasError::Embedding(format!("inference failed: {e}")).into())
    }
}

fn model_for_id(model_id: &str) -> Option<EmbeddingModel> {
    match model_id {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Some(EmbeddingModel::AllMiniLML6V2)
        }
        "bge-small-en-v1.5" | "BAAI/bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "BAAI/bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
        _ => None,
    }
}

static EMBEDDER: OnceLock<RwLock<Option<Arc<Embedder>>>> = OnceLock::new();

/// The process-wide embedder. Constructed on first use; replaced only
/// when a different model is requested.
pub fn embedder(model_id: Option<&str>) -> Result<Arc<Embedder>> {
    let requested = model_id.unwrap_or(DEFAULT_MODEL);
    let slot = EMBEDDER.get_or_init(|| RwLock::new(None));

    if let Some(current) = slot.read().as_ref() {
        if current.model_id() == requested {
            return Ok(current.clone());
        }
    }

    let mut guard = slot.write();
    if let Some(current) = guard.as_ref() {
        if current.model_id() == requested {
            return Ok(current.clone());
        }
    }
    tracing::info!("loading embedding model {requested}");
    let fresh = Arc::new(Embedder::init(requested)?);
    *guard = Some(fresh.clone());
    Ok(fresh)
}

/// Cosine similarity; 0 when either operand has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_norm_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_stays_in_range() {
        let a = [0.3, -0.7, 0.2, 0.9];
        let b = [-0.1, 0.4, 0.8, -0.5];
        let score = cosine(&a, &b);
        assert!((-1.0..=1.0).contains(&score));
    }

    #[test]
    fn unknown_model_is_an_embedding_error() {
        let err = Embedder::init("no-such-model").unwrap_err();
        assert!(err.to_string().contains("unknown model"));
    }
}
