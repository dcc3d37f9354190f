// Text -> fixed-dimension vector embedding (spec §4.2). Two backends behind
// a shared capability-set trait, selected by a lazily-initialized,
// process-wide manager (Design Notes §9: "avoid global mutable state in the
// core" — the manager itself is the one deliberate exception, modeled as an
// explicit, resettable singleton rather than ambient globals elsewhere).

pub mod tfidf;

#[cfg(feature = "embeddings-onnx")]
pub mod neural;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::CoreResult;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize;
    fn is_available(&self) -> bool;
    fn name(&self) -> &str;
}

/// L2-normalize in place. Returns `false` (leaving the vector untouched,
/// which callers use to mean "the zero vector") when the norm is ~0.
pub(crate) fn l2_normalize(v: &mut [f32]) -> bool {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-12 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

static MANAGER: Lazy<RwLock<Option<Arc<dyn Embedder>>>> = Lazy::new(|| RwLock::new(None));

/// Process-wide embedder selection. Lazily built on first access; immutable
/// afterwards until `reset()` is called (tests only — spec §5: "its primary
/// backend is immutable after initialization").
pub struct EmbedderManager;

impl EmbedderManager {
    pub fn global(config: &CoreConfig) -> Arc<dyn Embedder> {
        if let Some(existing) = MANAGER.read().clone() {
            return existing;
        }
        let mut guard = MANAGER.write();
        if let Some(existing) = guard.clone() {
            return existing;
        }
        let chosen = build_default_embedder(config);
        *guard = Some(chosen.clone());
        chosen
    }

    /// Clear the singleton so the next `global()` call rebuilds it. Tests
    /// use this to isolate embedder state across cases.
    pub fn reset() {
        *MANAGER.write() = None;
    }
}

fn build_default_embedder(config: &CoreConfig) -> Arc<dyn Embedder> {
    #[cfg(feature = "embeddings-onnx")]
    {
        if let Ok(backend) = neural::NeuralEmbedder::load(config) {
            if backend.is_available() {
                return Arc::new(backend);
            }
        }
    }
    let _ = config;
    Arc::new(tfidf::TfIdfEmbedder::new(config.vector_dimension))
}
