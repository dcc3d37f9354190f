// Optional transformer-backed embedding backend (spec §4.2 "Neural
// backend"). Loads an ONNX model and tokenizer from `CoreConfig::models_dir()`.
// Any failure at load time or during a single `embed` call silently
// delegates to the TF-IDF backend it carries internally — from the
// caller's perspective this backend never errors.

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::Tokenizer;
use tracing::warn;

use super::tfidf::TfIdfEmbedder;
use super::{l2_normalize, Embedder};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};

const MAX_SEQ_LEN: usize = 128;
const CLS_TOKEN: &str = "[CLS]";
const SEP_TOKEN: &str = "[SEP]";
const UNK_TOKEN: &str = "[UNK]";

/// Load a tokenizer from `tokenizer.json` if present, else assemble a
/// BERT-style WordPiece pipeline from a bare `vocab.txt`.
fn load_tokenizer(models_dir: &Path) -> CoreResult<Option<Tokenizer>> {
    let tokenizer_json = models_dir.join("tokenizer.json");
    if tokenizer_json.exists() {
        return Tokenizer::from_file(&tokenizer_json)
            .map(Some)
            .map_err(|e| CoreError::Parse { detail: format!("failed to load tokenizer.json: {e}") });
    }

    let vocab_txt = models_dir.join("vocab.txt");
    if !vocab_txt.exists() {
        return Ok(None);
    }

    let wordpiece = WordPiece::from_file(vocab_txt.to_string_lossy().as_ref())
        .unk_token(UNK_TOKEN.to_string())
        .build()
        .map_err(|e| CoreError::Parse { detail: format!("failed to build wordpiece model: {e}") })?;
    let cls_id = wordpiece.token_to_id(CLS_TOKEN).ok_or_else(|| CoreError::Parse {
        detail: "vocabulary missing [CLS] token".into(),
    })?;
    let sep_id = wordpiece.token_to_id(SEP_TOKEN).ok_or_else(|| CoreError::Parse {
        detail: "vocabulary missing [SEP] token".into(),
    })?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new((SEP_TOKEN.to_string(), sep_id), (CLS_TOKEN.to_string(), cls_id))));
    tokenizer.with_truncation(Some(tokenizers::utils::truncation::TruncationParams {
        max_length: MAX_SEQ_LEN,
        ..Default::default()
    }))
    .map_err(|e| CoreError::Parse { detail: format!("failed to configure truncation: {e}") })?;
    tokenizer.with_padding(Some(tokenizers::utils::padding::PaddingParams {
        strategy: tokenizers::utils::padding::PaddingStrategy::Fixed(MAX_SEQ_LEN),
        ..Default::default()
    }));

    Ok(Some(tokenizer))
}

pub struct NeuralEmbedder {
    session: Option<Session>,
    tokenizer: Option<Tokenizer>,
    fallback: TfIdfEmbedder,
    dimension: usize,
}

impl NeuralEmbedder {
    pub fn load(config: &CoreConfig) -> CoreResult<Self> {
        let model_path = config.models_dir().join("model.onnx");
        let fallback = TfIdfEmbedder::new(config.vector_dimension);

        if !model_path.exists() {
            return Ok(Self { session: None, tokenizer: None, fallback, dimension: config.vector_dimension });
        }

        let session = build_session(&model_path).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        let tokenizer = match load_tokenizer(&config.models_dir()) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "failed to load neural tokenizer, falling back to tfidf");
                None
            }
        };

        Ok(Self { session: Some(session), tokenizer, fallback, dimension: config.vector_dimension })
    }

    fn run_inference(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let session = self.session.as_ref().ok_or_else(|| anyhow::anyhow!("no onnx session loaded"))?;
        let tokenizer = self.tokenizer.as_ref().ok_or_else(|| anyhow::anyhow!("no tokenizer loaded"))?;

        let encoding = tokenizer.encode(text, true).map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention: Vec<i64> = encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
        let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = ids.len();

        let input_ids = Array2::from_shape_vec((1, seq_len), ids)?;
        let attention_mask = Array2::from_shape_vec((1, seq_len), attention.clone())?;
        let token_type_ids = Array2::from_shape_vec((1, seq_len), type_ids)?;

        let outputs = session.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids)?,
            "attention_mask" => Value::from_array(attention_mask)?,
            "token_type_ids" => Value::from_array(token_type_ids)?,
        ]?)?;

        let (shape, data) = outputs["last_hidden_state"].try_extract_raw_tensor::<f32>()?;
        let hidden_size = *shape.last().ok_or_else(|| anyhow::anyhow!("unexpected model output rank"))? as usize;

        let mut pooled = vec![0.0f32; hidden_size];
        let mut active = 0usize;
        for (pos, &mask) in attention.iter().enumerate() {
            if mask == 0 {
                continue;
            }
            active += 1;
            let base = pos * hidden_size;
            for h in 0..hidden_size {
                pooled[h] += data[base + h];
            }
        }
        if active > 0 {
            for v in pooled.iter_mut() {
                *v /= active as f32;
            }
        }

        let mut resized = resize_to_dimension(pooled, self.dimension);
        l2_normalize(&mut resized);
        Ok(resized)
    }
}

/// Project (or pad) the model's native hidden size onto the configured
/// embedding dimension so every backend shares one vector-table width.
fn resize_to_dimension(mut v: Vec<f32>, dimension: usize) -> Vec<f32> {
    if v.len() == dimension {
        return v;
    }
    if v.len() > dimension {
        v.truncate(dimension);
        return v;
    }
    v.resize(dimension, 0.0);
    v
}

fn build_session(model_path: &PathBuf) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(1)?
        .commit_from_file(model_path)?;
    Ok(session)
}

#[async_trait]
impl Embedder for NeuralEmbedder {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        if text.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }
        match self.run_inference(text) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(error = %e, "neural inference failed, delegating to tfidf");
                self.fallback.embed(text).await
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        self.session.is_some() && self.tokenizer.is_some()
    }

    fn name(&self) -> &str {
        "neural"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_pads_short_vectors_with_zeros() {
        let v = resize_to_dimension(vec![1.0, 2.0], 5);
        assert_eq!(v, vec![1.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn resize_truncates_long_vectors() {
        let v = resize_to_dimension(vec![1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(v, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn load_without_model_file_is_unavailable_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::builder()
            .data_root(dir.path())
            .vector_dimension(32)
            .build()
            .unwrap();
        let embedder = NeuralEmbedder::load(&config).unwrap();
        assert!(!embedder.is_available());
        let v = embedder.embed("std.algorithm.filter").await.unwrap();
        assert_eq!(v.len(), 32);
    }
}
