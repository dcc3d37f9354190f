// TF-IDF embedding backend (spec §4.2). Always available; seeded with a
// fixed vocabulary of domain-common terms so a freshly-constructed embedder
// is immediately usable before any `train()` call.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{l2_normalize, Embedder};
use crate::error::{CoreError, CoreResult};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][a-z0-9_]*").unwrap());

/// Domain-common terms: language keywords, attribute names, and identifiers
/// that recur across documentation and signatures regardless of corpus.
const SEED_VOCABULARY: &[&str] = &[
    "safe", "trusted", "system", "nogc", "nothrow", "pure", "const", "immutable", "shared",
    "scope", "ref", "out", "lazy", "auto", "static", "override", "abstract", "final", "package",
    "private", "public", "protected", "export", "module", "import", "alias", "mixin", "template",
    "struct", "class", "interface", "enum", "union", "function", "delegate", "unittest", "version",
    "debug", "synchronized", "return", "void", "bool", "byte", "ubyte", "short", "ushort", "int",
    "uint", "long", "ulong", "float", "double", "real", "char", "wchar", "dchar", "string",
    "wstring", "dstring", "array", "pointer", "range", "slice", "length", "capacity", "allocate",
    "append", "remove", "insert", "sort", "filter", "map", "reduce", "iterate", "container",
    "algorithm", "exception", "error", "throw", "catch", "finally", "assert", "invariant", "this",
    "super", "new", "delete", "null", "true", "false", "foreach", "while", "break", "continue",
    "switch", "case", "default", "size", "index", "value", "key", "item", "node", "buffer", "stream",
];

struct VocabState {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

pub struct TfIdfEmbedder {
    dimension: usize,
    state: RwLock<VocabState>,
}

#[derive(Serialize, Deserialize)]
struct PersistedVocab {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() >= 2 && t.len() < 20)
        .collect()
}

impl TfIdfEmbedder {
    pub fn new(dimension: usize) -> Self {
        let mut vocabulary = HashMap::new();
        for (i, term) in SEED_VOCABULARY.iter().take(dimension).enumerate() {
            vocabulary.insert((*term).to_string(), i);
        }
        let idf = vec![1.0; dimension];
        Self {
            dimension,
            state: RwLock::new(VocabState { vocabulary, idf }),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec;
        }
        let total = tokens.len() as f64;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for t in &tokens {
            *counts.entry(t.as_str()).or_insert(0) += 1;
        }

        let state = self.state.read();
        for (term, count) in counts {
            if let Some(&i) = state.vocabulary.get(term) {
                let tf = count as f64 / total;
                vec[i] = (tf * state.idf[i]) as f32;
            }
        }
        drop(state);
        l2_normalize(&mut vec);
        vec
    }

    /// Train document frequencies over `corpus`: existing vocabulary terms
    /// get a refreshed idf; previously-unseen terms fill any remaining empty
    /// vocabulary slots (spec §4.2: "extend vocab with previously unseen
    /// terms up to D").
    pub fn train(&self, corpus: &[String]) {
        let n = corpus.len().max(1) as f64;
        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in corpus {
            let mut seen = std::collections::HashSet::new();
            for t in tokenize(doc) {
                if seen.insert(t.clone()) {
                    *df.entry(t).or_insert(0) += 1;
                }
            }
        }

        let mut state = self.state.write();
        for (term, count) in &df {
            if let Some(&i) = state.vocabulary.get(term.as_str()) {
                state.idf[i] = (n / *count as f64).ln() + 1.0;
            }
        }

        let mut unseen: Vec<(&String, &usize)> = df
            .iter()
            .filter(|(term, _)| !state.vocabulary.contains_key(term.as_str()))
            .collect();
        unseen.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (term, count) in unseen {
            if state.vocabulary.len() >= self.dimension {
                break;
            }
            let idx = state.vocabulary.len();
            let idf_value = (n / *count as f64).ln() + 1.0;
            state.vocabulary.insert(term.clone(), idx);
            state.idf[idx] = idf_value;
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let state = self.state.read();
        let persisted = PersistedVocab {
            vocabulary: state.vocabulary.clone(),
            idf: state.idf.clone(),
        };
        drop(state);
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        }
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        std::fs::write(path, json).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        let persisted: PersistedVocab =
            serde_json::from_str(&raw).map_err(|e| CoreError::Parse { detail: format!("{e}") })?;
        let mut state = self.state.write();
        state.vocabulary = persisted.vocabulary;
        state.idf = persisted.idf;
        Ok(())
    }
}

#[async_trait]
impl Embedder for TfIdfEmbedder {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_string_maps_to_zero_vector() {
        let e = TfIdfEmbedder::new(64);
        let v = e.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn nonempty_input_is_unit_norm() {
        let e = TfIdfEmbedder::new(64);
        let v = e.embed("safe nogc pure function returns void").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let e = TfIdfEmbedder::new(64);
        let a = e.embed("struct Stack template range").await.unwrap();
        let b = e.embed("struct Stack template range").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn train_raises_idf_for_corpus_terms_and_extends_vocab() {
        let e = TfIdfEmbedder::new(SEED_VOCABULARY.len() + 4);
        let corpus = vec![
            "widgetfactory builds widgets".to_string(),
            "widgetfactory configures widgets".to_string(),
            "safe pure function".to_string(),
        ];
        e.train(&corpus);
        let state = e.state.read();
        assert!(state.vocabulary.contains_key("widgetfactory"));
        let idx = state.vocabulary["safe"];
        assert!(state.idf[idx] >= 1.0);
    }

    #[test]
    fn save_then_load_round_trips_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        let e1 = TfIdfEmbedder::new(32);
        e1.train(&["quux frobnicate quux".to_string()]);
        e1.save(&path).unwrap();

        let e2 = TfIdfEmbedder::new(32);
        e2.load(&path).unwrap();

        let v1 = e1.embed_sync("quux frobnicate");
        let v2 = e2.embed_sync("quux frobnicate");
        assert_eq!(v1, v2);
    }
}
