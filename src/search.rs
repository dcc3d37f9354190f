// Hybrid FTS + vector search (spec §4.8).

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::config::CoreConfig;
use crate::embedder::{Embedder, EmbedderManager};
use crate::error::{CoreError, CoreResult};
use crate::observability::PerfTimer;
use crate::store::Store;
use crate::types::{EntityKind, EntityKindDto, SearchHit, SearchOptions};

/// Query-side entry point. Unlike `IngestionPipeline`, this fails fast if
/// the database does not already exist — there is nothing useful a search
/// can do against a store it would have to create from scratch.
pub struct SearchEngine {
    store: Store,
    embedder: Arc<dyn Embedder>,
}

struct ScoredId {
    id: i64,
    fts_score: f64,
    vector_score: f64,
    combined: f64,
}

impl SearchEngine {
    pub fn open(config: CoreConfig) -> CoreResult<Self> {
        if !config.db_path().exists() {
            return Err(CoreError::MissingDatabase { path: config.db_path() });
        }
        let store = Store::open(&config)?;
        let embedder = EmbedderManager::global(&config);
        Ok(Self { store, embedder })
    }

    #[instrument(skip(self, options), fields(query = %options.query, kind = ?options.kind))]
    pub async fn search(&self, options: &SearchOptions) -> CoreResult<Vec<SearchHit>> {
        let _timer = PerfTimer::new("search");
        let kinds: Vec<EntityKind> = match options.kind {
            Some(k) => vec![k],
            None => EntityKind::all().to_vec(),
        };

        let query_embedding = if options.use_vectors && self.store.vector_support() && !options.query.trim().is_empty() {
            self.embedder.embed(&options.query).await.ok()
        } else {
            None
        };

        let mut per_kind = Vec::new();
        for kind in kinds {
            let hits = self.search_kind(kind, options, query_embedding.as_deref())?;
            per_kind.push((kind, hits));
        }

        let merged = if options.kind.is_some() {
            per_kind.into_iter().next().map(|(_, h)| h).unwrap_or_default()
        } else {
            let mut all: Vec<_> = per_kind.into_iter().flat_map(|(_, h)| h).collect();
            all.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal));
            all.truncate(options.limit);
            all
        };
        Ok(merged)
    }

    fn search_kind(&self, kind: EntityKind, options: &SearchOptions, query_embedding: Option<&[f32]>) -> CoreResult<Vec<SearchHit>> {
        let fts_query = escape_fts_query(&options.query);
        let fts_scores = self.run_fts_query(kind, &fts_query, options.package_filter.as_deref())?;

        let vector_scores: HashMap<i64, f64> = match query_embedding {
            Some(embedding) => self
                .store
                .vector_search(kind, embedding, options.limit * 2)?
                .into_iter()
                .map(|(id, distance)| (id, if distance.is_finite() { 1.0 - distance } else { 0.0 }))
                .collect(),
            None => HashMap::new(),
        };

        let mut ids: Vec<i64> = fts_scores.keys().chain(vector_scores.keys()).copied().filter(|id| *id > 0).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut scored: Vec<ScoredId> = ids
            .into_iter()
            .map(|id| {
                let fts = fts_scores.get(&id).copied().unwrap_or(0.0);
                let vec = vector_scores.get(&id).copied().unwrap_or(0.0);
                let combined = if fts > 0.0 && vec > 0.0 {
                    fts * options.fts_weight + vec * options.vector_weight
                } else {
                    fts.max(vec)
                };
                ScoredId { id, fts_score: fts, vector_score: vec, combined }
            })
            .filter(|s| s.combined > 0.0)
            .collect();

        scored.sort_by(|a, b| b.combined.partial_cmp(&a.combined).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(options.limit);

        self.fetch_details(kind, scored)
    }

    fn run_fts_query(&self, kind: EntityKind, fts_query: &str, package_filter: Option<&str>) -> CoreResult<HashMap<i64, f64>> {
        if fts_query.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.store.connection();
        let mut scores = HashMap::new();

        let sql = match kind {
            EntityKind::Package => {
                "SELECT p.id, bm25(fts_packages) FROM fts_packages
                 JOIN packages p ON p.id = fts_packages.rowid
                 WHERE fts_packages MATCH ?1 AND (?2 IS NULL OR p.name = ?2)"
                    .to_string()
            }
            EntityKind::Function => {
                "SELECT f.id, bm25(fts_functions) FROM fts_functions
                 JOIN functions f ON f.id = fts_functions.rowid
                 JOIN modules m ON m.id = f.module_id
                 JOIN packages p ON p.id = m.package_id
                 WHERE fts_functions MATCH ?1 AND (?2 IS NULL OR p.name = ?2)"
                    .to_string()
            }
            EntityKind::Type => {
                "SELECT t.id, bm25(fts_types) FROM fts_types
                 JOIN types t ON t.id = fts_types.rowid
                 JOIN modules m ON m.id = t.module_id
                 JOIN packages p ON p.id = m.package_id
                 WHERE fts_types MATCH ?1 AND (?2 IS NULL OR p.name = ?2)"
                    .to_string()
            }
            EntityKind::Example => {
                "SELECT e.id, bm25(fts_examples) FROM fts_examples
                 JOIN code_examples e ON e.id = fts_examples.rowid
                 LEFT JOIN packages p ON p.id = e.package_id
                 WHERE fts_examples MATCH ?1 AND (?2 IS NULL OR p.name = ?2)"
                    .to_string()
            }
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![fts_query, package_filter], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (id, raw_rank) = row?;
            scores.insert(id, -raw_rank);
        }
        Ok(scores)
    }

    fn fetch_details(&self, kind: EntityKind, scored: Vec<ScoredId>) -> CoreResult<Vec<SearchHit>> {
        if scored.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.store.connection();
        let dto: EntityKindDto = kind.into();

        let mut hits = Vec::with_capacity(scored.len());
        for s in &scored {
            let detail = match kind {
                EntityKind::Package => conn
                    .query_row(
                        "SELECT name, description FROM packages WHERE id = ?1",
                        rusqlite::params![s.id],
                        |row| Ok((row.get::<_, String>(0)?, None::<String>, None::<String>, None::<String>, row.get::<_, String>(1)?)),
                    )
                    .ok(),
                EntityKind::Function => conn
                    .query_row(
                        "SELECT f.name, f.fully_qualified_name, f.signature, m.full_path, p.name, f.doc_comment
                         FROM functions f JOIN modules m ON m.id = f.module_id JOIN packages p ON p.id = m.package_id
                         WHERE f.id = ?1",
                        rusqlite::params![s.id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                Some(row.get::<_, String>(1)?),
                                Some(row.get::<_, String>(2)?),
                                Some(format!("{}::{}", row.get::<_, String>(4)?, row.get::<_, String>(3)?)),
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .ok(),
                EntityKind::Type => conn
                    .query_row(
                        "SELECT t.name, t.fully_qualified_name, m.full_path, p.name, t.doc_comment
                         FROM types t JOIN modules m ON m.id = t.module_id JOIN packages p ON p.id = m.package_id
                         WHERE t.id = ?1",
                        rusqlite::params![s.id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                Some(row.get::<_, String>(1)?),
                                None,
                                Some(format!("{}::{}", row.get::<_, String>(3)?, row.get::<_, String>(2)?)),
                                row.get::<_, String>(4)?,
                            ))
                        },
                    )
                    .ok(),
                EntityKind::Example => conn
                    .query_row(
                        "SELECT e.code, p.name FROM code_examples e LEFT JOIN packages p ON p.id = e.package_id WHERE e.id = ?1",
                        rusqlite::params![s.id],
                        |row| Ok((row.get::<_, String>(0)?, None, None, row.get::<_, Option<String>>(1)?, String::new())),
                    )
                    .ok(),
            };

            let Some((name, fqn, signature, module_or_package, doc_comment)) = detail else {
                continue;
            };
            let (module_path, package_name) = match kind {
                EntityKind::Package => (None, Some(name.clone())),
                EntityKind::Example => (None, module_or_package.clone()),
                _ => {
                    let combo = module_or_package.clone();
                    let package_name = combo.as_ref().and_then(|c| c.split("::").next()).map(str::to_string);
                    (combo, package_name)
                }
            };

            hits.push(SearchHit {
                id: s.id,
                kind: dto,
                name,
                fully_qualified_name: fqn,
                signature,
                module_path,
                package_name,
                doc_comment: if doc_comment.is_empty() { None } else { Some(doc_comment) },
                combined_score: s.combined,
                fts_score: s.fts_score,
                vector_score: s.vector_score,
            });
        }
        Ok(hits)
    }

    /// `get_imports_for_symbol` (spec §4.8): look up by FQN first, falling
    /// back to the enclosing module when no direct requirement is on file.
    pub fn get_imports_for_symbol(&self, fqn: &str) -> CoreResult<Vec<String>> {
        let conn = self.store.connection();
        let mut stmt = conn.prepare(
            "SELECT ir.import_path FROM import_requirements ir
             JOIN functions f ON f.id = ir.function_id
             WHERE f.fully_qualified_name = ?1
             UNION
             SELECT ir.import_path FROM import_requirements ir
             JOIN types t ON t.id = ir.type_id
             WHERE t.fully_qualified_name = ?1",
        )?;
        let mut imports: Vec<String> = stmt.query_map(rusqlite::params![fqn], |row| row.get(0))?.collect::<Result<_, _>>()?;

        if imports.is_empty() {
            if let Some((module_path, _)) = fqn.rsplit_once('.') {
                imports.push(module_path.to_string());
            }
        }
        Ok(imports)
    }

    pub fn get_imports_for_symbols(&self, symbols: &[String]) -> CoreResult<Vec<String>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for symbol in symbols {
            for import in self.get_imports_for_symbol(symbol)? {
                if seen.insert(import.clone()) {
                    out.push(import);
                }
            }
        }
        Ok(out)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Double-quote each whitespace-separated term, doubling embedded quotes,
/// so no term can be read as an FTS operator (spec §4.8 "Query safety").
pub fn escape_fts_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_fts_query_quotes_each_term_and_doubles_embedded_quotes() {
        assert_eq!(escape_fts_query("foo bar"), "\"foo\" \"bar\"");
        assert_eq!(escape_fts_query(r#"a"b"#), "\"a\"\"b\"");
        assert_eq!(escape_fts_query(""), "");
    }

    #[test]
    fn escape_fts_query_neutralizes_operator_characters() {
        let escaped = escape_fts_query("foo* OR bar: baz.qux");
        for term in escaped.split(' ') {
            assert!(term.starts_with('"') && term.ends_with('"'));
        }
    }

    proptest::proptest! {
        // P7 (FTS-escaping safety): every whitespace-separated term comes
        // back double-quoted with embedded quotes doubled, for any ASCII
        // input including FTS operator characters.
        #[test]
        fn escape_fts_query_always_wraps_terms_in_balanced_quotes(raw in "[ -~]{0,64}") {
            let escaped = escape_fts_query(&raw);
            for term in escaped.split(' ').filter(|t| !t.is_empty()) {
                proptest::prop_assert!(term.starts_with('"'));
                proptest::prop_assert!(term.ends_with('"'));
                let inner = &term[1..term.len() - 1];
                let mut chars = inner.chars().peekable();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        proptest::prop_assert_eq!(chars.next(), Some('"'), "unescaped quote in {:?}", term);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn search_without_vectors_matches_fts_only_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::CoreConfig::builder().data_root(dir.keep()).vector_dimension(16).build().unwrap();
        // Touch the db file so SearchEngine::open's existence check passes.
        let store = Store::open(&config).unwrap();
        let pkg_id = store
            .insert_package(&crate::store::models::PackageMeta {
                name: "vibe-d".into(),
                version: "0.9.0".into(),
                description: "an async web framework".into(),
                ..Default::default()
            })
            .unwrap();
        store.update_fts_package(pkg_id, "vibe-d", "an async web framework", "").unwrap();
        drop(store);

        crate::embedder::EmbedderManager::reset();
        let engine = SearchEngine::open(config).unwrap();
        let options = SearchOptions::new("async framework").without_vectors().with_kind(EntityKind::Package);
        let hits = engine.search(&options).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "vibe-d");
        assert!(hits[0].fts_score > 0.0);
        assert_eq!(hits[0].vector_score, 0.0);
    }

    #[tokio::test]
    async fn search_excludes_id_zero_from_fts_and_vector_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::CoreConfig::builder().data_root(dir.keep()).vector_dimension(16).build().unwrap();
        let store = Store::open(&config).unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO fts_packages(rowid, name, description, tags) VALUES (0, 'zeroid', 'a sentinel row', '')",
                [],
            )
            .unwrap();
        drop(store);

        crate::embedder::EmbedderManager::reset();
        let engine = SearchEngine::open(config).unwrap();
        let options = SearchOptions::new("zeroid").without_vectors().with_kind(EntityKind::Package);
        let hits = engine.search(&options).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn open_fails_fast_when_database_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::CoreConfig::builder().data_root(dir.keep()).build().unwrap();
        let err = SearchEngine::open(config).unwrap_err();
        assert!(matches!(err, CoreError::MissingDatabase { .. }));
    }

    #[test]
    fn get_imports_for_symbol_falls_back_to_enclosing_module() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::CoreConfig::builder().data_root(dir.keep()).build().unwrap();
        let store = Store::open(&config).unwrap();
        drop(store);
        crate::embedder::EmbedderManager::reset();
        let engine = SearchEngine::open(config).unwrap();
        let imports = engine.get_imports_for_symbol("std.algorithm.filter").unwrap();
        assert_eq!(imports, vec!["std.algorithm".to_string()]);
    }
}
