// Embedded relational store (spec §4.1). Owns the SQLite connection,
// schema, and every CRUD/FTS/vector operation. Not thread-safe on its own —
// per spec §5 callers must serialize access to a single `Store`.

pub mod models;
pub mod schema;
pub mod transaction;
pub mod vector_codec;

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{EntityKind, IngestionStatus, TypeKind};
use models::*;
use transaction::TxGuard;

pub struct Store {
    conn: Connection,
    vector_support: bool,
    dimension: usize,
}

impl Store {
    /// Open (creating if absent) the database at `config.db_path()`,
    /// configure durability pragmas, attempt to load the vector extension,
    /// and initialize the schema.
    #[instrument(skip(config))]
    pub fn open(config: &CoreConfig) -> CoreResult<Self> {
        if let Some(parent) = config.db_path().parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Parse {
                detail: format!("failed to create data root {}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(config.db_path())?;
        configure_pragmas(&conn)?;

        let vector_support = try_load_vector_extension(&conn, config);
        if !vector_support {
            warn!("vector extension unavailable — continuing without vector indexes");
        }

        schema::initialize_schema(&conn, vector_support, config.vector_dimension)?;

        Ok(Self {
            conn,
            vector_support,
            dimension: config.vector_dimension,
        })
    }

    /// Open an in-memory store (used by tests and the neural/TF-IDF
    /// vocabulary-training pass when no on-disk path is needed).
    pub fn open_in_memory(vector_support_requested: bool, dimension: usize) -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_pragmas(&conn)?;
        // In-memory stores never attempt to dlopen the extension; vector
        // support here reflects whether the caller compiled with it linked
        // in through `sqlite-vec::sqlite3_vec_init`-style static init, which
        // tests opt into explicitly.
        schema::initialize_schema(&conn, vector_support_requested, dimension)?;
        Ok(Self {
            conn,
            vector_support: vector_support_requested,
            dimension,
        })
    }

    pub fn vector_support(&self) -> bool {
        self.vector_support
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn begin(&self) -> CoreResult<TxGuard<'_>> {
        TxGuard::begin(&self.conn)
    }

    // ---- package ----------------------------------------------------

    #[instrument(skip(self, meta), fields(name = %meta.name))]
    pub fn insert_package(&self, meta: &PackageMeta) -> CoreResult<i64> {
        let authors = serde_json::to_string(&meta.authors).unwrap_or_else(|_| "[]".into());
        let tags = serde_json::to_string(&meta.tags).unwrap_or_else(|_| "[]".into());
        let id: i64 = self.conn.query_row(
            "INSERT INTO packages (name, version, description, repository, homepage, license, authors, tags, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
             ON CONFLICT(name) DO UPDATE SET
                version = excluded.version,
                description = excluded.description,
                repository = excluded.repository,
                homepage = excluded.homepage,
                license = excluded.license,
                authors = excluded.authors,
                tags = excluded.tags,
                updated_at = CURRENT_TIMESTAMP
             RETURNING id",
            params![
                meta.name,
                meta.version,
                meta.description,
                meta.repository,
                meta.homepage,
                meta.license,
                authors,
                tags,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ---- module -------------------------------------------------------

    #[instrument(skip(self, module), fields(full_path = %module.full_path))]
    pub fn insert_module(&self, package_id: i64, module: &ModuleRecord) -> CoreResult<i64> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO modules (package_id, short_name, full_path, doc_comment)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(package_id, full_path) DO UPDATE SET
                short_name = excluded.short_name,
                doc_comment = excluded.doc_comment
             RETURNING id",
            params![package_id, module.short_name, module.full_path, module.doc_comment],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ---- function -------------------------------------------------------

    #[instrument(skip(self, func), fields(fqn = %func.fully_qualified_name))]
    pub fn insert_function(&self, module_id: i64, func: &FunctionRecord) -> CoreResult<i64> {
        let parameters = serde_json::to_string(&func.parameters).unwrap_or_else(|_| "[]".into());
        let id: i64 = self.conn.query_row(
            "INSERT INTO functions (
                module_id, name, fully_qualified_name, signature, return_type, doc_comment,
                parameters, is_template, time_complexity, space_complexity,
                is_nogc, is_nothrow, is_pure, is_safe
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
             ON CONFLICT(fully_qualified_name) DO UPDATE SET
                module_id = excluded.module_id,
                name = excluded.name,
                signature = excluded.signature,
                return_type = excluded.return_type,
                doc_comment = excluded.doc_comment,
                parameters = excluded.parameters,
                is_template = excluded.is_template,
                time_complexity = excluded.time_complexity,
                space_complexity = excluded.space_complexity,
                is_nogc = excluded.is_nogc,
                is_nothrow = excluded.is_nothrow,
                is_pure = excluded.is_pure,
                is_safe = excluded.is_safe
             RETURNING id",
            params![
                module_id,
                func.name,
                func.fully_qualified_name,
                func.signature,
                func.return_type,
                func.doc_comment,
                parameters,
                func.is_template,
                func.time_complexity,
                func.space_complexity,
                func.is_nogc,
                func.is_nothrow,
                func.is_pure,
                func.is_safe,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ---- type -------------------------------------------------------

    #[instrument(skip(self, ty), fields(fqn = %ty.fully_qualified_name))]
    pub fn insert_type(&self, module_id: i64, ty: &TypeRecord) -> CoreResult<i64> {
        let base_classes = serde_json::to_string(&ty.base_classes).unwrap_or_else(|_| "[]".into());
        let interfaces = serde_json::to_string(&ty.interfaces).unwrap_or_else(|_| "[]".into());
        let kind = ty.kind.map(|k| k.as_str()).unwrap_or("class");
        let id: i64 = self.conn.query_row(
            "INSERT INTO types (module_id, name, fully_qualified_name, kind, doc_comment, base_classes, interfaces)
             VALUES (?1,?2,?3,?4,?5,?6,?7)
             ON CONFLICT(fully_qualified_name) DO UPDATE SET
                module_id = excluded.module_id,
                name = excluded.name,
                kind = excluded.kind,
                doc_comment = excluded.doc_comment,
                base_classes = excluded.base_classes,
                interfaces = excluded.interfaces
             RETURNING id",
            params![module_id, ty.name, ty.fully_qualified_name, kind, ty.doc_comment, base_classes, interfaces],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ---- code example (strict insert — examples accumulate) -------------

    pub fn insert_code_example(&self, example: &CodeExample) -> CoreResult<i64> {
        if !example.has_parent() {
            return Err(CoreError::Parse {
                detail: "code example must link to a function, type, or package".into(),
            });
        }
        let imports = serde_json::to_string(&example.required_imports).unwrap_or_else(|_| "[]".into());
        let id = self.conn.query_row(
            "INSERT INTO code_examples (function_id, type_id, package_id, code, description, is_unittest, is_runnable, required_imports)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
             RETURNING id",
            params![
                example.function_id,
                example.type_id,
                example.package_id,
                example.code,
                example.description,
                example.is_unittest,
                example.is_runnable,
                imports,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn insert_template_constraint(&self, c: &TemplateConstraint) -> CoreResult<i64> {
        let id = self.conn.query_row(
            "INSERT INTO template_constraints (function_id, type_id, constraint_text) VALUES (?1, ?2, ?3) RETURNING id",
            params![c.function_id, c.type_id, c.constraint],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn insert_import_requirement(&self, r: &ImportRequirement) -> CoreResult<i64> {
        let id = self.conn.query_row(
            "INSERT INTO import_requirements (function_id, type_id, import_path) VALUES (?1, ?2, ?3) RETURNING id",
            params![r.function_id, r.type_id, r.import_path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn insert_function_relationship(&self, rel: &FunctionRelationship) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO function_relationships (from_id, to_id, relationship_type, weight)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(from_id, to_id, relationship_type) DO UPDATE SET weight = excluded.weight",
            params![rel.from_id, rel.to_id, rel.relationship_type.as_str(), rel.weight],
        )?;
        Ok(())
    }

    pub fn insert_type_relationship(&self, rel: &TypeRelationship) -> CoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO type_relationships (from_id, to_id, relationship_type) VALUES (?1, ?2, ?3)",
            params![rel.from_id, rel.to_id, rel.relationship_type.as_str()],
        )?;
        Ok(())
    }

    pub fn upsert_usage_pattern(&self, pattern: &UsagePattern) -> CoreResult<i64> {
        let id = self.conn.query_row(
            "INSERT INTO usage_patterns (pattern_name, description, function_ids, code_template, use_case, popularity)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(pattern_name) DO UPDATE SET
                description = excluded.description,
                function_ids = excluded.function_ids,
                code_template = excluded.code_template,
                use_case = excluded.use_case,
                popularity = excluded.popularity
             RETURNING id",
            params![
                pattern.pattern_name,
                pattern.description,
                pattern.function_ids,
                pattern.code_template,
                pattern.use_case,
                pattern.popularity,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ---- vector embeddings ---------------------------------------------

    /// Replace-then-insert the embedding for `(kind, id)`. No-op if vector
    /// support is absent or `vector` is empty. A failure here is logged and
    /// swallowed — per spec §4.1 it must never fail the enclosing
    /// transaction.
    pub fn store_embedding(&self, kind: EntityKind, id: i64, vector: &[f32]) {
        if !self.vector_support || vector.is_empty() {
            return;
        }
        let table = schema::vector_table_for(kind);
        let bytes = vector_codec::encode_embedding(vector);
        let delete_sql = format!("DELETE FROM {table} WHERE entity_id = ?1");
        let insert_sql = format!("INSERT INTO {table} (entity_id, embedding) VALUES (?1, ?2)");
        if let Err(e) = self.conn.execute(&delete_sql, params![id]) {
            warn!(error = %e, kind = kind.as_str(), id, "vector delete failed, skipping");
            return;
        }
        if let Err(e) = self.conn.execute(&insert_sql, params![id, bytes]) {
            warn!(error = %e, kind = kind.as_str(), id, "vector insert failed, skipping");
        }
    }

    /// k-nearest-neighbor query against the vector table for `kind`.
    /// Returns `(entity_id, distance)` pairs.
    pub fn vector_search(&self, kind: EntityKind, query: &[f32], k: usize) -> CoreResult<Vec<(i64, f64)>> {
        if !self.vector_support || query.is_empty() {
            return Ok(Vec::new());
        }
        let table = schema::vector_table_for(kind);
        let sql = format!(
            "SELECT entity_id, distance FROM {table} WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance"
        );
        let bytes = vector_codec::encode_embedding(query);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| CoreError::VectorOp(format!("preparing nearest-neighbor query for {table}: {e}")))?;
        let rows = stmt
            .query_map(params![bytes, k as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(|e| CoreError::VectorOp(format!("running nearest-neighbor query against {table}: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::VectorOp(format!("reading nearest-neighbor results from {table}: {e}")))?;
        Ok(rows)
    }

    // ---- FTS --------------------------------------------------------

    pub fn update_fts_package(&self, id: i64, name: &str, description: &str, tags: &str) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO fts_packages(rowid, name, description, tags) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, description, tags],
        )?;
        Ok(())
    }

    pub fn update_fts_function(&self, id: i64, name: &str, signature: &str, doc_comment: &str) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO fts_functions(rowid, name, signature, doc_comment) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, signature, doc_comment],
        )?;
        Ok(())
    }

    pub fn update_fts_type(&self, id: i64, name: &str, doc_comment: &str) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO fts_types(rowid, name, doc_comment) VALUES (?1, ?2, ?3)",
            params![id, name, doc_comment],
        )?;
        Ok(())
    }

    pub fn update_fts_example(&self, id: i64, code: &str, description: &str) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO fts_examples(rowid, code, description) VALUES (?1, ?2, ?3)",
            params![id, code, description],
        )?;
        Ok(())
    }

    // ---- reads used by ingestion/search/pattern-miner -----------------

    pub fn get_function(&self, id: i64) -> CoreResult<Option<FunctionRecord>> {
        self.conn
            .query_row(
                "SELECT id, module_id, name, fully_qualified_name, signature, return_type, doc_comment,
                        parameters, is_template, time_complexity, space_complexity,
                        is_nogc, is_nothrow, is_pure, is_safe
                 FROM functions WHERE id = ?1",
                params![id],
                row_to_function,
            )
            .optional()
            .map_err(CoreError::from)
    }

    pub fn get_function_id_by_fqn(&self, fqn: &str) -> CoreResult<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM functions WHERE fully_qualified_name = ?1", params![fqn], |row| row.get(0))
            .optional()
            .map_err(CoreError::from)
    }

    pub fn get_type(&self, id: i64) -> CoreResult<Option<TypeRecord>> {
        self.conn
            .query_row(
                "SELECT id, module_id, name, fully_qualified_name, kind, doc_comment, base_classes, interfaces
                 FROM types WHERE id = ?1",
                params![id],
                row_to_type,
            )
            .optional()
            .map_err(CoreError::from)
    }

    /// All document text suitable for training the TF-IDF vocabulary (spec
    /// §4.1 `get_all_document_texts`).
    pub fn get_all_document_texts(&self) -> CoreResult<Vec<String>> {
        let mut texts = Vec::new();

        let mut pkg_stmt = self.conn.prepare("SELECT name, description, tags FROM packages")?;
        let pkg_rows = pkg_stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let description: String = row.get(1)?;
            let tags: String = row.get(2)?;
            Ok(format!("{name} {description} {tags}"))
        })?;
        for r in pkg_rows {
            texts.push(r?);
        }

        let mut func_stmt = self
            .conn
            .prepare("SELECT name, signature, doc_comment FROM functions")?;
        let func_rows = func_stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let signature: String = row.get(1)?;
            let doc: String = row.get(2)?;
            Ok(format!("{name} {signature} {doc}"))
        })?;
        for r in func_rows {
            texts.push(r?);
        }

        let mut type_stmt = self.conn.prepare("SELECT name, doc_comment FROM types")?;
        let type_rows = type_stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let doc: String = row.get(1)?;
            Ok(format!("{name} {doc}"))
        })?;
        for r in type_rows {
            texts.push(r?);
        }

        let mut ex_stmt = self
            .conn
            .prepare("SELECT code, description FROM code_examples")?;
        let ex_rows = ex_stmt.query_map([], |row| {
            let code: String = row.get(0)?;
            let description: String = row.get(1)?;
            Ok(format!("{code} {description}"))
        })?;
        for r in ex_rows {
            texts.push(r?);
        }

        Ok(texts)
    }

    #[instrument(skip(self))]
    pub fn get_stats(&self) -> CoreResult<StoreStats> {
        let packages: i64 = self.conn.query_row("SELECT count(*) FROM packages", [], |r| r.get(0))?;
        let modules: i64 = self.conn.query_row("SELECT count(*) FROM modules", [], |r| r.get(0))?;
        let functions: i64 = self.conn.query_row("SELECT count(*) FROM functions", [], |r| r.get(0))?;
        let types: i64 = self.conn.query_row("SELECT count(*) FROM types", [], |r| r.get(0))?;
        let examples: i64 = self.conn.query_row("SELECT count(*) FROM code_examples", [], |r| r.get(0))?;
        let unittest_examples: i64 =
            self.conn
                .query_row("SELECT count(*) FROM code_examples WHERE is_unittest = 1", [], |r| r.get(0))?;
        let doc_examples = examples - unittest_examples;

        let stats = StoreStats {
            packages,
            modules,
            functions,
            types,
            examples,
            unittest_examples,
            doc_examples,
        };
        info!(?stats, "store stats");
        Ok(stats)
    }

    // ---- ingestion progress (spec §3 IngestionProgress) -----------------

    /// Insert a fresh `running` progress row. Enforces I4 (never two
    /// `running` rows) by checking the latest row's status first.
    pub fn start_ingestion_progress(&self, total_packages: i64) -> CoreResult<i64> {
        if let Some(latest) = self.latest_ingestion_progress()? {
            if latest.status == IngestionStatus::Running {
                return Err(CoreError::Parse {
                    detail: "an ingestion run is already in progress".into(),
                });
            }
        }
        let now = chrono::Utc::now().timestamp();
        let id = self.conn.query_row(
            "INSERT INTO ingestion_progress (last_package, last_updated, packages_processed, total_packages, status, error_message)
             VALUES ('', ?1, 0, ?2, 'running', NULL) RETURNING id",
            params![now, total_packages],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn update_ingestion_progress(
        &self,
        id: i64,
        last_package: &str,
        packages_processed: i64,
    ) -> CoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "UPDATE ingestion_progress SET last_package = ?1, last_updated = ?2, packages_processed = ?3 WHERE id = ?4",
            params![last_package, now, packages_processed, id],
        )?;
        Ok(())
    }

    pub fn finish_ingestion_progress(&self, id: i64, status: IngestionStatus, error_message: Option<&str>) -> CoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "UPDATE ingestion_progress SET status = ?1, error_message = ?2, last_updated = ?3 WHERE id = ?4",
            params![status.as_str(), error_message, now, id],
        )?;
        Ok(())
    }

    /// The row with maximum id is authoritative (spec §3: "Singleton-latest").
    /// A malformed status string raises `ResumeStateCorrupt` rather than
    /// silently resuming as if no run had ever started, per spec §7.
    pub fn latest_ingestion_progress(&self) -> CoreResult<Option<IngestionProgress>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, last_package, last_updated, packages_processed, total_packages, status, error_message
                 FROM ingestion_progress ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(CoreError::from)?;

        let Some((id, last_package, last_updated, packages_processed, total_packages, status_str, error_message)) = row else {
            return Ok(None);
        };
        let status = IngestionStatus::from_str_opt(&status_str).ok_or(CoreError::ResumeStateCorrupt)?;

        Ok(Some(IngestionProgress {
            id: Some(id),
            last_package,
            last_updated,
            packages_processed,
            total_packages,
            status,
            error_message,
        }))
    }
}

fn row_to_function(row: &rusqlite::Row) -> rusqlite::Result<FunctionRecord> {
    let parameters_json: String = row.get(7)?;
    let parameters: Vec<String> = serde_json::from_str(&parameters_json).unwrap_or_default();
    Ok(FunctionRecord {
        id: Some(row.get(0)?),
        module_id: row.get(1)?,
        name: row.get(2)?,
        fully_qualified_name: row.get(3)?,
        signature: row.get(4)?,
        return_type: row.get(5)?,
        doc_comment: row.get(6)?,
        parameters,
        examples: Vec::new(),
        is_template: row.get(8)?,
        time_complexity: row.get(9)?,
        space_complexity: row.get(10)?,
        is_nogc: row.get(11)?,
        is_nothrow: row.get(12)?,
        is_pure: row.get(13)?,
        is_safe: row.get(14)?,
    })
}

fn row_to_type(row: &rusqlite::Row) -> rusqlite::Result<TypeRecord> {
    let kind_str: String = row.get(4)?;
    let base_classes_json: String = row.get(6)?;
    let interfaces_json: String = row.get(7)?;
    Ok(TypeRecord {
        id: Some(row.get(0)?),
        module_id: row.get(1)?,
        name: row.get(2)?,
        fully_qualified_name: row.get(3)?,
        kind: TypeKind::from_str_opt(&kind_str),
        doc_comment: row.get(5)?,
        base_classes: serde_json::from_str(&base_classes_json).unwrap_or_default(),
        interfaces: serde_json::from_str(&interfaces_json).unwrap_or_default(),
    })
}

fn configure_pragmas(conn: &Connection) -> CoreResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -65536i64)?; // ~64 MiB
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Attempt to load the `sqlite-vec` loadable extension from the configured
/// or platform-default search path. Returns `false` (without erroring) on
/// any failure — the store continues in FTS-only mode (spec §4.1).
fn try_load_vector_extension(conn: &Connection, config: &CoreConfig) -> bool {
    let Some(path) = config.resolve_vector_extension_path() else {
        debug!("no vector extension path resolved");
        return false;
    };
    load_vector_extension_from(conn, &path)
}

fn load_vector_extension_from(conn: &Connection, path: &Path) -> bool {
    // Safety: `load_extension` only dlopens a path we resolved ourselves
    // (environment override or a well-known models/ location), and loading
    // is bracketed so the flag is disabled again on every exit path.
    let outcome = unsafe {
        conn.load_extension_enable().and_then(|_| {
            let result = conn.load_extension(path, None::<&str>);
            let _ = conn.load_extension_disable();
            result
        })
    };
    match outcome {
        Ok(()) => {
            info!(path = %path.display(), "loaded vector index extension");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load vector index extension");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;

    fn test_store() -> Store {
        Store::open_in_memory(false, 384).unwrap()
    }

    #[test]
    fn insert_package_upserts_by_name() {
        let store = test_store();
        let meta = PackageMeta {
            name: "test-fixture-pkg".into(),
            version: "0.1.0".into(),
            description: "a fixture package".into(),
            ..Default::default()
        };
        let id1 = store.insert_package(&meta).unwrap();
        let meta2 = PackageMeta {
            version: "0.2.0".into(),
            ..meta.clone()
        };
        let id2 = store.insert_package(&meta2).unwrap();
        assert_eq!(id1, id2);

        let version: String = store
            .connection()
            .query_row("SELECT version FROM packages WHERE id = ?1", params![id1], |r| r.get(0))
            .unwrap();
        assert_eq!(version, "0.2.0");
    }

    #[test]
    fn insert_module_upserts_by_package_and_path() {
        let store = test_store();
        let pkg_id = store
            .insert_package(&PackageMeta {
                name: "mathutil-pkg".into(),
                version: "1.0.0".into(),
                ..Default::default()
            })
            .unwrap();
        let m = ModuleRecord {
            package_id: pkg_id,
            short_name: "mathutil".into(),
            full_path: "mathutil".into(),
            doc_comment: "math helpers".into(),
            ..Default::default()
        };
        let id1 = store.insert_module(pkg_id, &m).unwrap();
        let id2 = store.insert_module(pkg_id, &m).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn function_fqn_law_holds_and_upserts() {
        let store = test_store();
        let pkg_id = store
            .insert_package(&PackageMeta {
                name: "mathutil-pkg".into(),
                version: "1.0.0".into(),
                ..Default::default()
            })
            .unwrap();
        let module_id = store
            .insert_module(
                pkg_id,
                &ModuleRecord {
                    package_id: pkg_id,
                    short_name: "mathutil".into(),
                    full_path: "mathutil".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let func = FunctionRecord {
            module_id,
            name: "add".into(),
            fully_qualified_name: "mathutil.add".into(),
            signature: "int add(int, int)".into(),
            is_safe: true,
            is_nogc: true,
            is_pure: true,
            is_nothrow: true,
            doc_comment: "adds two numbers".into(),
            ..Default::default()
        };
        let id = store.insert_function(module_id, &func).unwrap();
        let fetched = store.get_function(id).unwrap().unwrap();
        assert_eq!(fetched.fully_qualified_name, "mathutil.add");
        assert!(fetched.is_safe && fetched.is_nogc && fetched.is_pure && fetched.is_nothrow);

        // re-insert is idempotent (upsert by fqn)
        let id2 = store.insert_function(module_id, &func).unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn code_example_requires_a_parent_link() {
        let store = test_store();
        let orphan = CodeExample {
            code: "writeln(1);".into(),
            ..Default::default()
        };
        assert!(store.insert_code_example(&orphan).is_err());
    }

    #[test]
    fn cascade_delete_removes_children() {
        let store = test_store();
        let pkg_id = store
            .insert_package(&PackageMeta {
                name: "cascade-pkg".into(),
                version: "1.0.0".into(),
                ..Default::default()
            })
            .unwrap();
        let module_id = store
            .insert_module(
                pkg_id,
                &ModuleRecord {
                    package_id: pkg_id,
                    short_name: "m".into(),
                    full_path: "m".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .insert_function(
                module_id,
                &FunctionRecord {
                    module_id,
                    name: "f".into(),
                    fully_qualified_name: "m.f".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        store.connection().execute("DELETE FROM packages WHERE id = ?1", params![pkg_id]).unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT count(*) FROM functions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn ingestion_progress_never_has_two_running_rows() {
        let store = test_store();
        let id = store.start_ingestion_progress(5).unwrap();
        assert!(store.start_ingestion_progress(5).is_err());
        store.finish_ingestion_progress(id, IngestionStatus::Completed, None).unwrap();
        // fine once the previous run is no longer `running`
        assert!(store.start_ingestion_progress(5).is_ok());
    }

    #[test]
    fn latest_ingestion_progress_rejects_unrecognized_status() {
        let store = test_store();
        store.start_ingestion_progress(5).unwrap();
        store
            .connection()
            .execute("UPDATE ingestion_progress SET status = 'sideways'", [])
            .unwrap();
        let err = store.latest_ingestion_progress().unwrap_err();
        assert!(matches!(err, CoreError::ResumeStateCorrupt));
    }

    #[test]
    fn store_embedding_is_noop_without_vector_support() {
        let store = test_store();
        // does not panic even though vec tables don't exist
        store.store_embedding(EntityKind::Function, 1, &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn stats_reflect_inserted_rows() {
        let store = test_store();
        let pkg_id = store
            .insert_package(&PackageMeta {
                name: "stats-pkg".into(),
                version: "1.0.0".into(),
                ..Default::default()
            })
            .unwrap();
        let module_id = store
            .insert_module(
                pkg_id,
                &ModuleRecord {
                    package_id: pkg_id,
                    short_name: "m".into(),
                    full_path: "m".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .insert_function(
                module_id,
                &FunctionRecord {
                    module_id,
                    name: "f".into(),
                    fully_qualified_name: "m.f".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.packages, 1);
        assert_eq!(stats.modules, 1);
        assert_eq!(stats.functions, 1);
    }
}
