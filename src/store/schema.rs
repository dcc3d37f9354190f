// Schema definitions (spec §4.1 "initialize_schema"). Every statement is
// idempotent (`IF NOT EXISTS`) so repeated opens against an existing
// database are safe.

use rusqlite::Connection;
use tracing::debug;

use crate::error::CoreResult;

const CORE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS packages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    version TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    repository TEXT NOT NULL DEFAULT '',
    homepage TEXT NOT NULL DEFAULT '',
    license TEXT NOT NULL DEFAULT '',
    authors TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
    short_name TEXT NOT NULL,
    full_path TEXT NOT NULL,
    doc_comment TEXT NOT NULL DEFAULT '',
    UNIQUE(package_id, full_path)
);
CREATE INDEX IF NOT EXISTS idx_modules_package ON modules(package_id);

CREATE TABLE IF NOT EXISTS functions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    fully_qualified_name TEXT NOT NULL UNIQUE,
    signature TEXT NOT NULL DEFAULT '',
    return_type TEXT NOT NULL DEFAULT '',
    doc_comment TEXT NOT NULL DEFAULT '',
    parameters TEXT NOT NULL DEFAULT '[]',
    is_template INTEGER NOT NULL DEFAULT 0,
    time_complexity TEXT,
    space_complexity TEXT,
    is_nogc INTEGER NOT NULL DEFAULT 0,
    is_nothrow INTEGER NOT NULL DEFAULT 0,
    is_pure INTEGER NOT NULL DEFAULT 0,
    is_safe INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_functions_module ON functions(module_id);

CREATE TABLE IF NOT EXISTS types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    fully_qualified_name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    doc_comment TEXT NOT NULL DEFAULT '',
    base_classes TEXT NOT NULL DEFAULT '[]',
    interfaces TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_types_module ON types(module_id);

CREATE TABLE IF NOT EXISTS code_examples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    function_id INTEGER REFERENCES functions(id) ON DELETE CASCADE,
    type_id INTEGER REFERENCES types(id) ON DELETE CASCADE,
    package_id INTEGER REFERENCES packages(id) ON DELETE CASCADE,
    code TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_unittest INTEGER NOT NULL DEFAULT 0,
    is_runnable INTEGER NOT NULL DEFAULT 0,
    required_imports TEXT NOT NULL DEFAULT '[]',
    CHECK (function_id IS NOT NULL OR type_id IS NOT NULL OR package_id IS NOT NULL)
);
CREATE INDEX IF NOT EXISTS idx_examples_function ON code_examples(function_id);
CREATE INDEX IF NOT EXISTS idx_examples_type ON code_examples(type_id);
CREATE INDEX IF NOT EXISTS idx_examples_package ON code_examples(package_id);

CREATE TABLE IF NOT EXISTS template_constraints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    function_id INTEGER REFERENCES functions(id) ON DELETE CASCADE,
    type_id INTEGER REFERENCES types(id) ON DELETE CASCADE,
    constraint_text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS import_requirements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    function_id INTEGER REFERENCES functions(id) ON DELETE CASCADE,
    type_id INTEGER REFERENCES types(id) ON DELETE CASCADE,
    import_path TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_import_requirements_function ON import_requirements(function_id);
CREATE INDEX IF NOT EXISTS idx_import_requirements_type ON import_requirements(type_id);

CREATE TABLE IF NOT EXISTS function_relationships (
    from_id INTEGER NOT NULL REFERENCES functions(id) ON DELETE CASCADE,
    to_id INTEGER NOT NULL REFERENCES functions(id) ON DELETE CASCADE,
    relationship_type TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    UNIQUE(from_id, to_id, relationship_type)
);

CREATE TABLE IF NOT EXISTS type_relationships (
    from_id INTEGER NOT NULL REFERENCES types(id) ON DELETE CASCADE,
    to_id INTEGER NOT NULL REFERENCES types(id) ON DELETE CASCADE,
    relationship_type TEXT NOT NULL,
    UNIQUE(from_id, to_id, relationship_type)
);

CREATE TABLE IF NOT EXISTS usage_patterns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    function_ids TEXT NOT NULL DEFAULT '[]',
    code_template TEXT NOT NULL DEFAULT '',
    use_case TEXT NOT NULL DEFAULT '',
    popularity INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ingestion_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    last_package TEXT NOT NULL DEFAULT '',
    last_updated INTEGER NOT NULL DEFAULT 0,
    packages_processed INTEGER NOT NULL DEFAULT 0,
    total_packages INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'idle',
    error_message TEXT
);
";

const FTS_SCHEMA: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS fts_packages USING fts5(
    name, description, tags, tokenize = 'porter unicode61'
);
CREATE VIRTUAL TABLE IF NOT EXISTS fts_functions USING fts5(
    name, signature, doc_comment, tokenize = 'porter unicode61'
);
CREATE VIRTUAL TABLE IF NOT EXISTS fts_types USING fts5(
    name, doc_comment, tokenize = 'porter unicode61'
);
CREATE VIRTUAL TABLE IF NOT EXISTS fts_examples USING fts5(
    code, description, tokenize = 'porter unicode61'
);
";

/// Create the vector tables for each entity kind, at the configured
/// dimension. Only called when the `sqlite-vec` extension loaded.
fn vector_schema(dimension: usize) -> String {
    format!(
        "
CREATE VIRTUAL TABLE IF NOT EXISTS vec_packages USING vec0(entity_id INTEGER PRIMARY KEY, embedding FLOAT[{dim}]);
CREATE VIRTUAL TABLE IF NOT EXISTS vec_functions USING vec0(entity_id INTEGER PRIMARY KEY, embedding FLOAT[{dim}]);
CREATE VIRTUAL TABLE IF NOT EXISTS vec_types USING vec0(entity_id INTEGER PRIMARY KEY, embedding FLOAT[{dim}]);
CREATE VIRTUAL TABLE IF NOT EXISTS vec_examples USING vec0(entity_id INTEGER PRIMARY KEY, embedding FLOAT[{dim}]);
",
        dim = dimension
    )
}

/// Create every table: entities, relationships, progress, FTS indexes, and
/// — only when `vector_support` is true — the vector tables at `dimension`.
pub fn initialize_schema(conn: &Connection, vector_support: bool, dimension: usize) -> CoreResult<()> {
    debug!("initializing core schema");
    conn.execute_batch(CORE_SCHEMA)?;
    conn.execute_batch(FTS_SCHEMA)?;
    if vector_support {
        debug!(dimension, "initializing vector schema");
        conn.execute_batch(&vector_schema(dimension))?;
    }
    Ok(())
}

/// FTS table name for an entity kind.
pub fn fts_table_for(kind: crate::types::EntityKind) -> &'static str {
    match kind {
        crate::types::EntityKind::Package => "fts_packages",
        crate::types::EntityKind::Function => "fts_functions",
        crate::types::EntityKind::Type => "fts_types",
        crate::types::EntityKind::Example => "fts_examples",
    }
}

/// Vector table name for an entity kind.
pub fn vector_table_for(kind: crate::types::EntityKind) -> &'static str {
    match kind {
        crate::types::EntityKind::Package => "vec_packages",
        crate::types::EntityKind::Function => "vec_functions",
        crate::types::EntityKind::Type => "vec_types",
        crate::types::EntityKind::Example => "vec_examples",
    }
}

/// Canonical table name for an entity kind.
pub fn canonical_table_for(kind: crate::types::EntityKind) -> &'static str {
    match kind {
        crate::types::EntityKind::Package => "packages",
        crate::types::EntityKind::Function => "functions",
        crate::types::EntityKind::Type => "types",
        crate::types::EntityKind::Example => "code_examples",
    }
}
