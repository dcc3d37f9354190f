// Shared value types used across the store, parser, and search engine.

use serde::{Deserialize, Serialize};

/// The four indexable entity kinds: each has its own FTS table and, when
/// vector support is loaded, its own vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Package,
    Function,
    Type,
    Example,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Package => "package",
            EntityKind::Function => "function",
            EntityKind::Type => "type",
            EntityKind::Example => "example",
        }
    }

    pub fn all() -> [EntityKind; 4] {
        [
            EntityKind::Package,
            EntityKind::Function,
            EntityKind::Type,
            EntityKind::Example,
        ]
    }

    pub fn from_str_opt(s: &str) -> Option<EntityKind> {
        match s {
            "package" => Some(EntityKind::Package),
            "function" => Some(EntityKind::Function),
            "type" => Some(EntityKind::Type),
            "example" => Some(EntityKind::Example),
            _ => None,
        }
    }
}

/// Kind of a parsed user-defined type (spec §3: `Type.kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<TypeKind> {
        match s {
            "class" => Some(TypeKind::Class),
            "struct" => Some(TypeKind::Struct),
            "interface" => Some(TypeKind::Interface),
            "enum" => Some(TypeKind::Enum),
            _ => None,
        }
    }
}

/// Status of an `IngestionProgress` row (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Idle => "idle",
            IngestionStatus::Running => "running",
            IngestionStatus::Completed => "completed",
            IngestionStatus::Error => "error",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<IngestionStatus> {
        match s {
            "idle" => Some(IngestionStatus::Idle),
            "running" => Some(IngestionStatus::Running),
            "completed" => Some(IngestionStatus::Completed),
            "error" => Some(IngestionStatus::Error),
            _ => None,
        }
    }
}

/// Options controlling a hybrid search (spec §4.8).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: String,
    pub package_filter: Option<String>,
    pub kind: Option<EntityKind>,
    pub limit: usize,
    pub use_vectors: bool,
    pub fts_weight: f64,
    pub vector_weight: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            package_filter: None,
            kind: None,
            limit: 20,
            use_vectors: true,
            fts_weight: 0.3,
            vector_weight: 0.7,
        }
    }
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_package_filter(mut self, package: impl Into<String>) -> Self {
        self.package_filter = Some(package.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn without_vectors(mut self) -> Self {
        self.use_vectors = false;
        self
    }
}

/// One ranked search hit, after FTS/vector merge and detail fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub kind: EntityKindDto,
    pub name: String,
    pub fully_qualified_name: Option<String>,
    pub signature: Option<String>,
    pub module_path: Option<String>,
    pub package_name: Option<String>,
    pub doc_comment: Option<String>,
    pub combined_score: f64,
    pub fts_score: f64,
    pub vector_score: f64,
}

/// Serializable mirror of `EntityKind` (kept distinct so the wire shape is
/// insulated from internal enum reordering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKindDto {
    Package,
    Function,
    Type,
    Example,
}

impl From<EntityKind> for EntityKindDto {
    fn from(k: EntityKind) -> Self {
        match k {
            EntityKind::Package => EntityKindDto::Package,
            EntityKind::Function => EntityKindDto::Function,
            EntityKind::Type => EntityKindDto::Type,
            EntityKind::Example => EntityKindDto::Example,
        }
    }
}
