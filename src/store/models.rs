// Domain records persisted by the store (spec §3 DATA MODEL).

use crate::types::TypeKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMeta {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub description: String,
    pub repository: String,
    pub homepage: String,
    pub license: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleRecord {
    pub id: Option<i64>,
    pub package_id: i64,
    pub short_name: String,
    pub full_path: String,
    pub doc_comment: String,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionRecord {
    pub id: Option<i64>,
    pub module_id: i64,
    pub name: String,
    pub fully_qualified_name: String,
    pub signature: String,
    pub return_type: String,
    pub doc_comment: String,
    pub parameters: Vec<String>,
    pub examples: Vec<String>,
    pub is_template: bool,
    pub time_complexity: Option<String>,
    pub space_complexity: Option<String>,
    pub is_nogc: bool,
    pub is_nothrow: bool,
    pub is_pure: bool,
    pub is_safe: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TypeRecord {
    pub id: Option<i64>,
    pub module_id: i64,
    pub name: String,
    pub fully_qualified_name: String,
    pub kind: Option<TypeKind>,
    pub doc_comment: String,
    pub base_classes: Vec<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CodeExample {
    pub id: Option<i64>,
    pub function_id: Option<i64>,
    pub type_id: Option<i64>,
    pub package_id: Option<i64>,
    pub code: String,
    pub description: String,
    pub is_unittest: bool,
    pub is_runnable: bool,
    pub required_imports: Vec<String>,
}

impl CodeExample {
    pub fn has_parent(&self) -> bool {
        self.function_id.is_some() || self.type_id.is_some() || self.package_id.is_some()
    }

    /// The raw joined-string grouping key used by the pattern miner (spec
    /// §4.7: groups by the raw string, not the parsed set of imports).
    pub fn required_imports_key(&self) -> String {
        self.required_imports.join(",")
    }
}

#[derive(Debug, Clone)]
pub struct TemplateConstraint {
    pub id: Option<i64>,
    pub function_id: Option<i64>,
    pub type_id: Option<i64>,
    pub constraint: String,
}

#[derive(Debug, Clone)]
pub struct ImportRequirement {
    pub id: Option<i64>,
    pub function_id: Option<i64>,
    pub type_id: Option<i64>,
    pub import_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipType {
    Calls,
    Related,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Calls => "calls",
            RelationshipType::Related => "related",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(RelationshipType::Calls),
            "related" => Some(RelationshipType::Related),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionRelationship {
    pub from_id: i64,
    pub to_id: i64,
    pub relationship_type: RelationshipType,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct TypeRelationship {
    pub from_id: i64,
    pub to_id: i64,
    pub relationship_type: RelationshipType,
}

#[derive(Debug, Clone)]
pub struct UsagePattern {
    pub id: Option<i64>,
    pub pattern_name: String,
    pub description: String,
    pub function_ids: String,
    pub code_template: String,
    pub use_case: String,
    pub popularity: i64,
}

#[derive(Debug, Clone)]
pub struct IngestionProgress {
    pub id: Option<i64>,
    pub last_package: String,
    pub last_updated: i64,
    pub packages_processed: i64,
    pub total_packages: i64,
    pub status: crate::types::IngestionStatus,
    pub error_message: Option<String>,
}

/// Aggregate counts returned by `Store::get_stats` (spec §4.1, extended per
/// SPEC_FULL.md §B with the unittest/doc-example split).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub packages: i64,
    pub modules: i64,
    pub functions: i64,
    pub types: i64,
    pub examples: i64,
    pub unittest_examples: i64,
    pub doc_examples: i64,
}
