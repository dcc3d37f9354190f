// Post-ingestion pattern mining: co-occurring imports and intra-module
// function relationships (spec §4.7).

use std::collections::HashMap;
use tracing::{info, instrument};

use crate::error::CoreResult;
use crate::store::models::{FunctionRelationship, RelationshipType, UsagePattern};
use crate::store::Store;

const DEFAULT_MIN_OCCURRENCES: usize = 2;
const TOP_N: usize = 100;
const USAGE_PATTERN_MIN_COUNT: usize = 3;
const USAGE_PATTERN_MIN_IMPORTS: usize = 2;
const RELATIONSHIP_PAIR_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct ImportPattern {
    pub required_imports: String,
    pub count: usize,
}

pub struct PatternMiner<'a> {
    store: &'a Store,
}

impl<'a> PatternMiner<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Group `code_examples` by the raw `required_imports` string (spec
    /// §9 open question 1: grouped by the raw string, not the parsed set),
    /// keep groups at or above `min_occurrences`, sorted by frequency
    /// descending, truncated to the top `TOP_N`.
    #[instrument(skip(self))]
    pub fn mine_import_patterns(&self, min_occurrences: Option<usize>) -> CoreResult<Vec<ImportPattern>> {
        let min_occurrences = min_occurrences.unwrap_or(DEFAULT_MIN_OCCURRENCES);
        let mut counts: HashMap<String, usize> = HashMap::new();

        let mut stmt = self
            .store
            .connection()
            .prepare("SELECT required_imports FROM code_examples WHERE required_imports != '[]'")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            let json = row?;
            let imports: Vec<String> = serde_json::from_str(&json).unwrap_or_default();
            if imports.is_empty() {
                continue;
            }
            *counts.entry(imports.join(",")).or_insert(0) += 1;
        }

        let mut patterns: Vec<ImportPattern> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(required_imports, count)| ImportPattern { required_imports, count })
            .collect();
        patterns.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.required_imports.cmp(&b.required_imports)));
        patterns.truncate(TOP_N);
        Ok(patterns)
    }

    /// From mined import patterns meeting usage-pattern thresholds, write
    /// (upsert) rows in `usage_patterns`.
    #[instrument(skip(self, patterns))]
    pub fn store_usage_patterns(&self, patterns: &[ImportPattern]) -> CoreResult<usize> {
        let mut written = 0;
        for pattern in patterns {
            if pattern.count < USAGE_PATTERN_MIN_COUNT {
                continue;
            }
            let imports: Vec<&str> = pattern.required_imports.split(',').filter(|s| !s.is_empty()).collect();
            if imports.len() < USAGE_PATTERN_MIN_IMPORTS {
                continue;
            }
            let code_template = imports.iter().map(|i| format!("import {i};")).collect::<Vec<_>>().join("\n");
            let pattern_name = format!("imports:{}", imports.join("+"));
            self.store.upsert_usage_pattern(&UsagePattern {
                id: None,
                pattern_name,
                description: format!("Frequently co-occurring imports: {}", imports.join(", ")),
                function_ids: String::new(),
                code_template,
                use_case: "imports".to_string(),
                popularity: pattern.count as i64,
            })?;
            written += 1;
        }
        Ok(written)
    }

    /// Self-join `functions` on equal `module_id`, excluding self-pairs,
    /// limited to `RELATIONSHIP_PAIR_LIMIT` pairs; insert `related`
    /// relationships weighted by pair count.
    #[instrument(skip(self))]
    pub fn mine_function_relationships(&self) -> CoreResult<usize> {
        let mut stmt = self.store.connection().prepare(
            "SELECT a.id, b.id, count(*) as pair_count
             FROM functions a
             JOIN functions b ON a.module_id = b.module_id AND a.id < b.id
             GROUP BY a.id, b.id
             ORDER BY pair_count DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![RELATIONSHIP_PAIR_LIMIT as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        let mut written = 0;
        for row in rows {
            let (from_id, to_id, count) = row?;
            self.store.insert_function_relationship(&FunctionRelationship {
                from_id,
                to_id,
                relationship_type: RelationshipType::Related,
                weight: count as f64,
            })?;
            written += 1;
        }
        info!(written, "mined function relationships");
        Ok(written)
    }

    /// For each dotted symbol, emit its containing module path (all
    /// components except the last), deduplicated.
    pub fn suggest_imports(&self, symbols: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for symbol in symbols {
            let parts: Vec<&str> = symbol.split('.').collect();
            if parts.len() < 2 {
                continue;
            }
            let module_path = parts[..parts.len() - 1].join(".");
            if seen.insert(module_path.clone()) {
                out.push(module_path);
            }
        }
        out
    }
}
