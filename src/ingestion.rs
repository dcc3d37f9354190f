// Ingestion pipeline: orchestrates crawler -> parser -> store -> embedder
// per package, and the resumable batch orchestrator (spec §4.6).

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::CoreConfig;
use crate::crawler::Crawler;
use crate::embedder::Embedder;
use crate::error::CoreResult;
use crate::observability::PerfTimer;
use crate::parsing::raw_source;
use crate::store::models::{CodeExample, FunctionRecord, ModuleRecord, PackageMeta, TypeRecord};
use crate::store::Store;
use crate::types::{EntityKind, IngestionStatus};

pub struct IngestionPipeline {
    store: Store,
    crawler: Crawler,
    embedder: Arc<dyn Embedder>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_packages: Vec<String>,
}

impl IngestionPipeline {
    pub fn new(config: CoreConfig) -> CoreResult<Self> {
        let store = Store::open(&config)?;
        let embedder = crate::embedder::EmbedderManager::global(&config);
        let crawler = Crawler::new(config);
        Ok(Self { store, crawler, embedder })
    }

    /// Ingest one package end to end, as a single transaction (spec §4.6
    /// steps 1-6). Any error aborts the transaction and re-raises.
    #[instrument(skip(self), fields(package = %name))]
    pub async fn ingest_package(&self, name: &str) -> CoreResult<()> {
        let _timer = PerfTimer::new(format!("ingest_package:{name}"));
        let info = self.crawler.get_package_info(name).await?;
        let source_dir = self.crawler.download_source(&info.name, &info.version).await?;
        let code_root = self.crawler.find_source_directory(&source_dir);
        let files = self.crawler.find_source_files(&code_root);

        let tx = self.store.begin()?;
        let package_id = self.store.insert_package(&PackageMeta {
            id: None,
            name: info.name.clone(),
            version: info.version.clone(),
            description: info.description.clone(),
            repository: info.repository.clone(),
            homepage: info.homepage.clone(),
            license: info.license.clone(),
            authors: info.authors.clone(),
            tags: info.tags.clone(),
        })?;

        for file in &files {
            let Ok(source) = std::fs::read_to_string(file) else {
                warn!(file = %file.display(), "unreadable source file, skipping");
                continue;
            };

            // The compiler's AST-dump is produced out of band (spec §4.4);
            // until invoking the compiler directly is wired up, look for the
            // dump as a sibling artifact next to the source file it covers.
            let ast_dump_path = ast_dump_path_for(file);
            if let Ok(raw_dump) = std::fs::read_to_string(&ast_dump_path) {
                match crate::parsing::parse_ast_dump(&raw_dump) {
                    Ok(modules) => {
                        for module in &modules {
                            self.ingest_parsed_module(package_id, module)?;
                        }
                    }
                    Err(e) => warn!(file = %ast_dump_path.display(), error = %e, "malformed AST dump, skipping"),
                }
            }

            let imports = raw_source::scan_imports(&source);
            for block in raw_source::extract_unittest_blocks(&source) {
                let example = CodeExample {
                    id: None,
                    function_id: None,
                    type_id: None,
                    package_id: Some(package_id),
                    code: block.clone(),
                    description: String::new(),
                    is_unittest: true,
                    is_runnable: true,
                    required_imports: imports.clone(),
                };
                let example_id = self.store.insert_code_example(&example)?;
                if let Ok(embedding) = self.embedder.embed(&block).await {
                    self.store.store_embedding(EntityKind::Example, example_id, &embedding);
                }
                self.store.update_fts_example(example_id, &block, "")?;
            }
        }

        self.store.update_fts_package(package_id, &info.name, &info.description, &info.tags.join(" "))?;

        if self.store.vector_support() {
            let text = format!("{} {} {}", info.name, info.description, info.tags.join(" "));
            if let Ok(embedding) = self.embedder.embed(&text).await {
                self.store.store_embedding(EntityKind::Package, package_id, &embedding);
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Insert normalized module/function/type records parsed from an
    /// AST-dump. Called from `ingest_package` for every source file that has
    /// a dump sitting alongside it, and directly by tests that already hold
    /// a `ParsedModule` and want to skip the filesystem lookup.
    pub fn ingest_parsed_module(&self, package_id: i64, module: &crate::parsing::ParsedModule) -> CoreResult<i64> {
        let module_id = self.store.insert_module(
            package_id,
            &ModuleRecord {
                id: None,
                package_id,
                short_name: module.name.clone(),
                full_path: module.name.clone(),
                doc_comment: module.doc.summary.clone(),
            },
        )?;

        for func in &module.functions {
            let fqn = format!("{}.{}", module.name, func.name);
            let function_id = self.store.insert_function(
                module_id,
                &FunctionRecord {
                    id: None,
                    module_id,
                    name: func.name.clone(),
                    fully_qualified_name: fqn,
                    signature: func.signature.clone(),
                    return_type: func.return_type.clone(),
                    doc_comment: func.doc.summary.clone(),
                    parameters: func.parameters.clone(),
                    examples: func.doc.examples.clone(),
                    is_template: func.is_template,
                    time_complexity: None,
                    space_complexity: None,
                    is_nogc: func.is_nogc,
                    is_nothrow: func.is_nothrow,
                    is_pure: func.is_pure,
                    is_safe: func.is_safe,
                },
            )?;
            self.store.update_fts_function(function_id, &func.name, &func.signature, &func.doc.summary)?;
        }

        for ty in &module.types {
            let fqn = format!("{}.{}", module.name, ty.name);
            let type_id = self.store.insert_type(
                module_id,
                &TypeRecord {
                    id: None,
                    module_id,
                    name: ty.name.clone(),
                    fully_qualified_name: fqn,
                    kind: Some(ty.kind),
                    doc_comment: ty.doc.summary.clone(),
                    base_classes: ty.base_classes.clone(),
                    interfaces: ty.interfaces.clone(),
                },
            )?;
            self.store.update_fts_type(type_id, &ty.name, &ty.doc.summary)?;
        }

        Ok(module_id)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Resumable batch orchestrator (spec §4.6 `ingest_all`).
    #[instrument(skip(self), fields(limit, fresh))]
    pub async fn ingest_all(&self, limit: Option<usize>, fresh: bool) -> CoreResult<BatchReport> {
        let _timer = PerfTimer::new("ingest_all");
        let full_worklist = self.crawler.list_package_names().await?;
        let latest = if fresh { None } else { self.store.latest_ingestion_progress()? };
        let mut worklist = resume_worklist(full_worklist, latest.as_ref());

        if let Some(n) = limit {
            worklist.truncate(n);
        }

        let progress_id = self.store.start_ingestion_progress(worklist.len() as i64)?;
        let mut report = BatchReport {
            total: worklist.len(),
            ..Default::default()
        };

        for (i, name) in worklist.iter().enumerate() {
            match self.ingest_package(name).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    error!(package = %name, error = %e, "package ingestion failed");
                    report.failed += 1;
                    report.failed_packages.push(name.clone());
                }
            }
            self.store.update_ingestion_progress(progress_id, name, (i + 1) as i64)?;

            if (i + 1) % 10 == 0 {
                if let Ok(stats) = self.store.get_stats() {
                    info!(processed = i + 1, total = report.total, ?stats, "batch progress");
                }
            }
        }

        let final_status = if report.failed == report.total && report.total > 0 {
            IngestionStatus::Error
        } else {
            IngestionStatus::Completed
        };
        let error_message = if report.failed > 0 {
            Some(format!("{} of {} packages failed", report.failed, report.total))
        } else {
            None
        };
        self.store.finish_ingestion_progress(progress_id, final_status, error_message.as_deref())?;

        Ok(report)
    }
}

/// Derive the sibling AST-dump path for a source file: same directory and
/// stem, `.ast.json` extension. Matches the layout the compiler's one-shot
/// dump step (spec §4.4) writes next to each source file it covers.
fn ast_dump_path_for(source_file: &Path) -> PathBuf {
    source_file.with_extension("ast.json")
}

/// Trim a freshly-listed worklist against the last checkpoint (spec §4.6
/// resume logic / P9 "resume idempotence"): if the latest progress row is
/// `running` with a recorded `last_package`, drop every name up to and
/// including it, so resuming never reprocesses an already-ingested package.
fn resume_worklist(worklist: Vec<String>, latest: Option<&crate::store::models::IngestionProgress>) -> Vec<String> {
    let Some(latest) = latest else { return worklist };
    if latest.status != IngestionStatus::Running || latest.last_package.is_empty() {
        return worklist;
    }
    match worklist.iter().position(|n| n == &latest.last_package) {
        Some(pos) => worklist.into_iter().skip(pos + 1).collect(),
        None => worklist,
    }
}
