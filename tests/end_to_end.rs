// End-to-end scenarios against the public surface (spec §8 S1-S4, S6).

use dub_doc_search::store::models::{CodeExample, PackageMeta};
use dub_doc_search::{CoreConfig, Embedder, EmbedderManager, EntityKind, IngestionPipeline, SearchEngine, SearchOptions, Store};

fn test_config(dim: usize) -> CoreConfig {
    let dir = tempfile::tempdir().unwrap();
    CoreConfig::builder().data_root(dir.keep()).vector_dimension(dim).build().unwrap()
}

const MATHUTIL_DUMP: &str = r#"[{
    "name": "mathutil",
    "comment": "Math helpers for the fixture package.",
    "members": [
        {
            "kind": "function", "name": "add", "line": 12, "returnType": "int",
            "parameters": [{"type": "int", "name": "a"}, {"type": "int", "name": "b"}],
            "attributes": ["@safe", "@nogc", "pure", "nothrow"],
            "comment": "Adds two integers together."
        },
        {
            "kind": "function", "name": "multiply", "line": 20, "returnType": "int",
            "parameters": [{"type": "int", "name": "a"}, {"type": "int", "name": "b"}],
            "attributes": ["@safe", "@nogc", "pure", "nothrow"],
            "comment": "Multiplies two integers."
        },
        {
            "kind": "function", "name": "factorial", "line": 28, "returnType": "long",
            "parameters": [{"type": "int", "name": "n"}],
            "attributes": ["@safe", "pure"],
            "comment": "Computes n!."
        }
    ]
}]"#;

const CONTAINERS_DUMP: &str = r#"[{
    "name": "containers",
    "comment": "Container types for the fixture package.",
    "members": [
        {"kind": "struct", "name": "Stack", "line": 8, "comment": "A LIFO stack."},
        {"kind": "enum", "name": "Color", "line": 30, "comment": "RGB-ish color tags."},
        {"kind": "class", "name": "Point2D", "line": 40, "comment": "A 2D point."}
    ]
}]"#;

/// S1 + S2: ingest a synthetic two-file package and check function integrity.
#[tokio::test]
async fn ingest_two_file_package_and_verify_function_integrity() {
    EmbedderManager::reset();
    let config = test_config(16);
    let pipeline = IngestionPipeline::new(config).unwrap();

    let package_id = pipeline
        .store()
        .insert_package(&PackageMeta { name: "test-fixture-pkg".into(), version: "0.1.0".into(), ..Default::default() })
        .unwrap();

    for dump in [MATHUTIL_DUMP, CONTAINERS_DUMP] {
        let modules = dub_doc_search::parsing::parse_ast_dump(dump).unwrap();
        for module in &modules {
            pipeline.ingest_parsed_module(package_id, module).unwrap();
        }
    }

    let stats = pipeline.store().get_stats().unwrap();
    assert_eq!(stats.packages, 1);
    assert_eq!(stats.modules, 2);
    assert!(stats.functions >= 3);
    assert!(stats.types >= 1);

    let add_id = pipeline.store().get_function_id_by_fqn("mathutil.add").unwrap().unwrap();
    let add = pipeline.store().get_function(add_id).unwrap().unwrap();
    assert!(add.is_safe && add.is_nogc && add.is_pure && add.is_nothrow);
    assert!(!add.doc_comment.is_empty());
    assert_eq!(add.fully_qualified_name, "mathutil.add");
}

/// S3: FTS query over functions surfaces the exact match on top.
#[tokio::test]
async fn fts_query_over_functions_ranks_exact_match_first() {
    EmbedderManager::reset();
    let config = test_config(16);
    let db_path = config.db_path();
    let pipeline = IngestionPipeline::new(config.clone()).unwrap();

    let package_id = pipeline
        .store()
        .insert_package(&PackageMeta { name: "test-fixture-pkg".into(), version: "0.1.0".into(), ..Default::default() })
        .unwrap();
    let modules = dub_doc_search::parsing::parse_ast_dump(MATHUTIL_DUMP).unwrap();
    pipeline.ingest_parsed_module(package_id, &modules[0]).unwrap();
    drop(pipeline);
    assert!(db_path.exists());

    EmbedderManager::reset();
    let engine = SearchEngine::open(config).unwrap();
    let options = SearchOptions::new("add").without_vectors().with_kind(EntityKind::Function).with_limit(10);
    let hits = engine.search(&options).await.unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].name, "add");
    assert!(hits[0].fts_score > 0.0);
}

/// S4: package search surfaces the fixture package by name/description tokens.
#[tokio::test]
async fn package_query_surfaces_fixture_package() {
    EmbedderManager::reset();
    let config = test_config(16);
    let store = Store::open(&config).unwrap();
    let package_id = store
        .insert_package(&PackageMeta {
            name: "test-fixture-pkg".into(),
            version: "0.1.0".into(),
            description: "a synthetic test fixture package".into(),
            ..Default::default()
        })
        .unwrap();
    store.update_fts_package(package_id, "test-fixture-pkg", "a synthetic test fixture package", "").unwrap();
    drop(store);

    EmbedderManager::reset();
    let engine = SearchEngine::open(config).unwrap();
    let options = SearchOptions::new("test fixture").without_vectors().with_kind(EntityKind::Package).with_limit(10);
    let hits = engine.search(&options).await.unwrap();

    assert!(hits.iter().any(|h| h.name == "test-fixture-pkg" && h.fts_score > 0.0));
}

/// S6: a query containing FTS operator-like characters never raises, and
/// still matches the function whose tokens it names.
#[tokio::test]
async fn escaped_query_with_dots_does_not_raise_and_still_matches() {
    EmbedderManager::reset();
    let config = test_config(16);
    let store = Store::open(&config).unwrap();
    let package_id = store
        .insert_package(&PackageMeta { name: "phobos-like".into(), version: "1.0.0".into(), ..Default::default() })
        .unwrap();
    let module_id = store
        .insert_module(
            package_id,
            &dub_doc_search::store::models::ModuleRecord {
                id: None,
                package_id,
                short_name: "std.algorithm".into(),
                full_path: "std.algorithm".into(),
                doc_comment: String::new(),
            },
        )
        .unwrap();
    let function_id = store
        .insert_function(
            module_id,
            &dub_doc_search::store::models::FunctionRecord {
                id: None,
                module_id,
                name: "filter".into(),
                fully_qualified_name: "std.algorithm.filter".into(),
                signature: "auto filter(alias pred, R)(R range)".into(),
                return_type: "auto".into(),
                doc_comment: "Lazily filters a range.".into(),
                parameters: vec!["R range".into()],
                examples: Vec::new(),
                is_template: true,
                time_complexity: None,
                space_complexity: None,
                is_nogc: false,
                is_nothrow: false,
                is_pure: false,
                is_safe: true,
            },
        )
        .unwrap();
    store.update_fts_function(function_id, "filter", "auto filter(alias pred, R)(R range)", "Lazily filters a range.").unwrap();
    drop(store);

    EmbedderManager::reset();
    let engine = SearchEngine::open(config).unwrap();
    let options = SearchOptions::new("std.algorithm.filter").without_vectors().with_kind(EntityKind::Function).with_limit(10);
    let hits = engine.search(&options).await.unwrap();
    assert!(hits.iter().any(|h| h.name == "filter"));
}

/// Unittest blocks discovered in raw source become package-linked code
/// examples with an embedding stored alongside them.
#[tokio::test]
async fn unittest_blocks_become_embedded_code_examples() {
    EmbedderManager::reset();
    let config = test_config(16);
    let store = Store::open(&config).unwrap();
    let package_id = store
        .insert_package(&PackageMeta { name: "test-fixture-pkg".into(), version: "0.1.0".into(), ..Default::default() })
        .unwrap();

    let source = r#"
int add(int a, int b) @safe @nogc pure nothrow {
    return a + b;
}

unittest {
    assert(add(2, 3) == 5);
}
"#;
    let embedder = EmbedderManager::global(&config);
    for block in dub_doc_search::parsing::raw_source::extract_unittest_blocks(source) {
        let example_id = store
            .insert_code_example(&CodeExample {
                id: None,
                function_id: None,
                type_id: None,
                package_id: Some(package_id),
                code: block.clone(),
                description: String::new(),
                is_unittest: true,
                is_runnable: true,
                required_imports: Vec::new(),
            })
            .unwrap();
        let embedding = embedder.embed(&block).await.unwrap();
        store.store_embedding(EntityKind::Example, example_id, &embedding);
        store.update_fts_example(example_id, &block, "").unwrap();
    }

    let stats = store.get_stats().unwrap();
    assert_eq!(stats.unittest_examples, 1);
}
