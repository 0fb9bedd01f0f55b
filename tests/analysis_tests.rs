//! End-to-end analysis tests
//!
//! Runs documents in every supported format through the full pipeline and
//! checks the resulting field catalogs.

use std::path::{Path, PathBuf};

use schema_profiler::observation::SampleValue;
use schema_profiler::{
    DataType, PiiType, ProfilerConfig, ProfilerError, SchemaAnalyzer, SchemaSnapshot, SemanticType,
    SourceFormat,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn analyzer() -> SchemaAnalyzer {
    SchemaAnalyzer::new(ProfilerConfig::default()).unwrap()
}

fn analyze(name: &str) -> SchemaSnapshot {
    analyzer().analyze_path(fixture(name), None).unwrap()
}

fn assert_invariants(snapshot: &SchemaSnapshot, max_samples: usize) {
    for field in snapshot.fields() {
        assert!(
            (0.0..=100.0).contains(&field.null_percentage),
            "{}: null_percentage {}",
            field.field_path,
            field.null_percentage
        );
        assert!(
            (0.0..=1.0).contains(&field.cardinality_ratio),
            "{}: cardinality_ratio {}",
            field.field_path,
            field.cardinality_ratio
        );
        assert!(field.null_count <= field.total_count, "{}", field.field_path);
        assert!(field.sample_values.len() <= max_samples, "{}", field.field_path);
        assert!((0.0..=100.0).contains(&field.type_confidence), "{}", field.field_path);
        assert_eq!(field.is_nullable, field.null_count > 0, "{}", field.field_path);
    }
}

// =============================================================================
// JSON
// =============================================================================

#[test]
fn test_users_json_catalog() {
    let snapshot = analyze("users.json");

    assert_eq!(snapshot.source_format(), SourceFormat::Json);
    assert_eq!(snapshot.total_records_observed(), 3);
    assert!(!snapshot.is_truncated());
    assert!(snapshot.verify_hash());
    assert_invariants(&snapshot, 10);

    let id = snapshot.get_field("id").unwrap();
    assert_eq!(id.data_type, DataType::Integer);
    assert_eq!(id.type_confidence, 100.0);
    assert_eq!(id.distinct_count, 3);
    assert_eq!(id.cardinality_ratio, 1.0);

    let email = snapshot.get_field("email").unwrap();
    assert_eq!(email.semantic_type, Some(SemanticType::Email));
    assert_eq!(email.pii_type, Some(PiiType::Email));

    let phone = snapshot.get_field("phone").unwrap();
    assert_eq!(phone.data_type, DataType::String);
    assert_eq!(phone.semantic_type, Some(SemanticType::Phone));
    assert!(phone.is_pii);
    assert!(phone.is_nullable);
    assert_eq!(phone.null_count, 1);

    let score = snapshot.get_field("score").unwrap();
    assert_eq!(score.data_type, DataType::Float);
    assert!(score.numeric_stats.is_some());

    let active = snapshot.get_field("active").unwrap();
    assert_eq!(active.data_type, DataType::Boolean);
    assert!(active.numeric_stats.is_none());

    let tags = snapshot.get_field("tags").unwrap();
    assert!(tags.is_array);
    assert_eq!(tags.array_item_type, Some(DataType::String));
    let tag_items = snapshot.get_field("tags[]").unwrap();
    assert_eq!(tag_items.total_count, 3);
    assert_eq!(tag_items.distinct_count, 2);

    let city = snapshot.get_field("address.city").unwrap();
    assert_eq!(city.parent_path.as_deref(), Some("address"));
    assert_eq!(city.nesting_level, 1);
    assert_eq!(
        snapshot.get_field("address").map(|f| f.data_type),
        Some(DataType::Object)
    );
}

#[test]
fn test_analysis_is_idempotent() {
    let first = analyze("users.json");
    let second = analyze("users.json");
    assert_eq!(first.schema_hash(), second.schema_hash());
    assert_eq!(first.fields(), second.fields());
}

#[test]
fn test_hash_ignores_key_order() {
    let original = analyze("users.json");
    let reordered = analyze("users_reordered.json");

    assert_eq!(original.schema_hash(), reordered.schema_hash());
    assert_ne!(
        original.fields()[0].field_path,
        reordered.fields()[0].field_path,
        "first-seen order should follow the document"
    );
}

#[test]
fn test_json_lines_records() {
    let snapshot = analyze("orders.jsonl");

    assert_eq!(snapshot.source_format(), SourceFormat::JsonLines);
    assert_eq!(snapshot.total_records_observed(), 3);
    assert_invariants(&snapshot, 10);

    let sku = snapshot.get_field("items[].sku").unwrap();
    assert_eq!(sku.data_type, DataType::String);
    assert_eq!(sku.total_count, 3);
    assert_eq!(sku.parent_path.as_deref(), Some("items[]"));

    let total = snapshot.get_field("total").unwrap();
    assert_eq!(total.data_type, DataType::Float);
    assert_eq!(total.null_count, 1);
}

#[test]
fn test_array_sampling_limit() {
    let tags: Vec<String> = (0..50).map(|i| format!("\"t{}\"", i)).collect();
    let input = format!(r#"{{"tags": [{}]}}"#, tags.join(", "));
    let snapshot = analyzer().analyze_str(&input, SourceFormat::Json).unwrap();

    let items = snapshot.get_field("tags[]").unwrap();
    assert_eq!(items.total_count, 10);
    assert!(items.sample_values.len() <= 10);
    assert_eq!(snapshot.ingest().array_items_skipped, 40);
    assert!(!snapshot.is_truncated());
}

#[test]
fn test_record_limit_truncates() {
    let mut config = ProfilerConfig::default();
    config.analysis.max_records_to_analyze = 2;
    let snapshot = SchemaAnalyzer::new(config)
        .unwrap()
        .analyze_str(r#"[{"a": 1}, {"a": 2}, {"a": 3}, {"a": 4}]"#, SourceFormat::Json)
        .unwrap();

    assert_eq!(snapshot.total_records_observed(), 2);
    assert!(snapshot.is_truncated());
    assert_eq!(snapshot.get_field("a").unwrap().total_count, 2);
}

#[test]
fn test_sample_cap_respected() {
    let mut config = ProfilerConfig::default();
    config.analysis.max_sample_values_per_field = 3;
    let records: Vec<String> = (0..20).map(|i| format!(r#"{{"n": {}}}"#, i)).collect();
    let input = format!("[{}]", records.join(","));
    let snapshot = SchemaAnalyzer::new(config)
        .unwrap()
        .analyze_str(&input, SourceFormat::Json)
        .unwrap();

    assert_invariants(&snapshot, 3);
    let n = snapshot.get_field("n").unwrap();
    assert_eq!(n.total_count, 20);
    assert_eq!(n.distinct_count, 20);
}

#[test]
fn test_all_null_field_is_unknown() {
    let snapshot = analyzer()
        .analyze_str(r#"[{"x": null}, {"x": null}]"#, SourceFormat::Json)
        .unwrap();
    let x = snapshot.get_field("x").unwrap();
    assert_eq!(x.data_type, DataType::Unknown);
    assert_eq!(x.null_percentage, 100.0);
    assert!(x.sample_values.is_empty());
}

#[test]
fn test_separator_characters_in_keys_change_the_hash() {
    let plain = analyzer()
        .analyze_str(r#"{"a": "x", "b": 1}"#, SourceFormat::Json)
        .unwrap();
    let joined = analyzer()
        .analyze_str(r#"{"a:string|b": 1}"#, SourceFormat::Json)
        .unwrap();
    assert_ne!(plain.schema_hash(), joined.schema_hash());
}

#[test]
fn test_deepest_allowed_depth_parses() {
    let mut config = ProfilerConfig::default();
    config.analysis.max_depth = 100;
    let input = format!("{}1{}", r#"{"a":"#.repeat(110), "}".repeat(110));
    let snapshot = SchemaAnalyzer::new(config)
        .unwrap()
        .analyze_str(&input, SourceFormat::Json)
        .unwrap();

    assert!(snapshot.ingest().depth_pruned >= 1);
    assert!(snapshot.is_truncated());
}

#[test]
fn test_depth_beyond_parser_limit_is_rejected() {
    let mut config = ProfilerConfig::default();
    config.analysis.max_depth = 500;
    let err = SchemaAnalyzer::new(config).unwrap_err();
    assert!(matches!(err, ProfilerError::InvalidConfig(_)));
}

#[test]
fn test_empty_document() {
    let snapshot = analyzer().analyze_str("[]", SourceFormat::Json).unwrap();
    assert!(snapshot.fields().is_empty());
    assert_eq!(snapshot.total_records_observed(), 0);
}

#[test]
fn test_malformed_json_fails() {
    let err = analyzer()
        .analyze_path(fixture("malformed.json"), None)
        .unwrap_err();
    match err {
        ProfilerError::MalformedInput { format, .. } => assert_eq!(format, SourceFormat::Json),
        other => panic!("Expected MalformedInput, got {:?}", other),
    }
}

// =============================================================================
// XML
// =============================================================================

#[test]
fn test_users_xml_catalog() {
    let snapshot = analyze("users.xml");

    assert_eq!(snapshot.source_format(), SourceFormat::Xml);
    assert_eq!(snapshot.total_records_observed(), 3);
    assert_invariants(&snapshot, 10);

    let id = snapshot.get_field("user.@id").unwrap();
    assert_eq!(id.parent_path.as_deref(), Some("user"));
    assert_eq!(id.total_count, 3);

    let email = snapshot.get_field("user.email").unwrap();
    assert_eq!(email.semantic_type, Some(SemanticType::Email));
    assert!(email.is_pii);
    assert_eq!(email.null_count, 1);

    assert_eq!(
        snapshot.get_field("user").map(|f| f.data_type),
        Some(DataType::Object)
    );
}

#[test]
fn test_malformed_xml_fails() {
    let err = analyzer()
        .analyze_str("<users><user></users>", SourceFormat::Xml)
        .unwrap_err();
    assert!(err.is_malformed_input());
}

// =============================================================================
// CSV / TSV
// =============================================================================

#[test]
fn test_users_csv_catalog() {
    let snapshot = analyze("users.csv");

    assert_eq!(snapshot.source_format(), SourceFormat::Csv);
    assert_eq!(snapshot.total_records_observed(), 3);
    assert_invariants(&snapshot, 10);

    let paths: Vec<_> = snapshot.fields().iter().map(|f| f.field_path.as_str()).collect();
    assert_eq!(paths, vec!["id", "email", "amount", "created"]);

    assert_eq!(snapshot.get_field("id").unwrap().data_type, DataType::Integer);
    assert_eq!(snapshot.get_field("amount").unwrap().data_type, DataType::Float);

    let email = snapshot.get_field("email").unwrap();
    assert_eq!(email.semantic_type, Some(SemanticType::Email));
    assert_eq!(email.null_count, 1);

    assert_eq!(
        snapshot.get_field("created").unwrap().semantic_type,
        Some(SemanticType::Date)
    );
}

#[test]
fn test_tsv_input() {
    let snapshot = analyzer()
        .analyze_str("name\tqty\nwidget\t3\ngadget\t\n", SourceFormat::Tsv)
        .unwrap();
    let qty = snapshot.get_field("qty").unwrap();
    assert_eq!(qty.data_type, DataType::Integer);
    assert_eq!(qty.null_percentage, 50.0);
}

#[test]
fn test_csv_zip_codes_keep_leading_zeros() {
    let snapshot = analyzer()
        .analyze_str("zip,origin\n02134,00501\n90210,02134\n10001,01001\n", SourceFormat::Csv)
        .unwrap();

    let zip = snapshot.get_field("zip").unwrap();
    assert_eq!(zip.data_type, DataType::Integer);
    assert_eq!(zip.semantic_type, Some(SemanticType::ZipCode));
    assert!(zip.sample_values.contains(&SampleValue::Str("02134".into())));

    let origin = snapshot.get_field("origin").unwrap();
    assert_eq!(origin.data_type, DataType::String);
    assert_eq!(origin.semantic_type, Some(SemanticType::ZipCode));
    assert_eq!(origin.sample_values[0], SampleValue::Str("00501".into()));
}

#[test]
fn test_ragged_csv_fails() {
    let err = analyzer()
        .analyze_str("a,b\n1,2\n3\n", SourceFormat::Csv)
        .unwrap_err();
    assert!(err.is_malformed_input());
}

// =============================================================================
// SQLite
// =============================================================================

#[test]
fn test_sqlite_tables_catalog() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("app.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, active BOOLEAN);
         INSERT INTO users VALUES (1, 'ann@example.com', 1);
         INSERT INTO users VALUES (2, 'bob@example.org', 0);
         INSERT INTO users VALUES (3, 'cy@example.net', 1);",
    )
    .unwrap();
    drop(conn);

    let snapshot = analyzer().analyze_path(&path, None).unwrap();
    assert_eq!(snapshot.source_format(), SourceFormat::Sqlite);
    assert_eq!(snapshot.total_records_observed(), 3);
    assert_invariants(&snapshot, 10);

    assert_eq!(snapshot.get_field("users").map(|f| f.data_type), Some(DataType::Object));

    let id = snapshot.get_field("users.id").unwrap();
    assert_eq!(id.data_type, DataType::Integer);
    assert_eq!(id.parent_path.as_deref(), Some("users"));
    assert_eq!(id.nesting_level, 1);

    let email = snapshot.get_field("users.email").unwrap();
    assert_eq!(email.semantic_type, Some(SemanticType::Email));
    assert_eq!(email.pii_type, Some(PiiType::Email));
    assert!(email.is_pii);

    let active = snapshot.get_field("users.active").unwrap();
    assert_eq!(active.data_type, DataType::Boolean);
}

// =============================================================================
// Formats and files
// =============================================================================

#[test]
fn test_unknown_extension_rejected() {
    let err = analyzer().analyze_path("data.parquet", None).unwrap_err();
    assert!(matches!(err, ProfilerError::UnsupportedFormat(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = analyzer()
        .analyze_path(fixture("does_not_exist.json"), None)
        .unwrap_err();
    assert!(matches!(err, ProfilerError::Io(_)));
}
