//! End-to-end client tests over the in-memory backend.

use std::path::Path;
use std::sync::Arc;

use trellis::{
    Compression, Error, ExternalEncoding, FieldDescriptor, FieldKind, MemoryStore, PayloadStore,
    Query, Record, ScalarKind, SchemaRegistry, StoreClient, StoreManager, TypeDescriptor, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ---------------------------------------------------------------------------
// fixtures
// ---------------------------------------------------------------------------

fn schema() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(TypeDescriptor::new(
            "Doc",
            [
                FieldDescriptor::new("id", FieldKind::Scalar(ScalarKind::String)).identity(),
                FieldDescriptor::new("title", FieldKind::Scalar(ScalarKind::String)),
                FieldDescriptor::new("rank", FieldKind::enumeration(["DRAFT", "FINAL"])),
                FieldDescriptor::new(
                    "words",
                    FieldKind::List(Box::new(FieldKind::Scalar(ScalarKind::String))),
                ),
                FieldDescriptor::new("meta", FieldKind::Record("Meta".into())),
                FieldDescriptor::new(
                    "attachments",
                    FieldKind::List(Box::new(FieldKind::Record("Att".into()))),
                ),
                FieldDescriptor::new("body", FieldKind::Bytes)
                    .external(ExternalEncoding::bincode(Compression::Zstd)),
            ],
        ))
        .with(TypeDescriptor::new(
            "Meta",
            [
                FieldDescriptor::new("author", FieldKind::Scalar(ScalarKind::String)),
                FieldDescriptor::new("year", FieldKind::Scalar(ScalarKind::Int)),
                FieldDescriptor::new("origin", FieldKind::Record("Origin".into())),
            ],
        ))
        .with(TypeDescriptor::new(
            "Origin",
            [FieldDescriptor::new(
                "city",
                FieldKind::Scalar(ScalarKind::String),
            )],
        ))
        .with(TypeDescriptor::new(
            "Att",
            [
                FieldDescriptor::new("name", FieldKind::Scalar(ScalarKind::String)),
                FieldDescriptor::new("data", FieldKind::Bytes)
                    .external(ExternalEncoding::bincode(Compression::None)),
            ],
        ))
}

fn client(dir: &Path) -> StoreClient<MemoryStore> {
    init_tracing();
    StoreClient::new(
        MemoryStore::new(),
        Arc::new(schema()),
        PayloadStore::new(dir),
    )
}

fn doc(id: &str, title: &str, rank: &str) -> Record {
    let att = |name: &str| {
        Record::new("Att")
            .with_field("name", name)
            .with_field("data", vec![1u8, 2, 3])
    };
    Record::new("Doc")
        .with_field("id", id)
        .with_field("title", title)
        .with_field("rank", Value::Enum(rank.into()))
        .with_field(
            "words",
            Value::List(vec![Value::from("lorem"), Value::from("ipsum")]),
        )
        .with_field(
            "meta",
            Record::new("Meta")
                .with_field("author", "ann")
                .with_field("year", 2024i64)
                .with_field("origin", Record::new("Origin").with_field("city", "Riga")),
        )
        .with_field(
            "attachments",
            Value::List(vec![Value::Record(att("a.txt")), Value::Record(att("b.txt"))]),
        )
        .with_field("body", vec![0u8; 64])
}

fn payload_file_count(root: &Path) -> usize {
    fn walk(dir: &Path, count: &mut usize) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, count);
            } else {
                *count += 1;
            }
        }
    }
    let mut count = 0;
    walk(root, &mut count);
    count
}

// Doc + Meta + Origin + 2 Att + words holder.
const ENTITIES_PER_DOC: usize = 6;
// body + 2 attachment payloads.
const PAYLOADS_PER_DOC: usize = 3;

// ---------------------------------------------------------------------------
// store / retrieve
// ---------------------------------------------------------------------------

#[test]
fn store_then_find_by_id_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let original = doc("d-1", "hello", "DRAFT");
    client.store_blocking(&original).unwrap();

    let loaded = client
        .find_by_id_blocking("Doc", &Value::from("d-1"))
        .unwrap()
        .unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn record_with_empty_attachments_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let mut original = doc("d-1", "bare", "DRAFT");
    original.set_field("attachments", Value::List(vec![]));
    client.store_blocking(&original).unwrap();

    let loaded = client
        .find_by_id_blocking("Doc", &Value::from("d-1"))
        .unwrap()
        .unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn find_by_id_miss_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());
    let found = client
        .find_by_id_blocking("Doc", &Value::from("nope"))
        .unwrap();
    assert!(found.is_none());
}

#[test]
fn store_replaces_the_whole_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "first", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-1", "second", "FINAL")).unwrap();

    let all = client.get_all_blocking("Doc").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].field("title"), Some(&Value::from("second")));

    // No orphaned entities or payload files from the first version.
    assert_eq!(client.backend().entity_count(), ENTITIES_PER_DOC);
    assert_eq!(payload_file_count(dir.path()), PAYLOADS_PER_DOC);
}

#[test]
fn update_requires_an_existing_record() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let err = client
        .update_blocking(&doc("d-9", "ghost", "DRAFT"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(client.backend().is_empty());

    client.store_blocking(&doc("d-9", "ghost", "DRAFT")).unwrap();
    client.update_blocking(&doc("d-9", "real", "FINAL")).unwrap();
    let loaded = client
        .find_by_id_blocking("Doc", &Value::from("d-9"))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.field("title"), Some(&Value::from("real")));
}

#[test]
fn get_all_preserves_creation_order() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "one", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-2", "two", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-3", "three", "DRAFT")).unwrap();

    let ids: Vec<String> = client
        .get_all_blocking("Doc")
        .unwrap()
        .iter()
        .filter_map(|r| r.field("id"))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    assert_eq!(ids, ["d-1", "d-2", "d-3"]);
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

#[test]
fn delete_by_id_tears_down_three_levels_of_nesting() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "x", "DRAFT")).unwrap();
    assert_eq!(client.backend().entity_count(), ENTITIES_PER_DOC);

    assert!(client
        .delete_by_id_blocking("Doc", &Value::from("d-1"))
        .unwrap());
    assert!(client.backend().is_empty());
    assert_eq!(payload_file_count(dir.path()), 0);

    // Deleting again reports nothing deleted.
    assert!(!client
        .delete_by_id_blocking("Doc", &Value::from("d-1"))
        .unwrap());
}

#[test]
fn deleting_one_record_leaves_the_others_payload_files() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let kept = doc("d-keep", "keep", "FINAL");
    client.store_blocking(&doc("d-drop", "drop", "DRAFT")).unwrap();
    client.store_blocking(&kept).unwrap();
    assert_eq!(payload_file_count(dir.path()), 2 * PAYLOADS_PER_DOC);

    client
        .delete_by_id_blocking("Doc", &Value::from("d-drop"))
        .unwrap();
    assert_eq!(payload_file_count(dir.path()), PAYLOADS_PER_DOC);

    // The surviving record still decodes, payloads included.
    let loaded = client
        .find_by_id_blocking("Doc", &Value::from("d-keep"))
        .unwrap()
        .unwrap();
    assert_eq!(loaded, kept);
}

#[test]
fn delete_all_counts_roots_only() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "a", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-2", "b", "FINAL")).unwrap();

    assert_eq!(client.delete_all_blocking("Doc").unwrap(), 2);
    assert!(client.backend().is_empty());
    assert_eq!(payload_file_count(dir.path()), 0);
}

// ---------------------------------------------------------------------------
// queries
// ---------------------------------------------------------------------------

#[test]
fn eq_predicates_are_anded() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "report", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-2", "report", "FINAL")).unwrap();
    client.store_blocking(&doc("d-3", "memo", "FINAL")).unwrap();

    let query = Query::new()
        .eq("title", "report")
        .eq("rank", Value::Enum("FINAL".into()));
    let found = client.find_by_blocking("Doc", &query).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].field("id"), Some(&Value::from("d-2")));
}

#[test]
fn starts_with_matches_prefixes() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "report-q1", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-2", "report-q2", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-3", "memo", "DRAFT")).unwrap();

    let query = Query::new().starts_with("title", "report");
    let found = client.find_by_blocking("Doc", &query).unwrap();
    assert_eq!(found.len(), 2);

    let query = Query::new().starts_with("title", "report").eq("title", "report-q2");
    let found = client.find_by_blocking("Doc", &query).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].field("id"), Some(&Value::from("d-2")));
}

#[test]
fn empty_query_matches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());
    client.store_blocking(&doc("d-1", "x", "DRAFT")).unwrap();
    assert!(client
        .find_by_blocking("Doc", &Query::new())
        .unwrap()
        .is_empty());
}

#[test]
fn querying_an_unknown_field_fails() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());
    client.store_blocking(&doc("d-1", "x", "DRAFT")).unwrap();
    let err = client
        .find_by_blocking("Doc", &Query::new().eq("no_such_field", 1i64))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownField { .. }));
}

#[test]
fn delete_by_query_removes_only_matches() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    client.store_blocking(&doc("d-1", "report", "DRAFT")).unwrap();
    client.store_blocking(&doc("d-2", "memo", "DRAFT")).unwrap();

    let deleted = client
        .delete_by_blocking("Doc", &Query::new().eq("title", "report"))
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(client.get_all_blocking("Doc").unwrap().len(), 1);
    assert_eq!(payload_file_count(dir.path()), PAYLOADS_PER_DOC);
}

// ---------------------------------------------------------------------------
// transactions
// ---------------------------------------------------------------------------

#[test]
fn a_failing_transaction_block_leaves_the_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let result: trellis::Result<()> = client.in_transaction(|txn| {
        txn.new_entity("Doc")?;
        txn.new_entity("Doc")?;
        Err(Error::NotFound {
            type_name: "Doc".to_string(),
            id: "forced".to_string(),
        })
    });
    assert!(result.is_err());
    assert!(client.backend().is_empty());
}

#[test]
fn concurrent_writers_all_commit_via_replay() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    std::thread::scope(|scope| {
        for i in 0..4 {
            let client = client.clone();
            scope.spawn(move || {
                client
                    .store_blocking(&doc(&format!("d-{i}"), "w", "DRAFT"))
                    .unwrap();
            });
        }
    });

    assert_eq!(client.get_all_blocking("Doc").unwrap().len(), 4);
}

// ---------------------------------------------------------------------------
// async facade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn async_facade_mirrors_the_blocking_calls() {
    let dir = tempfile::tempdir().unwrap();
    let client = client(dir.path());

    let original = doc("d-1", "async", "FINAL");
    client.store(original.clone()).await.unwrap();

    let loaded = client
        .find_by_id("Doc", Value::from("d-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, original);

    let found = client
        .find_by("Doc", Query::new().eq("title", "async"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    assert!(client.delete_by_id("Doc", Value::from("d-1")).await.unwrap());
    assert!(client.get_all("Doc").await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// manager
// ---------------------------------------------------------------------------

#[test]
fn manager_isolates_named_stores() {
    let dir = tempfile::tempdir().unwrap();
    let manager = StoreManager::new(dir.path(), Arc::new(schema()));

    let main = manager.client("main");
    let scratch = manager.client("scratch");

    main.store_blocking(&doc("d-1", "x", "DRAFT")).unwrap();
    assert_eq!(main.get_all_blocking("Doc").unwrap().len(), 1);
    assert!(scratch.get_all_blocking("Doc").unwrap().is_empty());

    // Payload files land under the store's own directory.
    assert_eq!(payload_file_count(&dir.path().join("main")), PAYLOADS_PER_DOC);
    assert_eq!(payload_file_count(&dir.path().join("scratch")), 0);
}
