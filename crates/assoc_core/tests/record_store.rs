use assoc_core::blog::blog_graph;
use assoc_core::{
    install_schema, open_db_in_memory, AttributeSpec, AttributeType, Attributes, Cardinality,
    EntityRegistry, EntitySchema, InstallMode, RecordFilter, RecordStore, RelationGraph,
    RelationGraphBuilder, SqliteRecordStore, StoreError,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn setup() -> (Connection, RelationGraph) {
    let graph = blog_graph().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    install_schema(&mut conn, &graph, InstallMode::Create).unwrap();
    (conn, graph)
}

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap()
}

#[test]
fn try_new_requires_installed_tables() {
    let graph = blog_graph().unwrap();
    let conn = open_db_in_memory().unwrap();

    let err = SqliteRecordStore::try_new(&conn, &graph).err().unwrap();
    assert!(matches!(err, StoreError::MissingTable(kind) if kind == "author"));
}

#[test]
fn insert_assigns_id_and_reads_back_record() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();

    let author = store
        .insert(
            "author",
            &attrs(json!({ "displayName": "ada", "credentialHash": "h1" })),
        )
        .unwrap();

    assert_eq!(author.kind, "author");
    assert_eq!(author.attribute("displayName"), Some(&json!("ada")));
    assert!(author.created_at > 0);
    assert_eq!(store.get("author", author.id).unwrap(), Some(author.clone()));
    assert!(store.exists("author", author.id).unwrap());
    assert!(!store.exists("author", Uuid::new_v4()).unwrap());
}

#[test]
fn insert_rejects_dangling_foreign_key() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let missing = Uuid::new_v4();

    let err = store
        .insert(
            "document",
            &attrs(json!({ "title": "t", "body": "b", "authorId": missing.to_string() })),
        )
        .unwrap_err();

    match err {
        StoreError::DanglingForeignKey {
            kind,
            foreign_key,
            value,
        } => {
            assert_eq!(kind, "document");
            assert_eq!(foreign_key, "authorId");
            assert_eq!(value, missing.to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.query("document", &RecordFilter::new()).unwrap().is_empty());
}

#[test]
fn insert_reports_unique_violation_column() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let payload = attrs(json!({ "displayName": "ada", "credentialHash": "h1" }));

    store.insert("author", &payload).unwrap();
    let err = store.insert("author", &payload).unwrap_err();

    assert!(matches!(
        err,
        StoreError::UniqueViolation { kind, attribute } if kind == "author" && attribute == "displayName"
    ));
}

#[test]
fn insert_rejects_unknown_columns_and_kinds() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();

    let unknown_attribute = store
        .insert("author", &attrs(json!({ "nickname": "x" })))
        .unwrap_err();
    assert!(matches!(
        unknown_attribute,
        StoreError::UnknownAttribute { attribute, .. } if attribute == "nickname"
    ));

    let unknown_kind = store.insert("comment", &Attributes::new()).unwrap_err();
    assert!(matches!(unknown_kind, StoreError::UnknownEntityKind(kind) if kind == "comment"));
}

#[test]
fn query_filters_by_attribute_and_keeps_insertion_order() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();

    let names = ["zoe", "ada", "max"];
    let ids: Vec<Uuid> = names
        .iter()
        .map(|name| {
            store
                .insert(
                    "author",
                    &attrs(json!({ "displayName": name, "credentialHash": "h" })),
                )
                .unwrap()
                .id
        })
        .collect();

    let all = store.query("author", &RecordFilter::new()).unwrap();
    assert_eq!(all.iter().map(|record| record.id).collect::<Vec<_>>(), ids);

    let some = store
        .query(
            "author",
            &RecordFilter::new().any_of("displayName", vec![json!("max"), json!("zoe")]),
        )
        .unwrap();
    assert_eq!(
        some.iter().map(|record| record.id).collect::<Vec<_>>(),
        vec![ids[0], ids[2]]
    );

    let none = store
        .query("author", &RecordFilter::new().any_of("displayName", Vec::new()))
        .unwrap();
    assert!(none.is_empty());

    let err = store
        .query("author", &RecordFilter::new().eq("nickname", "x"))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownAttribute { .. }));
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[test]
fn timestamps_are_epoch_milliseconds() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();

    let before = now_millis();
    let author = store
        .insert(
            "author",
            &attrs(json!({ "displayName": "ada", "credentialHash": "h1" })),
        )
        .unwrap();
    let after = now_millis();

    assert!(author.created_at >= before - 5, "{} < {before}", author.created_at);
    assert!(author.created_at <= after + 5, "{} > {after}", author.created_at);
    assert_eq!(author.updated_at, author.created_at);
}

#[test]
fn insert_rejects_values_of_the_wrong_type_without_writing() {
    let mut registry = EntityRegistry::new();
    registry
        .register(
            EntitySchema::new("owner")
                .attribute(AttributeSpec::required("name", AttributeType::Text)),
        )
        .unwrap();
    registry
        .register(
            EntitySchema::new("setting")
                .attribute(AttributeSpec::optional("enabled", AttributeType::Boolean))
                .attribute(AttributeSpec::optional("level", AttributeType::Integer)),
        )
        .unwrap();
    let mut builder = RelationGraphBuilder::new(registry);
    builder
        .declare_relation("owner", "setting", Cardinality::OneToMany)
        .unwrap();
    let graph = builder.build();
    let mut conn = open_db_in_memory().unwrap();
    install_schema(&mut conn, &graph, InstallMode::Create).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let owner = store.insert("owner", &attrs(json!({ "name": "o" }))).unwrap();
    let owner_id = owner.id.to_string();

    for payload in [
        json!({ "enabled": 5, "ownerId": owner_id }),
        json!({ "level": 1.5, "ownerId": owner_id }),
        json!({ "enabled": true, "ownerId": 7 }),
    ] {
        let err = store.insert("setting", &attrs(payload)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)), "{err}");
    }
    assert!(store
        .query("setting", &RecordFilter::new())
        .unwrap()
        .is_empty());

    let valid = store
        .insert("setting", &attrs(json!({ "enabled": true, "level": 2, "ownerId": owner_id })))
        .unwrap();
    assert_eq!(valid.attribute("enabled"), Some(&json!(true)));
}
