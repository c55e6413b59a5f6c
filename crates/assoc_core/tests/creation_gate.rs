use assoc_core::blog::{blog_graph, blog_registry};
use assoc_core::{
    install_schema, open_db_in_memory, AttributeError, Attributes, AuthError, Cardinality,
    CreateError, CreationGate, Credentials, ForeignKeys, IdentityProvider, InstallMode, Record,
    RecordFilter, RecordId, RecordStore, RelationGraph, RelationGraphBuilder, SqliteRecordStore,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;
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

fn register(gate: &CreationGate<'_, impl RecordStore>, name: &str) -> Record {
    gate.register_identity(attrs(json!({ "displayName": name, "credentialHash": "h" })))
        .unwrap()
}

fn fks(pairs: &[(&str, RecordId)]) -> ForeignKeys {
    pairs
        .iter()
        .map(|(name, id)| (name.to_string(), *id))
        .collect()
}

/// Maps fixed tokens to author ids.
struct TokenTable(HashMap<String, RecordId>);

impl IdentityProvider for TokenTable {
    fn authenticate(&self, credentials: &Credentials) -> Result<RecordId, AuthError> {
        self.0
            .get(&credentials.token)
            .copied()
            .ok_or_else(|| AuthError::InvalidCredentials("unknown token".to_string()))
    }
}

#[test]
fn create_injects_acting_author_as_identity_foreign_key() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    let ada = register(&gate, "ada");

    let doc = gate
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap();

    assert_eq!(doc.foreign_key("authorId"), Some(ada.id));
    assert_eq!(doc.attribute("title"), Some(&json!("t")));
}

#[test]
fn supplied_identity_foreign_key_is_overridden() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    let ada = register(&gate, "ada");
    let max = register(&gate, "max");

    let explicit = gate
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            ada.id,
            &fks(&[("authorId", max.id)]),
        )
        .unwrap();
    assert_eq!(explicit.foreign_key("authorId"), Some(ada.id));

    // Foreign keys smuggled in through attributes are dropped.
    let smuggled = gate
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b", "authorId": max.id.to_string() })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap();
    assert_eq!(smuggled.foreign_key("authorId"), Some(ada.id));
}

#[test]
fn non_identity_foreign_key_must_be_explicit() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    let ada = register(&gate, "ada");
    let doc = gate
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap();

    let err = gate
        .create(
            "annotation",
            attrs(json!({ "body": "note", "documentId": doc.id.to_string() })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CreateError::MissingForeignKey { kind, foreign_key }
            if kind == "annotation" && foreign_key == "documentId"
    ));

    let note = gate
        .create(
            "annotation",
            attrs(json!({ "body": "note" })),
            ada.id,
            &fks(&[("documentId", doc.id)]),
        )
        .unwrap();
    assert_eq!(note.foreign_key("documentId"), Some(doc.id));
    assert_eq!(note.foreign_key("authorId"), Some(ada.id));
}

#[test]
fn dangling_foreign_key_persists_nothing() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    let ada = register(&gate, "ada");
    let missing = Uuid::new_v4();

    let err = gate
        .create(
            "annotation",
            attrs(json!({ "body": "note" })),
            ada.id,
            &fks(&[("documentId", missing)]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CreateError::DanglingForeignKey { foreign_key, value, .. }
            if foreign_key == "documentId" && value == missing.to_string()
    ));

    let ghost = gate
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            Uuid::new_v4(),
            &ForeignKeys::new(),
        )
        .unwrap_err();
    assert_eq!(ghost.code(), "dangling_foreign_key");

    assert!(store
        .query("annotation", &RecordFilter::new())
        .unwrap()
        .is_empty());
    assert!(store.query("document", &RecordFilter::new()).unwrap().is_empty());
}

#[test]
fn create_validates_kind_foreign_keys_and_attributes() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    let ada = register(&gate, "ada");

    let unknown_kind = gate
        .create("comment", Attributes::new(), ada.id, &ForeignKeys::new())
        .unwrap_err();
    assert!(matches!(unknown_kind, CreateError::UnknownEntityKind(kind) if kind == "comment"));

    let identity = gate
        .create(
            "author",
            attrs(json!({ "displayName": "x", "credentialHash": "h" })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap_err();
    assert!(matches!(identity, CreateError::IdentityKind(kind) if kind == "author"));

    let unknown_fk = gate
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            ada.id,
            &fks(&[("documentId", Uuid::new_v4())]),
        )
        .unwrap_err();
    assert!(matches!(
        unknown_fk,
        CreateError::UnknownForeignKey { foreign_key, .. } if foreign_key == "documentId"
    ));

    let missing_title = gate
        .create(
            "document",
            attrs(json!({ "body": "b" })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap_err();
    assert!(matches!(
        missing_title,
        CreateError::InvalidAttributes(AttributeError::MissingAttribute { attribute, .. })
            if attribute == "title"
    ));

    let wrong_type = gate
        .create(
            "document",
            attrs(json!({ "title": 7, "body": "b" })),
            ada.id,
            &ForeignKeys::new(),
        )
        .unwrap_err();
    assert_eq!(wrong_type.code(), "invalid_attributes");
}

#[test]
fn create_authenticated_resolves_author_from_credentials() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    let ada = register(&gate, "ada");
    let provider = TokenTable(HashMap::from([("ada-token".to_string(), ada.id)]));

    let credentials = Credentials::from_authorization_header("Bearer ada-token").unwrap();
    let doc = gate
        .create_authenticated(
            &provider,
            &credentials,
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            &ForeignKeys::new(),
        )
        .unwrap();
    assert_eq!(doc.foreign_key("authorId"), Some(ada.id));

    let err = gate
        .create_authenticated(
            &provider,
            &Credentials::new("stolen"),
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            &ForeignKeys::new(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CreateError::Unauthenticated(AuthError::InvalidCredentials(_))
    ));
    assert_eq!(
        store.query("document", &RecordFilter::new()).unwrap().len(),
        1
    );
}

#[test]
fn register_identity_enforces_unique_display_name() {
    let (conn, graph) = setup();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let gate = CreationGate::new(&graph, &store);
    register(&gate, "ada");

    let err = gate
        .register_identity(attrs(json!({ "displayName": "ada", "credentialHash": "h2" })))
        .unwrap_err();
    assert!(matches!(
        err,
        CreateError::UniqueViolation { kind, attribute }
            if kind == "author" && attribute == "displayName"
    ));
}

#[test]
fn create_without_identity_kind_is_rejected() {
    let mut builder = RelationGraphBuilder::new(blog_registry().unwrap());
    builder
        .declare_relation("author", "document", Cardinality::OneToMany)
        .unwrap();
    let graph = builder.build();
    let mut conn = open_db_in_memory().unwrap();
    install_schema(&mut conn, &graph, InstallMode::Create).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &graph).unwrap();
    let ada = store
        .insert(
            "author",
            &attrs(json!({ "displayName": "ada", "credentialHash": "h" })),
        )
        .unwrap();
    let max = store
        .insert(
            "author",
            &attrs(json!({ "displayName": "max", "credentialHash": "h" })),
        )
        .unwrap();

    let err = CreationGate::new(&graph, &store)
        .create(
            "document",
            attrs(json!({ "title": "t", "body": "b" })),
            ada.id,
            &fks(&[("authorId", max.id)]),
        )
        .unwrap_err();

    assert!(matches!(err, CreateError::NoIdentityKind));
    assert!(store
        .query("document", &RecordFilter::new())
        .unwrap()
        .is_empty());
}
