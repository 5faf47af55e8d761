use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::entity::EntityKey;
use crate::node::Node;

fn profile(time: serde_json::Value) -> Node {
    Node::from_json(&json!({"ids_properties": {"homogeneous_time": 1}, "time": time})).unwrap()
}

#[test]
fn memory_store_lists_sorted_names_and_occurrences() {
    let store = MemoryStore::new("mem://test")
        .with(DataEntity::new("equilibrium", 0, "3.40.0", profile(json!([0.0]))))
        .with(DataEntity::new("core_profiles", 2, "3.40.0", profile(json!([0.0]))))
        .with(DataEntity::new("core_profiles", 0, "3.40.0", profile(json!([0.0]))));

    assert_eq!(store.list_entity_names().unwrap(), vec!["core_profiles", "equilibrium"]);
    assert_eq!(store.list_occurrences("core_profiles").unwrap(), vec![0, 2]);
    assert!(store.get("core_profiles", 1).unwrap().is_none());
    assert_eq!(
        store.get("core_profiles", 2).unwrap().unwrap().key,
        EntityKey::new("core_profiles", 2)
    );
}

#[test]
fn json_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let entity = DataEntity::new("core_profiles", 1, "3.39.0", profile(json!([0.0, 0.5])));
    store.write(&entity).unwrap();
    store
        .write_schema("core_profiles", ["ids_properties/homogeneous_time", "time"])
        .unwrap();

    assert_eq!(store.list_entity_names().unwrap(), vec!["core_profiles"]);
    assert_eq!(store.list_occurrences("core_profiles").unwrap(), vec![1]);

    let loaded = store.get("core_profiles", 1).unwrap().unwrap();
    assert_eq!(loaded.version, "3.39.0");
    assert_eq!(loaded.root, entity.root);

    let schema = store.schema_paths("core_profiles").unwrap().unwrap();
    assert!(schema.contains("time"));
    assert!(store.schema_paths("equilibrium").unwrap().is_none());
}

#[test]
fn json_store_rejects_non_object_data() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("wall")).unwrap();
    std::fs::write(
        dir.path().join("wall/0.json"),
        r#"{"version": "3.40.0", "data": [1, 2]}"#,
    )
    .unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    assert!(matches!(
        store.get("wall", 0),
        Err(CoreError::MalformedEntity { occurrence: 0, .. })
    ));
}

#[test]
fn open_store_accepts_paths_and_schemes() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().display().to_string();
    assert_eq!(open_store(&plain).unwrap().uri(), plain);

    let json_uri = format!("json://{plain}");
    assert_eq!(open_store(&json_uri).unwrap().uri(), json_uri);

    let file_uri = url::Url::from_directory_path(dir.path()).unwrap().to_string();
    assert!(open_store(&file_uri).is_ok());

    assert!(matches!(open_store("imas:hdf5?path=/x"), Err(CoreError::StoreNotFound(_))));
    assert!(matches!(open_store("s3://bucket/x"), Err(CoreError::InvalidUri(_))));
}

#[test]
fn session_closes_store_exactly_once() {
    let store = Arc::new(MemoryStore::new("mem://session"));
    {
        let session = StoreSession::new(Box::new(store.clone()));
        assert_eq!(session.store().uri(), "mem://session");
    }
    assert_eq!(store.close_count(), 1);

    let session = StoreSession::new(Box::new(store.clone()));
    session.close().unwrap();
    assert_eq!(store.close_count(), 2);
}
