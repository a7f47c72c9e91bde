//! Behaviour shared by every store backend
use crate::store::artifacts::{write_once, WriteOnce};
use crate::store::backends::{FileStore, MemoryStore};
use crate::store::error::StoreResult;
use crate::store::keys;
use crate::store::traits::ObjectStore;
use tempfile::TempDir;

/// Test harness for running tests against any store backend
async fn test_backend<T: ObjectStore>(store: &T) -> StoreResult<()> {
    test_round_trip(store).await?;
    test_conditional_create(store).await?;
    test_listing(store).await?;
    test_missing_objects(store).await?;
    Ok(())
}

async fn test_round_trip<T: ObjectStore>(store: &T) -> StoreResult<()> {
    let key = keys::template_key("seed.json");
    let meta = store
        .put(&key, br#"{"name":"seed"}"#.to_vec(), Some("application/json"))
        .await?;
    assert_eq!(meta.key, key);
    assert_eq!(meta.size, 15);

    let object = store.get(&key).await?.expect("object should exist");
    assert_eq!(object.body, br#"{"name":"seed"}"#);

    let head = store.head(&key).await?.expect("metadata should exist");
    assert_eq!(head.size, 15);

    // Overwrite through plain put changes the version
    let updated = store.put(&key, br#"{"name":"seed2"}"#.to_vec(), None).await?;
    assert_ne!(updated.version, meta.version);
    Ok(())
}

async fn test_conditional_create<T: ObjectStore>(store: &T) -> StoreResult<()> {
    let key = keys::stack_code_key("exec-1", "scn-1");
    let (first, _) = write_once(store, &key, b"stack v1".to_vec()).await?;
    assert_eq!(first, WriteOnce::Written);

    let (again, _) = write_once(store, &key, b"stack v1".to_vec()).await?;
    assert_eq!(again, WriteOnce::AlreadyPresent);

    let conflict = write_once(store, &key, b"stack v2".to_vec()).await;
    assert!(conflict.unwrap_err().is_conflict());

    let object = store.get(&key).await?.expect("artifact should exist");
    assert_eq!(object.body, b"stack v1");
    Ok(())
}

async fn test_listing<T: ObjectStore>(store: &T) -> StoreResult<()> {
    for (exec, scn) in [("exec-b", "s1"), ("exec-a", "s2"), ("exec-a", "s1")] {
        store
            .put(&keys::scenario_key(exec, scn), b"{}".to_vec(), None)
            .await?;
    }

    let listed: Vec<String> = store
        .list(keys::SCENARIOS_PREFIX)
        .await?
        .into_iter()
        .map(|meta| meta.key)
        .collect();
    assert_eq!(
        listed,
        vec![
            "scenarios/exec-a/s1.json",
            "scenarios/exec-a/s2.json",
            "scenarios/exec-b/s1.json",
        ]
    );

    let scoped = store.list("scenarios/exec-a/").await?;
    assert_eq!(scoped.len(), 2);
    Ok(())
}

async fn test_missing_objects<T: ObjectStore>(store: &T) -> StoreResult<()> {
    assert!(store.get("templates/missing.json").await?.is_none());
    assert!(store.head("templates/missing.json").await?.is_none());
    assert!(store.list("experiments/").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_memory_backend() {
    let store = MemoryStore::new();
    test_backend(&store).await.unwrap();
}

#[tokio::test]
async fn test_file_backend() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::with_root(dir.path(), "chaos-templates")
        .await
        .unwrap();
    test_backend(&store).await.unwrap();
}

#[tokio::test]
async fn test_file_backend_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileStore::with_root(dir.path(), "bucket").await.unwrap();
        store
            .put("executions/exec-1.json", b"{}".to_vec(), None)
            .await
            .unwrap();
    }
    let reopened = FileStore::with_root(dir.path(), "bucket").await.unwrap();
    assert!(reopened
        .get("executions/exec-1.json")
        .await
        .unwrap()
        .is_some());
}
