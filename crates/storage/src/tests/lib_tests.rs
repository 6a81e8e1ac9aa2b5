use super::*;

async fn memory_store() -> SessionStore {
    SessionStore::new("sqlite::memory:").await.expect("store")
}

#[tokio::test]
async fn token_roundtrip_under_jwt_key() {
    let store = memory_store().await;
    assert_eq!(store.load_token().await.expect("load"), None);

    store.store_token("token-abc").await.expect("store token");
    assert_eq!(
        store.load_token().await.expect("load"),
        Some("token-abc".to_string())
    );
    assert_eq!(
        store.get(JWT_STORAGE_KEY).await.expect("get"),
        Some("token-abc".to_string())
    );
}

#[tokio::test]
async fn store_token_overwrites_previous_value() {
    let store = memory_store().await;
    store.store_token("first").await.expect("store");
    store.store_token("second").await.expect("store");
    assert_eq!(
        store.load_token().await.expect("load"),
        Some("second".to_string())
    );
}

#[tokio::test]
async fn clear_token_removes_persisted_value() {
    let store = memory_store().await;
    store.store_token("token-abc").await.expect("store");
    store.clear_token().await.expect("clear");
    assert_eq!(store.load_token().await.expect("load"), None);
}

#[tokio::test]
async fn clearing_an_absent_token_is_not_an_error() {
    let store = memory_store().await;
    store.clear_token().await.expect("clear");
}

#[tokio::test]
async fn persists_across_reopen_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}/session.db", dir.path().display());

    {
        let store = SessionStore::new(&url).await.expect("store");
        store.store_token("durable-token").await.expect("store");
    }

    let reopened = SessionStore::new(&url).await.expect("reopen");
    assert_eq!(
        reopened.load_token().await.expect("load"),
        Some("durable-token".to_string())
    );
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}/nested/deeper/session.db", dir.path().display());
    let store = SessionStore::new(&url).await.expect("store");
    store.health_check().await.expect("health");
}
