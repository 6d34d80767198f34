#[cfg(test)]
mod tests {
    use crate::storage::{open_storage, FileStorage, MemoryStorage};
    use crate::vector::MemoryVectorStore;
    use chat_core::ports::{StoragePort, VectorStorePort};
    use chat_types::config::{StorageBackendType, StorageConfig};
    use chat_types::ChatError;

    // ─── MemoryStorage Tests ─────────────────────────────────

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.backend_name(), "memory");
        assert!(storage.get("missing").await.unwrap().is_none());

        storage.set("session/a", b"one").await.unwrap();
        storage.set("session/a", b"two").await.unwrap();
        assert_eq!(storage.get("session/a").await.unwrap().as_deref(), Some(&b"two"[..]));
        assert!(storage.exists("session/a").await.unwrap());

        storage.delete("session/a").await.unwrap();
        assert!(!storage.exists("session/a").await.unwrap());
        storage.delete("session/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_storage_list_keys_by_prefix() {
        let storage = MemoryStorage::new();
        storage.set("session/a", b"1").await.unwrap();
        storage.set("session/b", b"2").await.unwrap();
        storage.set("other/c", b"3").await.unwrap();

        let mut keys = storage.list_keys("session/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["session/a", "session/b"]);
    }

    // ─── FileStorage Tests ───────────────────────────────────

    #[tokio::test]
    async fn test_file_storage_roundtrip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(storage.backend_name(), "file");

        storage.set("session/abc-1", b"{\"id\":1}").await.unwrap();
        storage.set("session/abc-2", b"{}").await.unwrap();
        storage.set("notes/x", b"x").await.unwrap();

        assert_eq!(
            storage.get("session/abc-1").await.unwrap().as_deref(),
            Some(&b"{\"id\":1}"[..])
        );
        let mut keys = storage.list_keys("session/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["session/abc-1", "session/abc-2"]);

        storage.delete("session/abc-1").await.unwrap();
        assert!(storage.get("session/abc-1").await.unwrap().is_none());
        assert!(!storage.exists("session/abc-1").await.unwrap());
        storage.delete("session/abc-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::open(dir.path()).await.unwrap();
            storage.set("session/keep", b"kept").await.unwrap();
        }
        let reopened = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("session/keep").await.unwrap().as_deref(), Some(&b"kept"[..]));
    }

    #[tokio::test]
    async fn test_file_storage_keys_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let storage = FileStorage::open(&root).await.unwrap();
        storage.set("../escape", b"x").await.unwrap();

        assert!(!dir.path().join("escape").exists());
        assert_eq!(storage.list_keys("").await.unwrap(), vec!["../escape"]);
    }

    #[tokio::test]
    async fn test_file_storage_leaves_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        for i in 0..5 {
            storage.set("session/a", format!("{}", i).as_bytes()).await.unwrap();
        }
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(storage.get("session/a").await.unwrap().as_deref(), Some(&b"4"[..]));
    }

    // ─── Backend Selection Tests ─────────────────────────────

    #[tokio::test]
    async fn test_open_storage_selects_backend() {
        let dir = tempfile::tempdir().unwrap();

        let auto_memory = open_storage(&StorageConfig::default()).await.unwrap();
        assert_eq!(auto_memory.backend_name(), "memory");

        let auto_file = open_storage(&StorageConfig {
            backend: StorageBackendType::Auto,
            dir: Some(dir.path().to_path_buf()),
        })
        .await
        .unwrap();
        assert_eq!(auto_file.backend_name(), "file");

        let forced = open_storage(&StorageConfig {
            backend: StorageBackendType::Memory,
            dir: Some(dir.path().to_path_buf()),
        })
        .await
        .unwrap();
        assert_eq!(forced.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_open_storage_file_requires_dir() {
        let result = open_storage(&StorageConfig {
            backend: StorageBackendType::File,
            dir: None,
        })
        .await;
        assert!(matches!(result, Err(ChatError::Config(_))));
    }

    #[tokio::test]
    async fn test_open_storage_auto_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let storage = open_storage(&StorageConfig {
            backend: StorageBackendType::Auto,
            dir: Some(blocker.join("store")),
        })
        .await
        .unwrap();
        assert_eq!(storage.backend_name(), "memory");
    }

    // ─── MemoryVectorStore Tests ─────────────────────────────

    #[tokio::test]
    async fn test_vector_store_ranks_by_overlap() {
        let store = MemoryVectorStore::new();
        store.upsert("s1", "Shipping is free for orders over fifty dollars.").await.unwrap();
        store.upsert("s1", "Refunds are processed within five days.").await.unwrap();
        store.upsert("s1", "Free shipping does not apply to refunds.").await.unwrap();

        let found = store.query("s1", "free shipping", 5).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.score == 1.0));

        let found = store.query("s1", "refunds days", 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].snippet.starts_with("Refunds"));
    }

    #[tokio::test]
    async fn test_vector_store_namespaces_are_isolated() {
        let store = MemoryVectorStore::new();
        store.upsert("s1", "alpha beta").await.unwrap();
        store.upsert("s1", "alpha beta").await.unwrap();
        assert_eq!(store.len("s1"), 1);

        assert!(store.query("s2", "alpha", 5).await.unwrap().is_empty());
        store.delete_namespace("s1").await.unwrap();
        assert!(store.query("s1", "alpha", 5).await.unwrap().is_empty());
        assert_eq!(store.len("s1"), 0);
    }

    #[tokio::test]
    async fn test_vector_store_empty_query() {
        let store = MemoryVectorStore::new();
        store.upsert("s1", "alpha").await.unwrap();
        assert!(store.query("s1", "  ?! ", 5).await.unwrap().is_empty());
        assert!(store.query("s1", "alpha", 0).await.unwrap().is_empty());
    }
}
