use doc_archive::storage::{
    LocalDiskStorage, MockStorageService, StorageError, StorageService, stored_file_name,
};

#[cfg(test)]
mod disk_tests {
    use super::*;

    #[tokio::test]
    async fn ensure_ready_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("public").join("documents");
        let storage = LocalDiskStorage::new(&root);

        storage.ensure_ready().await.unwrap();

        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn store_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path());
        let name = stored_file_name("report.pdf");

        storage.store(&name, b"%PDF").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join(&name)).unwrap(), b"%PDF");

        assert!(storage.remove(&name).await.unwrap());
        assert!(!dir.path().join(&name).exists());
    }

    #[tokio::test]
    async fn removing_a_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path());

        assert!(!storage.remove("never-stored.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn path_traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path().join("uploads"));
        storage.ensure_ready().await.unwrap();

        let result = storage.store("../escape.txt", b"nope").await;

        assert!(matches!(result, Err(StorageError::InvalidName(_))));
        assert!(!dir.path().join("escape.txt").exists());
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_stored_files() {
        let mock = MockStorageService::new();

        mock.store("a.pdf", b"1234").await.unwrap();

        assert!(mock.contains("a.pdf"));
        assert!(mock.remove("a.pdf").await.unwrap());
        assert!(!mock.remove("a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn failing_mock_fails_everything() {
        let mock = MockStorageService::new_failing();

        assert!(mock.ensure_ready().await.is_err());
        assert!(mock.store("a.pdf", b"1").await.is_err());
        assert!(mock.remove("a.pdf").await.is_err());
    }

    #[tokio::test]
    async fn mock_clones_share_their_files() {
        let mock = MockStorageService::new();
        let clone = mock.clone();

        clone.store("shared.png", b"png").await.unwrap();

        assert_eq!(mock.stored_names(), vec!["shared.png".to_string()]);
    }
}
