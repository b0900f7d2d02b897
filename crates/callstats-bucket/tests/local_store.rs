use bytes::Bytes;
use callstats_bucket::{BucketError, BucketStore, LocalDirStore};
use uuid::Uuid;

fn scratch_root() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("callstats-bucket-{}", Uuid::new_v4()))
}

#[tokio::test]
async fn put_object_writes_under_bucket_directory() -> Result<(), BucketError> {
    let root = scratch_root();
    let store = LocalDirStore::new(&root);

    store
        .put_object("reports", "call_by_type.csv", Bytes::from_static(b"a,b\n"), "text/csv")
        .await?;

    let written = std::fs::read(root.join("reports").join("call_by_type.csv"))?;
    assert_eq!(written, b"a,b\n");

    std::fs::remove_dir_all(&root)?;
    Ok(())
}

#[tokio::test]
async fn put_object_replaces_existing_key() -> Result<(), BucketError> {
    let root = scratch_root();
    let store = LocalDirStore::new(&root);

    store
        .put_object("reports", "nested/table.csv", Bytes::from_static(b"old"), "text/csv")
        .await?;
    store
        .put_object("reports", "nested/table.csv", Bytes::from_static(b"new"), "text/csv")
        .await?;

    let written = std::fs::read(root.join("reports/nested/table.csv"))?;
    assert_eq!(written, b"new");

    std::fs::remove_dir_all(&root)?;
    Ok(())
}

#[tokio::test]
async fn rejects_keys_escaping_the_root() {
    let store = LocalDirStore::new(scratch_root());

    let err = store
        .put_object("reports", "../outside.csv", Bytes::new(), "text/csv")
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::InvalidKey(_)));

    let err = store
        .put_object("", "table.csv", Bytes::new(), "text/csv")
        .await
        .unwrap_err();
    assert!(matches!(err, BucketError::Configuration(_)));
}
