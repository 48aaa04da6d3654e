use batchstore::config::{load_config, BufferType, ConfigError};
use batchstore::store::{build_object_store, BackendConfig, BatchStore, ObjectStoreClient};
use batchstore::{BufferKind, Compression};
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[test]
fn test_local_store_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    let root = temp_dir.path().join("objects");
    let spool = temp_dir.path().join("spool");

    let config_yaml = format!(
        r#"
store:
  type: local
  root: {}
batch:
  buffer: file
  temp_dir: {}
  multipart_threshold: 8MiB
metadata:
  compression: none
tags:
  env: test
"#,
        root.display(),
        spool.display()
    );
    fs::write(&config_path, config_yaml).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.store, BackendConfig::Local { root: root.clone() });
    assert_eq!(config.batch.buffer, BufferType::File);

    let options = config.client_options();
    assert_eq!(options.buffer, BufferKind::File { dir: Some(spool) });
    assert_eq!(options.multipart_threshold, 8 * 1024 * 1024);
    assert_eq!(options.codec.compression(), Compression::None);
}

#[test]
fn test_env_var_in_bucket() {
    std::env::set_var("BATCHSTORE_IT_BUCKET", "it-bucket");
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        "store:\n  type: s3\n  bucket: $env{BATCHSTORE_IT_BUCKET}\n  region: us-east-1\n",
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    match config.store {
        BackendConfig::S3 { bucket, region, .. } => {
            assert_eq!(bucket, "it-bucket");
            assert_eq!(region.as_deref(), Some("us-east-1"));
        }
        other => panic!("unexpected backend: {other:?}"),
    }
    std::env::remove_var("BATCHSTORE_IT_BUCKET");
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_config(&temp_dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(err.to_string().contains("absent.yml"));
}

#[test]
fn test_unknown_store_type() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, "store:\n  type: ftp\n").unwrap();

    assert!(load_config(&config_path).is_err());
}

#[tokio::test]
async fn test_round_trip_through_local_store() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        format!(
            "store:\n  type: local\n  root: {}\nbatch:\n  temp_dir: {}\n",
            temp_dir.path().join("objects").display(),
            temp_dir.path().join("spool").display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    fs::create_dir_all(temp_dir.path().join("spool")).unwrap();
    let store = build_object_store(&config.store).unwrap();
    let client = ObjectStoreClient::<String>::with_options(store, config.client_options());
    let cancel = CancellationToken::new();

    let mut batch = client.new_batch(config.tags.clone()).unwrap();
    let record = batch.append("greeting".to_string(), b"hello, disk").unwrap();
    client.upload(&mut batch, true, &cancel).await.unwrap();
    batch.close().unwrap();

    let data_file = temp_dir.path().join("objects").join(batch.name().as_str());
    assert_eq!(fs::read(data_file).unwrap(), b"hello, disk");
    assert_eq!(&client.fetch(&record, &cancel).await.unwrap()[..], b"hello, disk");

    let index = client.fetch_index(batch.name(), &cancel).await.unwrap();
    assert_eq!(index["greeting"], record);
}
