//! Object storage sinks for the published call metric tables.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub const YANDEX_REGION: &str = "ru-central1";
pub const YANDEX_ENDPOINT: &str = "https://storage.yandexcloud.net";

pub const REGION_VAR: &str = "YC_REGION";
pub const ENDPOINT_VAR: &str = "YC_ENDPOINT_URL";
pub const ACCESS_KEY_VAR: &str = "YC_ACCESS_KEY";
pub const SECRET_KEY_VAR: &str = "YC_SECRET_KEY";

/// Connection settings for an S3-compatible object store, Yandex Object Storage by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub region: String,
    pub endpoint: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: YANDEX_REGION.to_string(),
            endpoint: YANDEX_ENDPOINT.to_string(),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

impl S3Config {
    /// Overlays the `YC_*` variables found by `lookup` on the defaults. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            region: var(REGION_VAR).unwrap_or(defaults.region),
            endpoint: var(ENDPOINT_VAR).unwrap_or(defaults.endpoint),
            access_key_id: var(ACCESS_KEY_VAR),
            secret_access_key: var(SECRET_KEY_VAR),
            force_path_style: defaults.force_path_style,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn validate(&self) -> Result<(), BucketError> {
        if self.region.is_empty() {
            return Err(BucketError::Configuration("region cannot be empty".into()));
        }
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err(BucketError::Configuration(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(BucketError::Configuration(format!(
                "{ACCESS_KEY_VAR} and {SECRET_KEY_VAR} must be set together"
            )));
        }
        Ok(())
    }

    fn credentials_provider(&self) -> Option<SharedCredentialsProvider> {
        let access_key = self.access_key_id.as_deref()?;
        let secret_key = self.secret_access_key.as_deref()?;
        Some(SharedCredentialsProvider::new(Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "callstats-static",
        )))
    }
}

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BucketError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

/// A sink that stores byte blobs under (bucket, key). Writing an existing key replaces it.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError>;
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
}

impl S3BucketStore {
    /// Builds a client against `config.endpoint`. Without static keys the SDK's default
    /// credential chain applies.
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        config.validate()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(provider) = config.credentials_provider() {
            loader = loader.credentials_provider(provider);
        }
        let shared_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .endpoint_url(config.endpoint.as_str())
            .force_path_style(config.force_path_style)
            .build();

        debug!(
            endpoint = %config.endpoint,
            region = %config.region,
            static_credentials = config.has_static_credentials(),
            "configured object storage client"
        );
        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError> {
        if bucket.is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }

        debug!(bucket, key, size = bytes.len(), "uploading object");
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(BucketError::from_sdk)?;
        Ok(())
    }
}

/// Stores objects as files under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, BucketError> {
        if bucket.is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }
        check_relative(bucket)?;
        check_relative(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

fn check_relative(segment: &str) -> Result<(), BucketError> {
    let path = Path::new(segment);
    let clean = !segment.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(BucketError::InvalidKey(segment.to_string()))
    }
}

#[async_trait]
impl BucketStore for LocalDirStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), BucketError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), size = bytes.len(), "writing object");
        tokio::fs::write(&path, &bytes).await?;
        Ok(())
    }
}
