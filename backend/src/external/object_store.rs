//! Object storage for receipts
//!
//! Services only ever keep the opaque key returned by [`ObjectStore::store`]
//! and resolve a temporary URL at read time. Storage sits outside the
//! database transaction, so callers pair every upload with [`compensate`] and
//! delete replaced objects with [`delete_quietly`] after commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

/// A file received from a client, not yet stored
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Check size and extension before anything is sent to storage
    pub fn validate(&self, max_bytes: usize) -> AppResult<()> {
        if self.bytes.is_empty() {
            return Err(AppError::validation("receipt", "Uploaded file is empty"));
        }
        if self.bytes.len() > max_bytes {
            return Err(AppError::validation(
                "receipt",
                format!("Uploaded file exceeds {} bytes", max_bytes),
            ));
        }
        shared::receipt_extension(&self.filename)
            .map(|_| ())
            .map_err(|msg| AppError::validation("receipt", msg))
    }

    /// Key under which this upload is stored: `{folder}/{safe_name}_{hex}.{ext}`
    pub fn object_key(&self, folder: &str) -> AppResult<String> {
        let name = shared::receipt_object_name(&self.filename, &Uuid::new_v4().simple().to_string())
            .map_err(|msg| AppError::validation("receipt", msg))?;
        Ok(format!("{}/{}", folder.trim_matches('/'), name))
    }
}

#[axum::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist an upload and return its opaque key
    async fn store(&self, upload: &Upload, folder: &str) -> AppResult<String>;

    /// Temporary URL through which the object can be fetched
    async fn url_for(&self, key: &str, ttl: Duration) -> AppResult<String>;

    /// Delete an object; a missing object counts as deleted
    async fn delete(&self, key: &str) -> AppResult<bool>;
}

/// Pass `result` through, deleting `uploaded` first when it is an error
pub async fn compensate<T>(
    store: &dyn ObjectStore,
    uploaded: Option<&str>,
    result: AppResult<T>,
) -> AppResult<T> {
    if result.is_err() {
        if let Some(key) = uploaded {
            tracing::info!(key, "Removing upload of failed operation");
            delete_quietly(store, key).await;
        }
    }
    result
}

/// Best-effort delete: failures are logged and swallowed
pub async fn delete_quietly(store: &dyn ObjectStore, key: &str) {
    match store.delete(key).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(key, "Object store did not delete object"),
        Err(e) => tracing::warn!(key, error = %e, "Failed to delete stored object"),
    }
}

/// Build the store described by the configuration
pub async fn from_config(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    if config.is_configured() {
        Arc::new(S3ObjectStore::from_config(config).await)
    } else {
        tracing::warn!("No storage bucket configured, receipts are kept in memory");
        Arc::new(MemoryObjectStore::default())
    }
}

// ============================================================================
// S3
// ============================================================================

/// Receipts in an S3 bucket, served through presigned GET URLs
#[derive(Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Client for the configured region. Static keys win over the default
    /// credential chain; a custom endpoint switches to path-style addressing.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.access_key_id.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "cdm-config",
            ));
        }
        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint).force_path_style(true);
        }
        Self::new(S3Client::from_conf(builder.build()), config.bucket.clone())
    }
}

#[axum::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AppResult<String> {
        let key = upload.object_key(folder)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&upload.content_type)
            .body(ByteStream::from(upload.bytes.clone()))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {}", DisplayErrorContext(e))))?;

        tracing::debug!(key = %key, bytes = upload.bytes.len(), "Stored object");
        Ok(key)
    }

    async fn url_for(&self, key: &str, ttl: Duration) -> AppResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| AppError::Internal(format!("Invalid presign lifetime: {}", e)))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("S3 presign failed: {}", DisplayErrorContext(e))))?;
        Ok(request.uri().to_string())
    }

    /// S3 answers a delete of a missing key with success
    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed: {}", DisplayErrorContext(e))))?;
        Ok(true)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Process-local store used when no bucket is configured, and in tests
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[axum::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, upload: &Upload, folder: &str) -> AppResult<String> {
        let key = upload.object_key(folder)?;
        self.objects
            .lock()
            .map_err(|_| AppError::Storage("memory store poisoned".into()))?
            .insert(
                key.clone(),
                StoredObject {
                    content_type: upload.content_type.clone(),
                    bytes: upload.bytes.clone(),
                },
            );
        Ok(key)
    }

    async fn url_for(&self, key: &str, ttl: Duration) -> AppResult<String> {
        Ok(format!("memory://{}?expires={}", key, ttl.as_secs()))
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.objects
            .lock()
            .map_err(|_| AppError::Storage("memory store poisoned".into()))?
            .remove(key);
        Ok(true)
    }
}
