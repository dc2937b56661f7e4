// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image uploads to Supabase Storage.
//!
//! Objects are named `{owner}/{uuid}.{ext}` so every upload gets a fresh,
//! publicly resolvable URL under the owner's prefix.

use async_trait::async_trait;
use axum::body::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

/// Storage failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Request(String),
}

/// A storage bucket and the extension assumed for uploads without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub name: &'static str,
    pub default_extension: &'static str,
}

impl Bucket {
    /// Vision and CLIP uploads.
    pub const HEALTH_IMAGES: Bucket = Bucket {
        name: "health-images",
        default_extension: "jpg",
    };
    pub const PNEUMONIA_IMAGES: Bucket = Bucket {
        name: "pneumonia_images",
        default_extension: "jpg",
    };
    pub const MNIST_IMAGES: Bucket = Bucket {
        name: "mnist_images",
        default_extension: "png",
    };
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// Blob store with public URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Supabase Storage over `{supabase_url}/storage/v1`.
pub struct SupabaseStorage {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(supabase_url: &str, service_role_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/storage/v1", supabase_url.trim_end_matches('/')),
            service_key: service_role_key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = format!("{}/object/{}/{}", self.base_url, bucket, path);

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "3600")
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(StorageError::Rejected(format!("HTTP {}: {}", status, message)))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, bucket, path)
    }
}

/// In-memory object store for tests and offline runs.
pub struct MemoryObjectStore {
    base_url: String,
    objects: DashMap<String, (String, Bytes)>,
}

impl MemoryObjectStore {
    /// `base_url` plays the role of the Supabase project URL in public URLs.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: format!("{}/storage/v1", base_url.trim_end_matches('/')),
            objects: DashMap::new(),
        }
    }

    /// Content type and bytes of a stored object.
    pub fn object(&self, bucket: &str, path: &str) -> Option<(String, Bytes)> {
        self.objects
            .get(&format!("{}/{}", bucket, path))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.insert(
            format!("{}/{}", bucket, path),
            (content_type.to_string(), data),
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, bucket, path)
    }
}

/// Lower-cased extension of `filename`, or the bucket default.
pub fn file_extension(filename: Option<&str>, bucket: Bucket) -> String {
    filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.trim())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(bucket.default_extension)
        .to_lowercase()
}

/// Fresh object path under the owner's prefix.
pub fn object_path(owner: &str, extension: &str) -> String {
    format!("{}/{}.{}", owner, Uuid::new_v4(), extension)
}

/// Image type for an extension; only `image/*` is accepted.
pub fn image_content_type(extension: &str) -> Result<String, StorageError> {
    mime_guess::from_ext(extension)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .ok_or_else(|| StorageError::UnsupportedType(extension.to_string()))
}

/// Upload front end used by the analyze routes.
#[derive(Clone)]
pub struct StorageService {
    store: std::sync::Arc<dyn ObjectStore>,
}

impl StorageService {
    pub fn new(store: std::sync::Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store an uploaded image for `owner` and return its public URL.
    pub async fn upload(
        &self,
        bucket: Bucket,
        owner: &str,
        filename: Option<&str>,
        data: Bytes,
    ) -> Result<StoredObject, StorageError> {
        let extension = file_extension(filename, bucket);
        let content_type = image_content_type(&extension)?;
        let path = object_path(owner, &extension);

        let bytes = data.len();
        self.store
            .put(bucket.name, &path, data, &content_type)
            .await?;

        tracing::info!(bucket = bucket.name, path = %path, bytes, "Image uploaded");
        Ok(StoredObject {
            url: self.store.public_url(bucket.name, &path),
            path,
        })
    }
}
