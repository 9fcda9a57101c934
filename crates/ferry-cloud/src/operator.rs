//! Operator implementations over object_store backends

use crate::error::{is_already_exists, is_not_found, upload_error};
use crate::multipart::{MultipartConfig, MultipartCoordinator};
use async_trait::async_trait;
use ferry_core::{Capabilities, Error, Job, Operator, Overwrite, Result, StoreObject};
use futures_util::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::multipart::MultipartStore;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions, TagSet};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Operator over any `object_store` backend.
///
/// Multipart support is advertised only when the concrete store also
/// implements [`MultipartStore`]; the generic constructors wire both
/// vtables from one store value. Tag writing is gated separately
/// because not every backend honors a tag set on put.
pub struct BlobOperator {
    store: Arc<dyn ObjectStore>,
    parts: Option<Arc<dyn MultipartStore>>,
    capabilities: Capabilities,
    multipart: MultipartConfig,
    overwrite: Overwrite,
    apply_tags: bool,
    cancel: CancellationToken,
}

impl BlobOperator {
    /// Build from a store that supports the multipart protocol
    pub fn new<S>(store: Arc<S>, overwrite: Overwrite) -> Self
    where
        S: ObjectStore + MultipartStore,
    {
        Self {
            parts: Some(store.clone() as Arc<dyn MultipartStore>),
            store,
            capabilities: Capabilities {
                object_delete: true,
                multipart: true,
                ..Default::default()
            },
            multipart: MultipartConfig::default(),
            overwrite,
            apply_tags: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Build from a store without multipart support; every upload is a
    /// single put
    pub fn without_multipart<S: ObjectStore>(store: Arc<S>, overwrite: Overwrite) -> Self {
        Self {
            store,
            parts: None,
            capabilities: Capabilities {
                object_delete: true,
                ..Default::default()
            },
            multipart: MultipartConfig::default(),
            overwrite,
            apply_tags: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the multipart parameters
    pub fn with_multipart_config(mut self, config: MultipartConfig) -> Self {
        self.multipart = config;
        self
    }

    /// Send the job's tag set with every simple put
    pub fn with_tagging(mut self, apply: bool) -> Self {
        self.apply_tags = apply;
        self
    }

    /// Observe a shared cancellation signal during multipart uploads
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn object_path(key: &str) -> Result<ObjectPath> {
        ObjectPath::parse(key)
            .map_err(|err| Error::UploadFailed(format!("invalid key {key}: {err}")))
    }

    fn tag_set(job: &Job) -> TagSet {
        let mut tags = TagSet::default();
        for (key, value) in &job.tags {
            tags.push(key, value);
        }
        tags
    }
}

#[async_trait]
impl Operator for BlobOperator {
    async fn bucket_create(&self) -> Result<()> {
        Err(Error::Unsupported(
            "this backend cannot create buckets".to_string(),
        ))
    }

    async fn bucket_exists(&self) -> Result<bool> {
        // A one-entry listing doubles as a cheap reachability probe; a
        // missing bucket surfaces as an error, not an empty stream.
        let mut listing = self.store.list(None);
        match listing.next().await {
            None | Some(Ok(_)) => Ok(true),
            Some(Err(err)) if is_not_found(&err) => Ok(false),
            Some(Err(err)) => Err(Error::BucketUnavailable(err.to_string())),
        }
    }

    async fn bucket_delete(&self) -> Result<()> {
        Err(Error::Unsupported(
            "this backend cannot delete buckets".to_string(),
        ))
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let path = Self::object_path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(upload_error(err)),
        }
    }

    async fn object_upload(&self, job: &Job, object: &mut dyn StoreObject) -> Result<()> {
        let path = Self::object_path(&job.key)?;

        if let Some(parts) = &self.parts {
            if job.size >= self.multipart.threshold {
                debug!(key = %job.key, size = job.size, "routing to multipart upload");
                let coordinator = MultipartCoordinator::new(parts.clone(), self.multipart.clone());
                return coordinator
                    .upload(&path, &job.source, job.size, &self.cancel)
                    .await;
            }
        }

        let file = object.source().ok_or_else(|| Error::SourceUnreadable {
            path: job.source.clone(),
            reason: "source was not opened".to_string(),
        })?;
        let mut data = Vec::with_capacity(job.size as usize);
        file.read_to_end(&mut data)
            .await
            .map_err(|err| Error::SourceUnreadable {
                path: job.source.clone(),
                reason: err.to_string(),
            })?;

        let mut opts = PutOptions::default();
        if self.overwrite == Overwrite::Never {
            // Catch writers that slipped in between the existence probe
            // and this put.
            opts.mode = PutMode::Create;
        }
        if self.apply_tags {
            opts.tags = Self::tag_set(job);
        }

        match self.store.put_opts(&path, data.into(), opts).await {
            Ok(_) => Ok(()),
            Err(err) if is_already_exists(&err) => Err(Error::ObjectExists(job.key.clone())),
            Err(err) => Err(upload_error(err)),
        }
    }

    async fn object_delete(&self, key: &str) -> Result<()> {
        let path = Self::object_path(key)?;
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(Error::UploadFailed(format!("delete {key}: {err}"))),
        }
    }

    async fn object_tags(&self, _key: &str) -> Result<BTreeMap<String, String>> {
        Err(Error::Unsupported(
            "object tags cannot be read back on this backend".to_string(),
        ))
    }

    fn support(&self) -> Capabilities {
        self.capabilities
    }
}

/// Directory-rooted operator: the bucket is a directory, objects are
/// files beneath it.
///
/// Carries the full bucket capability set and doubles as the end-to-end
/// test backend. Object operations delegate to a lazily-built
/// [`BlobOperator`] over [`LocalFileSystem`], created on first use so
/// the bucket directory can be created by `bucket_create` first.
pub struct LocalOperator {
    root: PathBuf,
    overwrite: Overwrite,
    multipart: MultipartConfig,
    cancel: CancellationToken,
    inner: OnceLock<BlobOperator>,
}

impl LocalOperator {
    /// Build an operator rooted at `root`
    pub fn new(root: impl Into<PathBuf>, overwrite: Overwrite) -> Self {
        Self {
            root: root.into(),
            overwrite,
            multipart: MultipartConfig::default(),
            cancel: CancellationToken::new(),
            inner: OnceLock::new(),
        }
    }

    /// Override the multipart parameters
    pub fn with_multipart_config(mut self, config: MultipartConfig) -> Self {
        self.multipart = config;
        self
    }

    /// Observe a shared cancellation signal during multipart uploads
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn blob(&self) -> Result<&BlobOperator> {
        if let Some(inner) = self.inner.get() {
            return Ok(inner);
        }
        let store = LocalFileSystem::new_with_prefix(&self.root)
            .map_err(|err| Error::BucketUnavailable(err.to_string()))?;
        let operator = BlobOperator::without_multipart(Arc::new(store), self.overwrite)
            .with_multipart_config(self.multipart.clone())
            .with_cancellation(self.cancel.clone());
        let _ = self.inner.set(operator);
        Ok(self.inner.get().expect("operator was just set"))
    }
}

#[async_trait]
impl Operator for LocalOperator {
    async fn bucket_create(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| Error::BucketUnavailable(format!("{}: {err}", self.root.display())))
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Ok(self.root.is_dir())
    }

    async fn bucket_delete(&self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.root)
            .await
            .map_err(|err| Error::BucketUnavailable(format!("{}: {err}", self.root.display())))
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        self.blob()?.object_exists(key).await
    }

    async fn object_upload(&self, job: &Job, object: &mut dyn StoreObject) -> Result<()> {
        self.blob()?.object_upload(job, object).await
    }

    async fn object_delete(&self, key: &str) -> Result<()> {
        self.blob()?.object_delete(key).await
    }

    async fn object_tags(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.blob()?.object_tags(key).await
    }

    fn support(&self) -> Capabilities {
        Capabilities {
            bucket_create: true,
            bucket_delete: true,
            object_delete: true,
            object_tags: false,
            multipart: true,
        }
    }
}
