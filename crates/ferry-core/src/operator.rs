//! Backend contracts
//!
//! The engine never talks to a storage backend directly; it drives the
//! `Operator` and `StoreObject` traits. Each backend implements both as
//! a peer of the others, and `Operator::support` replaces runtime type
//! checks: callers ask what a backend can do instead of asking what it
//! is.

use crate::transfer::Job;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::fs::File;

/// What one backend can do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Buckets can be created
    pub bucket_create: bool,
    /// Buckets can be deleted
    pub bucket_delete: bool,
    /// Objects can be deleted
    pub object_delete: bool,
    /// Object tags can be read back
    pub object_tags: bool,
    /// Large uploads can use the multipart protocol
    pub multipart: bool,
}

/// Bucket and object operations for one storage backend
#[async_trait]
pub trait Operator: Send + Sync {
    /// Create the destination bucket
    async fn bucket_create(&self) -> Result<()>;

    /// Check whether the destination bucket is reachable
    async fn bucket_exists(&self) -> Result<bool>;

    /// Delete the destination bucket
    async fn bucket_delete(&self) -> Result<()>;

    /// Check whether an object occupies `key`
    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// Upload one job's source, routing internally to the multipart
    /// protocol when the backend supports it and the file is large
    /// enough
    async fn object_upload(&self, job: &Job, object: &mut dyn StoreObject) -> Result<()>;

    /// Delete the object at `key`
    async fn object_delete(&self, key: &str) -> Result<()>;

    /// Read back the tags stored on the object at `key`
    async fn object_tags(&self, key: &str) -> Result<BTreeMap<String, String>>;

    /// Capability set of this backend
    fn support(&self) -> Capabilities;
}

/// Per-job upload contract
///
/// One instance is built per job and dropped when the job reaches a
/// terminal state. `destroy` runs on every exit path, so it must be
/// idempotent.
#[async_trait]
pub trait StoreObject: Send {
    /// Compute and attach the destination key and tag set
    async fn generate(&mut self, job: &mut Job) -> Result<()>;

    /// Re-validate the source and open it
    async fn pre(&mut self, job: &mut Job) -> Result<()>;

    /// Handle opened by `pre`, consumed by the operator's upload
    fn source(&mut self) -> Option<&mut File>;

    /// Runs after a successful upload
    async fn post(&mut self, job: &Job) -> Result<()>;

    /// Always-run cleanup
    async fn destroy(&mut self) -> Result<()>;
}

/// Builds one [`StoreObject`] per job
pub trait ObjectFactory: Send + Sync {
    /// Construct a fresh object for the next job
    fn build(&self) -> Box<dyn StoreObject>;
}
