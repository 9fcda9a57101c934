//! # ferry-cloud
//!
//! Object-storage backends for ferry. This crate implements the core
//! `Operator` and `StoreObject` contracts over the `object_store`
//! crate, so the orchestration engine can target S3, Google Cloud
//! Storage, Azure Blob Storage, or a local directory through one
//! interface.
//!
//! ## Architecture
//!
//! The main pieces are:
//! - `BlobOperator`: one operator over any object_store backend
//! - `LocalOperator`: directory-rooted peer with full bucket control
//! - `BlobObject` / `BlobObjectFactory`: the per-job upload contract
//! - `MultipartCoordinator`: chunked, parallel, retryable, abortable
//!   uploads for large files

#![warn(missing_docs)]

mod error;
mod multipart;
mod object;
mod operator;

pub use multipart::{MultipartConfig, MultipartCoordinator};
pub use object::{checksum_sha256, BlobObject, BlobObjectFactory};
pub use operator::{BlobOperator, LocalOperator};

// Re-export commonly used types from object_store
pub use object_store::{path::Path as ObjectPath, ObjectMeta, ObjectStore};

use ferry_core::profile::{BucketConfig, Provider, TransferOptions};
use ferry_core::{Error, Operator, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Build the operator for a profile's bucket.
///
/// The provider field selects the backend; cloud builders read their
/// credentials from the environment, the way the underlying
/// object_store builders define it. The profile's `max_uploads` doubles
/// as the multipart coordinator's lane bound.
pub fn connect(
    bucket: &BucketConfig,
    options: &TransferOptions,
    cancel: CancellationToken,
) -> Result<Arc<dyn Operator>> {
    let multipart = MultipartConfig {
        max_parallel: options.max_uploads,
        ..Default::default()
    };

    match bucket.provider {
        Provider::File => Ok(Arc::new(
            LocalOperator::new(&bucket.name, options.overwrite)
                .with_multipart_config(multipart)
                .with_cancellation(cancel),
        )),

        #[cfg(feature = "aws")]
        Provider::S3 => {
            use object_store::aws::AmazonS3Builder;

            let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket.name);
            if let Some(region) = &bucket.region {
                builder = builder.with_region(region);
            }
            if let Some(endpoint) = &bucket.endpoint {
                builder = builder.with_endpoint(endpoint);
            }
            let store = builder
                .build()
                .map_err(|err| Error::ConfigInvalid(err.to_string()))?;
            Ok(Arc::new(
                BlobOperator::new(Arc::new(store), options.overwrite)
                    .with_multipart_config(multipart)
                    .with_tagging(true)
                    .with_cancellation(cancel),
            ))
        }
        #[cfg(not(feature = "aws"))]
        Provider::S3 => Err(Error::Unsupported(
            "ferry-cloud was built without the aws feature".to_string(),
        )),

        #[cfg(feature = "gcp")]
        Provider::Gcs => {
            use object_store::gcp::GoogleCloudStorageBuilder;

            let store = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(&bucket.name)
                .build()
                .map_err(|err| Error::ConfigInvalid(err.to_string()))?;
            Ok(Arc::new(
                BlobOperator::new(Arc::new(store), options.overwrite)
                    .with_multipart_config(multipart)
                    .with_cancellation(cancel),
            ))
        }
        #[cfg(not(feature = "gcp"))]
        Provider::Gcs => Err(Error::Unsupported(
            "ferry-cloud was built without the gcp feature".to_string(),
        )),

        #[cfg(feature = "azure")]
        Provider::Azure => {
            use object_store::azure::MicrosoftAzureBuilder;

            let store = MicrosoftAzureBuilder::from_env()
                .with_container_name(&bucket.name)
                .build()
                .map_err(|err| Error::ConfigInvalid(err.to_string()))?;
            Ok(Arc::new(
                BlobOperator::new(Arc::new(store), options.overwrite)
                    .with_multipart_config(multipart)
                    .with_tagging(true)
                    .with_cancellation(cancel),
            ))
        }
        #[cfg(not(feature = "azure"))]
        Provider::Azure => Err(Error::Unsupported(
            "ferry-cloud was built without the azure feature".to_string(),
        )),
    }
}
