//! Top-level transfer entry point

use crate::error::{Error, Result};
use crate::operator::{ObjectFactory, Operator};
use crate::profile::Profile;
use crate::stats::Stats;
use crate::transfer::queue::Queue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs one transfer: bucket verification, queue construction, bounded
/// execution, merged stats.
pub struct Handler {
    profile: Profile,
    operator: Arc<dyn Operator>,
    factory: Arc<dyn ObjectFactory>,
}

impl Handler {
    /// Build a handler, validating the profile up front. Configuration
    /// problems are fatal before any transfer starts.
    pub fn new(
        profile: Profile,
        operator: Arc<dyn Operator>,
        factory: Arc<dyn ObjectFactory>,
    ) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            operator,
            factory,
        })
    }

    /// Verify the destination bucket, creating it when the profile asks
    /// for that and the backend supports it. Failure here is fatal to
    /// the whole run; no jobs are attempted.
    pub async fn init(&self) -> Result<()> {
        let bucket = &self.profile.bucket.name;
        let exists = self
            .operator
            .bucket_exists()
            .await
            .map_err(|err| Error::BucketUnavailable(format!("{bucket}: {err}")))?;
        if exists {
            debug!(bucket = %bucket, "bucket verified");
            return Ok(());
        }
        if !self.profile.bucket.create {
            return Err(Error::BucketUnavailable(format!(
                "{bucket} does not exist and the profile does not allow creating it"
            )));
        }
        if !self.operator.support().bucket_create {
            return Err(Error::BucketUnavailable(format!(
                "{bucket} does not exist and this backend cannot create buckets"
            )));
        }
        info!(bucket = %bucket, "creating bucket");
        self.operator
            .bucket_create()
            .await
            .map_err(|err| Error::BucketUnavailable(format!("{bucket}: {err}")))
    }

    /// Run the whole transfer and return the merged counters.
    pub async fn run(&self, cancel: CancellationToken) -> Result<Stats> {
        self.init().await?;

        let queue = Queue::build(&self.profile, self.operator.clone(), self.factory.clone());
        if queue.is_empty() {
            warn!("no transferable roots found");
        }

        let stats = queue.start(cancel).await;
        info!("{}", stats.summary());
        Ok(stats)
    }
}
