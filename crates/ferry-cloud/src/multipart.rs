//! Multipart upload coordinator
//!
//! Splits one large source into fixed-size parts, uploads them across a
//! bounded set of lanes, retries failed parts, and completes or aborts
//! the whole session. Part indices are 1-based internally; the
//! finalize call always lists parts in ascending index order, whatever
//! order the lanes finished in.

use crate::error::upload_error;
use bytes::Bytes;
use ferry_core::{Error, Result};
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path as ObjectPath;
use object_store::MultipartId;
use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Parameters of the multipart protocol
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Files at or above this size take the multipart path
    pub threshold: u64,
    /// Size of each uploaded part; the final part may be shorter
    pub part_size: u64,
    /// Upper bound on concurrently uploading lanes
    pub max_parallel: usize,
    /// Attempts per part before the whole session is abandoned
    pub retry_limit: u32,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            threshold: 10 * 1024 * 1024,
            part_size: 10 * 1024 * 1024,
            max_parallel: 4,
            retry_limit: 5,
        }
    }
}

/// One completed part: 1-based index, backend identifier, content hash
#[derive(Debug, Clone)]
struct PartRecord {
    index: u64,
    id: PartId,
    checksum: String,
}

/// Everything one lane needs to upload its share of the parts
struct Lane {
    store: Arc<dyn MultipartStore>,
    location: ObjectPath,
    upload_id: MultipartId,
    source: PathBuf,
    indices: Vec<u64>,
    size: u64,
    config: MultipartConfig,
    cancel: CancellationToken,
}

/// Coordinates one multipart session per large job
pub struct MultipartCoordinator {
    store: Arc<dyn MultipartStore>,
    config: MultipartConfig,
}

impl MultipartCoordinator {
    /// Build a coordinator over a multipart-capable store
    pub fn new(store: Arc<dyn MultipartStore>, config: MultipartConfig) -> Self {
        Self { store, config }
    }

    /// Upload `source` (of `size` bytes) to `location` in parts.
    ///
    /// The first part that exhausts its retry budget cancels every
    /// sibling lane and aborts the session; the caller's job fails with
    /// that part's error.
    pub async fn upload(
        &self,
        location: &ObjectPath,
        source: &Path,
        size: u64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let part_size = self.config.part_size.max(1);
        let total_parts = size.div_ceil(part_size).max(1);
        let lanes = (self.config.max_parallel.max(1) as u64).min(total_parts);

        let upload_id = self
            .store
            .create_multipart(location)
            .await
            .map_err(upload_error)?;
        debug!(
            location = %location,
            parts = total_parts,
            lanes,
            "multipart session started"
        );

        // One irrecoverable part failure stops every sibling lane.
        let cancel = cancel.child_token();
        let mut tasks: JoinSet<Result<Vec<PartRecord>>> = JoinSet::new();
        for lane in 0..lanes {
            let indices: Vec<u64> = (1..=total_parts)
                .filter(|index| (index - 1) % lanes == lane)
                .collect();
            tasks.spawn(run_lane(Lane {
                store: self.store.clone(),
                location: location.clone(),
                upload_id: upload_id.clone(),
                source: source.to_path_buf(),
                indices,
                size,
                config: self.config.clone(),
                cancel: cancel.clone(),
            }));
        }

        let mut records = Vec::with_capacity(total_parts as usize);
        let mut failure: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(mut lane_records)) => records.append(&mut lane_records),
                Ok(Err(err)) => {
                    cancel.cancel();
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    cancel.cancel();
                    failure.get_or_insert(Error::UploadFailed(format!("lane task failed: {err}")));
                }
            }
        }

        if let Some(err) = failure {
            self.abort(location, &upload_id).await;
            return Err(err);
        }

        records.sort_by_key(|record| record.index);
        // Completion order is not upload order; the finalize call must
        // list parts 1..=n with no gaps.
        let contiguous = records.len() as u64 == total_parts
            && records
                .iter()
                .enumerate()
                .all(|(i, record)| record.index == i as u64 + 1);
        if !contiguous {
            self.abort(location, &upload_id).await;
            return Err(Error::UploadFailed(format!(
                "multipart part accounting mismatch: {} of {total_parts} parts recorded",
                records.len()
            )));
        }

        for record in &records {
            trace!(part = record.index, checksum = %record.checksum, "part complete");
        }
        let parts: Vec<PartId> = records.into_iter().map(|record| record.id).collect();
        self.store
            .complete_multipart(location, &upload_id, parts)
            .await
            .map_err(upload_error)?;
        debug!(location = %location, "multipart session completed");
        Ok(())
    }

    async fn abort(&self, location: &ObjectPath, upload_id: &MultipartId) {
        if let Err(err) = self.store.abort_multipart(location, upload_id).await {
            let abort_err = Error::AbortFailed(err.to_string());
            warn!(location = %location, error = %abort_err, "could not abort multipart session");
        }
    }
}

/// Upload one lane's parts sequentially, reading each from a private
/// handle so lanes never contend on a shared cursor.
async fn run_lane(lane: Lane) -> Result<Vec<PartRecord>> {
    let mut file = File::open(&lane.source).await.map_err(|err| {
        Error::SourceUnreadable {
            path: lane.source.clone(),
            reason: err.to_string(),
        }
    })?;

    let mut records = Vec::with_capacity(lane.indices.len());
    for &index in &lane.indices {
        if lane.cancel.is_cancelled() {
            return Err(Error::UploadFailed("multipart upload cancelled".to_string()));
        }

        let offset = (index - 1) * lane.config.part_size;
        let len = lane.config.part_size.min(lane.size - offset) as usize;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|err| source_error(&lane.source, err))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .await
            .map_err(|err| source_error(&lane.source, err))?;

        let data = Bytes::from(buf);
        let checksum = hex::encode(Sha256::digest(&data));
        let id = put_part_with_retry(&lane, index, data).await?;
        records.push(PartRecord {
            index,
            id,
            checksum,
        });
    }
    Ok(records)
}

async fn put_part_with_retry(lane: &Lane, index: u64, data: Bytes) -> Result<PartId> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let put = lane
            .store
            .put_part(&lane.location, &lane.upload_id, (index - 1) as usize, data.clone().into());
        tokio::select! {
            _ = lane.cancel.cancelled() => {
                return Err(Error::UploadFailed("multipart upload cancelled".to_string()));
            }
            result = put => match result {
                Ok(id) => return Ok(id),
                Err(err) if attempt < lane.config.retry_limit => {
                    warn!(part = index, attempt, error = %err, "part upload failed, retrying");
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                }
                Err(err) => {
                    return Err(Error::PartUploadFailed {
                        part: index,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

fn source_error(path: &Path, err: std::io::Error) -> Error {
    Error::SourceUnreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
