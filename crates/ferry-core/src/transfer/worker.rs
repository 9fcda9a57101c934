//! Per-directory pipeline driver

use crate::error::Error;
use crate::operator::{ObjectFactory, Operator, StoreObject};
use crate::profile::{Overwrite, TransferOptions};
use crate::stats::Stats;
use crate::transfer::job::{Job, JobStatus, SkipReason};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What one worker is scoped to
#[derive(Debug, Clone)]
pub enum WorkerScope {
    /// Immediate files of one directory; subdirectories belong to
    /// sibling workers
    Directory {
        /// Directory whose files this worker transfers
        dir: PathBuf,
        /// Originally requested root, kept for key derivation
        search_root: PathBuf,
    },
    /// One standalone file
    File {
        /// The file to transfer
        path: PathBuf,
    },
}

/// Terminal outcome of one job's pipeline
enum Outcome {
    Done,
    Skipped(SkipReason),
    Failed(Error),
}

/// Drives the job pipeline for one directory or one standalone file.
///
/// Jobs run through the pipeline one at a time; parallelism comes from
/// running many workers concurrently, not from within a worker.
pub struct Worker {
    scope: WorkerScope,
    operator: Arc<dyn Operator>,
    factory: Arc<dyn ObjectFactory>,
    options: TransferOptions,
    stats: Stats,
}

impl Worker {
    /// Build a worker for one scope
    pub fn new(
        scope: WorkerScope,
        operator: Arc<dyn Operator>,
        factory: Arc<dyn ObjectFactory>,
        options: TransferOptions,
    ) -> Self {
        Self {
            scope,
            operator,
            factory,
            options,
            stats: Stats::default(),
        }
    }

    /// This worker's scope
    pub fn scope(&self) -> &WorkerScope {
        &self.scope
    }

    /// Run every job in this worker's scope through the pipeline and
    /// return the accumulated counters.
    pub async fn scan(mut self, cancel: CancellationToken) -> Stats {
        match self.scope.clone() {
            WorkerScope::Directory { dir, search_root } => {
                self.scan_directory(&dir, &search_root, &cancel).await;
            }
            WorkerScope::File { path } => {
                if !cancel.is_cancelled() {
                    match self.build_file_job(&path).await {
                        Ok(job) => self.run_job(job).await,
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "cannot stat file");
                            self.stats.record_failed();
                        }
                    }
                }
            }
        }
        self.stats
    }

    async fn scan_directory(&mut self, dir: &Path, search_root: &Path, cancel: &CancellationToken) {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(dir = %dir.display(), error = %err, "cannot list directory");
                return;
            }
        };

        loop {
            if cancel.is_cancelled() {
                debug!(dir = %dir.display(), "cancelled, abandoning remaining entries");
                return;
            }
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => return,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            match self.build_dir_job(&path, dir, search_root).await {
                Ok(Some(job)) => self.run_job(job).await,
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot stat entry");
                    self.stats.record_failed();
                }
            }
        }
    }

    /// Build a job for one directory entry. Subdirectories are handled
    /// by sibling workers and yield `None`; everything else becomes a
    /// job and the pipeline's mode check decides whether it transfers.
    async fn build_dir_job(
        &self,
        path: &Path,
        dir: &Path,
        search_root: &Path,
    ) -> std::io::Result<Option<Job>> {
        let meta = if self.options.follow_symlinks {
            tokio::fs::metadata(path).await?
        } else {
            tokio::fs::symlink_metadata(path).await?
        };
        if meta.is_dir() {
            return Ok(None);
        }
        Ok(Some(Job::new(
            path.to_path_buf(),
            dir.to_path_buf(),
            Some(search_root.to_path_buf()),
            meta.len(),
            meta.is_file(),
        )))
    }

    async fn build_file_job(&self, path: &Path) -> std::io::Result<Job> {
        let meta = tokio::fs::metadata(path).await?;
        let origin_dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        Ok(Job::new(
            path.to_path_buf(),
            origin_dir,
            None,
            meta.len(),
            meta.is_file(),
        ))
    }

    /// Drive one job to a terminal status and record it.
    async fn run_job(&mut self, mut job: Job) {
        job.transition(JobStatus::Waiting);
        let mut object = self.factory.build();

        let outcome = self.pipeline(&mut job, object.as_mut()).await;
        match outcome {
            Outcome::Done => {
                job.transition(JobStatus::Done);
                if let Err(err) = object.post(&job).await {
                    warn!(key = %job.key, error = %err, "post hook failed");
                }
                self.stats.record_uploaded(job.size);
                info!(source = %job.source.display(), key = %job.key, "uploaded");
            }
            Outcome::Skipped(reason) => {
                job.transition(JobStatus::Skipped);
                self.stats.record_skipped(job.size);
                debug!(source = %job.source.display(), key = %job.key, %reason, "skipped");
            }
            Outcome::Failed(err) => {
                job.transition(JobStatus::Failed);
                self.stats.record_failed();
                error!(source = %job.source.display(), error = %err, "job failed");
            }
        }

        // Cleanup runs on every exit path.
        if let Err(err) = object.destroy().await {
            warn!(source = %job.source.display(), error = %err, "cleanup failed");
        }
    }

    /// The per-job stage sequence. An error in any stage fails only
    /// this job.
    async fn pipeline(&self, job: &mut Job, object: &mut dyn StoreObject) -> Outcome {
        if let Err(err) = object.generate(job).await {
            return Outcome::Failed(err);
        }

        if !job.is_regular {
            return Outcome::Skipped(SkipReason::NotRegularFile);
        }

        if self.options.overwrite == Overwrite::Never {
            match self.operator.object_exists(&job.key).await {
                Ok(true) => return Outcome::Skipped(SkipReason::AlreadyExists),
                Ok(false) => {}
                Err(err) => return Outcome::Failed(err),
            }
        }

        if let Err(err) = object.pre(job).await {
            return Outcome::Failed(err);
        }

        match self.operator.object_upload(job, object).await {
            Ok(()) => Outcome::Done,
            // A concurrent writer beat us to the key after the probe.
            Err(Error::ObjectExists(_)) if self.options.overwrite == Overwrite::Never => {
                Outcome::Skipped(SkipReason::AlreadyExists)
            }
            Err(err) => Outcome::Failed(err),
        }
    }
}
