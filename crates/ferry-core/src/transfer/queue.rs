//! Root expansion and bounded-concurrency scheduling

use crate::operator::{ObjectFactory, Operator};
use crate::profile::Profile;
use crate::stats::Stats;
use crate::transfer::worker::{Worker, WorkerScope};
use crate::walker;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Expands input roots into workers and runs them under a concurrency
/// bound.
pub struct Queue {
    workers: Vec<Worker>,
    max_uploads: usize,
}

impl Queue {
    /// Expand the profile's root paths into workers.
    ///
    /// Each directory root becomes one worker per discovered directory;
    /// each standalone file becomes its own worker. Roots that cannot
    /// be walked are logged and dropped; per-file problems only surface
    /// later, when the owning worker scans.
    pub fn build(
        profile: &Profile,
        operator: Arc<dyn Operator>,
        factory: Arc<dyn ObjectFactory>,
    ) -> Queue {
        let options = &profile.options;
        let mut workers = Vec::new();

        let roots: BTreeSet<_> = profile.inputs.directories.iter().collect();
        for root in roots {
            match walker::discover_dirs(root, options.walk_dirs, options.follow_symlinks) {
                Ok(dirs) => {
                    for dir in dirs {
                        workers.push(Worker::new(
                            WorkerScope::Directory {
                                dir,
                                search_root: root.clone(),
                            },
                            operator.clone(),
                            factory.clone(),
                            options.clone(),
                        ));
                    }
                }
                Err(err) => {
                    warn!(root = %root.display(), error = %err, "cannot walk root, skipping");
                }
            }
        }

        let files: BTreeSet<_> = profile.inputs.files.iter().collect();
        for file in files {
            workers.push(Worker::new(
                WorkerScope::File { path: file.clone() },
                operator.clone(),
                factory.clone(),
                options.clone(),
            ));
        }

        debug!(workers = workers.len(), "queue built");
        Queue {
            workers,
            max_uploads: options.max_uploads,
        }
    }

    /// Number of workers in the queue
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the queue holds no workers
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Run every worker under the concurrency bound, wait for all of
    /// them, and merge their counters.
    ///
    /// Per-worker stats travel back through task results; nothing is
    /// shared between running workers except the semaphore.
    pub async fn start(self, cancel: CancellationToken) -> Stats {
        let semaphore = Arc::new(Semaphore::new(self.max_uploads.max(1)));
        let mut tasks = JoinSet::new();

        for worker in self.workers {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                // The semaphore is never closed while tasks run.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                worker.scan(cancel).await
            });
        }

        let mut stats = Stats::default();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(worker_stats) => stats.merge(&worker_stats),
                Err(err) => warn!(error = %err, "worker task aborted"),
            }
        }
        stats
    }
}
