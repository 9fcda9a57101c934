//! Ferry core - upload orchestration engine
//!
//! This library provides the queue/worker/job pipeline that transfers
//! local file trees to object-storage backends: destination key
//! derivation, per-job state machine, overwrite policy, bounded-
//! concurrency scheduling, and transfer statistics. Concrete backends
//! implement the [`Operator`] and [`StoreObject`] contracts.

pub mod error;
pub mod key;
pub mod operator;
pub mod profile;
pub mod stats;
pub mod transfer;
pub mod utils;
pub mod walker;

pub use error::{Error, Result};
pub use operator::{Capabilities, ObjectFactory, Operator, StoreObject};
pub use profile::{NamingMode, Overwrite, Profile, Provider};
pub use stats::Stats;
pub use transfer::{Handler, Job, JobStatus, Queue, SkipReason, Worker, WorkerScope};
