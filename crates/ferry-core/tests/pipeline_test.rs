//! Integration tests for the queue/worker/job pipeline
//!
//! These tests drive the engine against a mock operator so outcomes can
//! be forced per destination key.

use async_trait::async_trait;
use ferry_core::profile::{
    BucketConfig, InputConfig, NamingConfig, Profile, Provider, TagOptions, TransferOptions,
};
use ferry_core::{
    key, Capabilities, Error, Handler, Job, ObjectFactory, Operator, Overwrite, Queue, Result,
    StoreObject,
};
use ferry_testing::{fixtures, TestDir};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;

struct MockOperator {
    bucket_present: AtomicBool,
    bucket_created: AtomicBool,
    existing: Mutex<HashSet<String>>,
    uploaded: Mutex<BTreeMap<String, u64>>,
    tags: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    fail_keys: HashSet<String>,
    upload_delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Default for MockOperator {
    fn default() -> Self {
        Self {
            bucket_present: AtomicBool::new(true),
            bucket_created: AtomicBool::new(false),
            existing: Mutex::new(HashSet::new()),
            uploaded: Mutex::new(BTreeMap::new()),
            tags: Mutex::new(BTreeMap::new()),
            fail_keys: HashSet::new(),
            upload_delay: None,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

impl MockOperator {
    fn uploaded_keys(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Operator for MockOperator {
    async fn bucket_create(&self) -> Result<()> {
        self.bucket_created.store(true, Ordering::SeqCst);
        self.bucket_present.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Ok(self.bucket_present.load(Ordering::SeqCst))
    }

    async fn bucket_delete(&self) -> Result<()> {
        self.bucket_present.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.existing.lock().unwrap().contains(key))
    }

    async fn object_upload(&self, job: &Job, _object: &mut dyn StoreObject) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_keys.contains(&job.key) {
            Err(Error::UploadFailed(format!("forced failure for {}", job.key)))
        } else {
            self.existing.lock().unwrap().insert(job.key.clone());
            self.uploaded.lock().unwrap().insert(job.key.clone(), job.size);
            self.tags.lock().unwrap().insert(job.key.clone(), job.tags.clone());
            Ok(())
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn object_delete(&self, key: &str) -> Result<()> {
        self.existing.lock().unwrap().remove(key);
        self.uploaded.lock().unwrap().remove(key);
        Ok(())
    }

    async fn object_tags(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.tags
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UploadFailed(format!("no such object: {key}")))
    }

    fn support(&self) -> Capabilities {
        Capabilities {
            bucket_create: true,
            bucket_delete: true,
            object_delete: true,
            object_tags: true,
            multipart: false,
        }
    }
}

struct MockObject {
    naming: NamingConfig,
    file: Option<File>,
}

#[async_trait]
impl StoreObject for MockObject {
    async fn generate(&mut self, job: &mut Job) -> Result<()> {
        let name = job.source.file_name().unwrap().to_str().unwrap();
        job.key = key::derive(name, &job.origin_dir, job.search_root.as_deref(), &self.naming);
        job.tags
            .insert("origin".to_string(), job.source.display().to_string());
        Ok(())
    }

    async fn pre(&mut self, job: &mut Job) -> Result<()> {
        let file = File::open(&job.source)
            .await
            .map_err(|err| Error::SourceUnreadable {
                path: job.source.clone(),
                reason: err.to_string(),
            })?;
        self.file = Some(file);
        Ok(())
    }

    fn source(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    async fn post(&mut self, _job: &Job) -> Result<()> {
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        self.file.take();
        Ok(())
    }
}

struct MockFactory {
    naming: NamingConfig,
}

impl MockFactory {
    fn relative_to_root() -> Arc<Self> {
        Arc::new(Self {
            naming: NamingConfig {
                omit_root_dir: true,
                ..Default::default()
            },
        })
    }
}

impl ObjectFactory for MockFactory {
    fn build(&self) -> Box<dyn StoreObject> {
        Box::new(MockObject {
            naming: self.naming.clone(),
            file: None,
        })
    }
}

fn profile(directories: Vec<PathBuf>, files: Vec<PathBuf>) -> Profile {
    Profile {
        bucket: BucketConfig {
            name: "mock-bucket".to_string(),
            region: None,
            create: false,
            provider: Provider::File,
            endpoint: None,
        },
        options: TransferOptions::default(),
        naming: NamingConfig::default(),
        tagging: TagOptions::default(),
        tags: BTreeMap::new(),
        inputs: InputConfig {
            files,
            directories,
            skip: Vec::new(),
        },
    }
}

#[tokio::test]
async fn test_directory_tree_uploads_every_file() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_transfer_tree(&test_dir).unwrap();
    let operator = Arc::new(MockOperator::default());

    let profile = profile(vec![test_dir.path().to_path_buf()], Vec::new());
    let queue = Queue::build(&profile, operator.clone(), MockFactory::relative_to_root());
    // One worker per directory: root, nested, nested/deep.
    assert_eq!(queue.len(), 3);

    let stats = queue.start(CancellationToken::new()).await;
    assert_eq!(stats.objects, 4);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.object_bytes, fixtures::transfer_tree_total_bytes());
    assert_eq!(stats.total(), 4);

    let mut keys = operator.uploaded_keys();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "alpha.txt".to_string(),
            "beta.log".to_string(),
            "nested/deep/delta.bin".to_string(),
            "nested/gamma.txt".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_walk_dirs_off_transfers_only_root_files() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_transfer_tree(&test_dir).unwrap();
    let operator = Arc::new(MockOperator::default());

    let mut profile = profile(vec![test_dir.path().to_path_buf()], Vec::new());
    profile.options.walk_dirs = false;
    let queue = Queue::build(&profile, operator.clone(), MockFactory::relative_to_root());
    assert_eq!(queue.len(), 1);

    let stats = queue.start(CancellationToken::new()).await;
    assert_eq!(stats.objects, 2);

    let mut keys = operator.uploaded_keys();
    keys.sort();
    assert_eq!(keys, vec!["alpha.txt".to_string(), "beta.log".to_string()]);
}

#[tokio::test]
async fn test_bounded_concurrency_never_exceeds_max_uploads() {
    let test_dir = TestDir::new().unwrap();
    let mut files = Vec::new();
    for i in 0..8 {
        files.push(
            test_dir
                .create_file(&format!("file-{i}.dat"), b"payload")
                .unwrap(),
        );
    }

    let operator = Arc::new(MockOperator {
        upload_delay: Some(Duration::from_millis(50)),
        ..Default::default()
    });

    let mut profile = profile(Vec::new(), files);
    profile.options.max_uploads = 3;
    let queue = Queue::build(&profile, operator.clone(), MockFactory::relative_to_root());
    assert_eq!(queue.len(), 8);

    let stats = queue.start(CancellationToken::new()).await;
    assert_eq!(stats.objects, 8);
    assert!(
        operator.max_active.load(Ordering::SeqCst) <= 3,
        "active workers exceeded the configured bound"
    );
}

#[tokio::test]
async fn test_second_run_skips_every_object() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_transfer_tree(&test_dir).unwrap();
    let operator = Arc::new(MockOperator::default());
    let factory = MockFactory::relative_to_root();

    let profile = profile(vec![test_dir.path().to_path_buf()], Vec::new());

    let first = Queue::build(&profile, operator.clone(), factory.clone())
        .start(CancellationToken::new())
        .await;
    assert_eq!(first.objects, 4);

    let second = Queue::build(&profile, operator.clone(), factory)
        .start(CancellationToken::new())
        .await;
    assert_eq!(second.objects, 0);
    assert_eq!(second.object_bytes, 0);
    assert_eq!(second.skipped, 4);
    assert_eq!(second.failed, 0);
}

#[tokio::test]
async fn test_overwrite_always_uploads_again() {
    let test_dir = TestDir::new().unwrap();
    let file = test_dir.create_file("again.txt", b"payload").unwrap();
    let operator = Arc::new(MockOperator::default());
    let factory = MockFactory::relative_to_root();

    let mut profile = profile(Vec::new(), vec![file]);
    profile.options.overwrite = Overwrite::Always;

    for _ in 0..2 {
        let stats = Queue::build(&profile, operator.clone(), factory.clone())
            .start(CancellationToken::new())
            .await;
        assert_eq!(stats.objects, 1);
        assert_eq!(stats.skipped, 0);
    }
}

#[tokio::test]
async fn test_failed_job_does_not_disturb_siblings() {
    let test_dir = TestDir::new().unwrap();
    let files = vec![
        test_dir.create_file("alpha.txt", b"a").unwrap(),
        test_dir.create_file("fail.bin", b"b").unwrap(),
        test_dir.create_file("zeta.txt", b"c").unwrap(),
    ];

    let operator = Arc::new(MockOperator {
        fail_keys: HashSet::from(["fail.bin".to_string()]),
        ..Default::default()
    });

    let stats = Queue::build(
        &profile(Vec::new(), files),
        operator.clone(),
        MockFactory::relative_to_root(),
    )
    .start(CancellationToken::new())
    .await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.objects, 2);
    assert_eq!(stats.total(), 3);

    let mut keys = operator.uploaded_keys();
    keys.sort();
    assert_eq!(keys, vec!["alpha.txt".to_string(), "zeta.txt".to_string()]);
}

#[tokio::test]
async fn test_stats_conservation_across_mixed_outcomes() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_transfer_tree(&test_dir).unwrap();

    let operator = Arc::new(MockOperator {
        existing: Mutex::new(HashSet::from(["alpha.txt".to_string()])),
        fail_keys: HashSet::from(["nested/gamma.txt".to_string()]),
        ..Default::default()
    });

    let missing = test_dir.path().join("not-there.txt");
    let profile = profile(vec![test_dir.path().to_path_buf()], vec![missing]);
    let stats = Queue::build(&profile, operator, MockFactory::relative_to_root())
        .start(CancellationToken::new())
        .await;

    assert_eq!(stats.objects, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.total(), 5);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinks_are_skipped_without_opt_in() {
    use std::os::unix::fs::symlink;

    let test_dir = TestDir::new().unwrap();
    let target = test_dir.create_file("real.txt", b"real").unwrap();
    symlink(&target, test_dir.path().join("link.txt")).unwrap();

    let operator = Arc::new(MockOperator::default());
    let stats = Queue::build(
        &profile(vec![test_dir.path().to_path_buf()], Vec::new()),
        operator.clone(),
        MockFactory::relative_to_root(),
    )
    .start(CancellationToken::new())
    .await;

    assert_eq!(stats.objects, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(operator.uploaded_keys(), vec!["real.txt".to_string()]);
}

#[tokio::test]
async fn test_cancelled_queue_processes_nothing() {
    let test_dir = TestDir::new().unwrap();
    fixtures::create_transfer_tree(&test_dir).unwrap();
    let operator = Arc::new(MockOperator::default());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = Queue::build(
        &profile(vec![test_dir.path().to_path_buf()], Vec::new()),
        operator.clone(),
        MockFactory::relative_to_root(),
    )
    .start(cancel)
    .await;

    assert_eq!(stats.total(), 0);
    assert!(operator.uploaded_keys().is_empty());
}

#[tokio::test]
async fn test_tags_travel_with_the_upload() {
    let test_dir = TestDir::new().unwrap();
    let file = test_dir.create_file("tagged.txt", b"payload").unwrap();
    let operator = Arc::new(MockOperator::default());

    let stats = Queue::build(
        &profile(Vec::new(), vec![file.clone()]),
        operator.clone(),
        MockFactory::relative_to_root(),
    )
    .start(CancellationToken::new())
    .await;
    assert_eq!(stats.objects, 1);

    let tags = operator.object_tags("tagged.txt").await.unwrap();
    assert_eq!(tags["origin"], file.display().to_string());
}

#[tokio::test]
async fn test_handler_creates_missing_bucket_when_allowed() {
    let test_dir = TestDir::new().unwrap();
    let file = test_dir.create_file("data.txt", b"payload").unwrap();

    let operator = Arc::new(MockOperator {
        bucket_present: AtomicBool::new(false),
        ..Default::default()
    });

    let mut profile = profile(Vec::new(), vec![file]);
    profile.bucket.create = true;

    let handler = Handler::new(profile, operator.clone(), MockFactory::relative_to_root()).unwrap();
    let stats = handler.run(CancellationToken::new()).await.unwrap();

    assert!(operator.bucket_created.load(Ordering::SeqCst));
    assert_eq!(stats.objects, 1);
}

#[tokio::test]
async fn test_handler_fails_fast_on_missing_bucket() {
    let test_dir = TestDir::new().unwrap();
    let file = test_dir.create_file("data.txt", b"payload").unwrap();

    let operator = Arc::new(MockOperator {
        bucket_present: AtomicBool::new(false),
        ..Default::default()
    });

    let handler = Handler::new(
        profile(Vec::new(), vec![file]),
        operator.clone(),
        MockFactory::relative_to_root(),
    )
    .unwrap();
    let result = handler.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::BucketUnavailable(_))));
    assert!(operator.uploaded_keys().is_empty());
}

#[tokio::test]
async fn test_unwalkable_root_is_skipped_not_fatal() {
    let test_dir = TestDir::new().unwrap();
    let file = test_dir.create_file("ok.txt", b"payload").unwrap();
    let operator = Arc::new(MockOperator::default());

    let profile = profile(vec![test_dir.path().join("missing-root")], vec![file]);
    let queue = Queue::build(&profile, operator.clone(), MockFactory::relative_to_root());
    assert_eq!(queue.len(), 1);

    let stats = queue.start(CancellationToken::new()).await;
    assert_eq!(stats.objects, 1);
}
