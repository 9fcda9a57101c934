//! Per-job upload contract implementation

use async_trait::async_trait;
use ferry_core::profile::{NamingConfig, Profile, TagOptions};
use ferry_core::{key, Error, Job, ObjectFactory, Result, StoreObject};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

const HASH_BUFFER: usize = 64 * 1024;

/// Backend-side record for one job
///
/// Derives the destination key, attaches the tag set, and owns the open
/// source handle between `pre` and `destroy`.
pub struct BlobObject {
    naming: NamingConfig,
    tagging: TagOptions,
    custom_tags: BTreeMap<String, String>,
    file: Option<File>,
}

#[async_trait]
impl StoreObject for BlobObject {
    async fn generate(&mut self, job: &mut Job) -> Result<()> {
        let name = job
            .source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::SourceUnreadable {
                path: job.source.clone(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;
        job.key = key::derive(name, &job.origin_dir, job.search_root.as_deref(), &self.naming);

        job.tags = self.custom_tags.clone();
        if self.tagging.origin_path {
            job.tags
                .insert("origin-path".to_string(), job.source.display().to_string());
        }
        if self.tagging.checksum_sha256 && job.is_regular {
            let digest = checksum_sha256(&job.source).await?;
            job.tags.insert("sha256".to_string(), digest.clone());
            job.checksum = Some(digest);
        }

        trace!(key = %job.key, "generated destination key");
        Ok(())
    }

    async fn pre(&mut self, job: &mut Job) -> Result<()> {
        let meta = tokio::fs::metadata(&job.source)
            .await
            .map_err(|err| source_error(&job.source, err))?;
        // The upload must match what enumeration saw; a resized file is
        // a different file.
        if meta.len() != job.size {
            return Err(Error::SourceUnreadable {
                path: job.source.clone(),
                reason: format!(
                    "size changed since enumeration ({} -> {})",
                    job.size,
                    meta.len()
                ),
            });
        }
        let file = File::open(&job.source)
            .await
            .map_err(|err| source_error(&job.source, err))?;
        self.file = Some(file);
        Ok(())
    }

    fn source(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    async fn post(&mut self, job: &Job) -> Result<()> {
        debug!(key = %job.key, "upload finished");
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        // Dropping the handle closes it; repeated calls are no-ops.
        self.file.take();
        Ok(())
    }
}

/// Stream a file through SHA-256 and return the hex digest
pub async fn checksum_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .await
        .map_err(|err| source_error(path, err))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|err| source_error(path, err))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn source_error(path: &Path, err: std::io::Error) -> Error {
    Error::SourceUnreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Builds one [`BlobObject`] per job
pub struct BlobObjectFactory {
    naming: NamingConfig,
    tagging: TagOptions,
    custom_tags: BTreeMap<String, String>,
}

impl BlobObjectFactory {
    /// Build a factory from explicit naming and tagging settings
    pub fn new(
        naming: NamingConfig,
        tagging: TagOptions,
        custom_tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            naming,
            tagging,
            custom_tags,
        }
    }

    /// Build a factory from a profile's naming and tagging sections
    pub fn from_profile(profile: &Profile) -> Self {
        Self::new(
            profile.naming.clone(),
            profile.tagging,
            profile.tags.clone(),
        )
    }
}

impl ObjectFactory for BlobObjectFactory {
    fn build(&self) -> Box<dyn StoreObject> {
        Box::new(BlobObject {
            naming: self.naming.clone(),
            tagging: self.tagging,
            custom_tags: self.custom_tags.clone(),
            file: None,
        })
    }
}
