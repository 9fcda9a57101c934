//! Transfer profile types
//!
//! A profile describes one transfer run: the destination bucket, the
//! naming rules for destination keys, the overwrite policy, tagging
//! options, and the input roots. Profiles are loaded from TOML and
//! validated before any transfer starts; enum-valued fields use closed
//! serde enums so unknown values are rejected at parse time.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Main transfer profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Destination bucket
    pub bucket: BucketConfig,
    /// Scheduling and overwrite behavior
    #[serde(default)]
    pub options: TransferOptions,
    /// Destination key derivation rules
    #[serde(default)]
    pub naming: NamingConfig,
    /// Automatic tag attachment
    #[serde(default)]
    pub tagging: TagOptions,
    /// Custom tags applied to every object
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Input roots
    #[serde(default)]
    pub inputs: InputConfig,
}

/// Destination bucket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Bucket (or container, or directory) name
    pub name: String,
    /// Bucket region, required by the s3 provider
    #[serde(default)]
    pub region: Option<String>,
    /// Create the bucket when it does not exist
    #[serde(default)]
    pub create: bool,
    /// Which backend the bucket lives on
    #[serde(default)]
    pub provider: Provider,
    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Amazon S3 and S3-compatible stores
    #[default]
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Azure Blob Storage
    Azure,
    /// A local directory standing in for a bucket
    File,
}

/// Scheduling and overwrite behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Upper bound on concurrently running workers
    pub max_uploads: usize,
    /// What to do when the destination key is already taken
    pub overwrite: Overwrite,
    /// Traverse symlinked directories and follow symlinked files
    pub follow_symlinks: bool,
    /// Descend into subdirectories of directory roots
    pub walk_dirs: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            max_uploads: 4,
            overwrite: Overwrite::Never,
            follow_symlinks: false,
            walk_dirs: true,
        }
    }
}

/// Overwrite policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overwrite {
    /// Skip the job when an object already exists at the key
    #[default]
    Never,
    /// Upload without checking for an existing object
    Always,
}

/// Destination key derivation rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// How the directory part of the key is assembled
    pub mode: NamingMode,
    /// Prefix prepended to every file name
    pub name_prefix: String,
    /// Prefix prepended to every key path
    pub path_prefix: String,
    /// Drop the root directory's own name from derived keys
    pub omit_root_dir: bool,
}

/// Key naming mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// Rebuild the path under the prefixes, relative to the search root
    #[default]
    Relative,
    /// Mirror the full source directory structure under the path prefix
    Absolute,
}

/// Automatic tag attachment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagOptions {
    /// Attach a SHA-256 checksum tag to every object
    pub checksum_sha256: bool,
    /// Attach the full source path as a tag
    pub origin_path: bool,
}

/// Input roots for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Standalone files to transfer
    pub files: Vec<PathBuf>,
    /// Directory roots to expand
    pub directories: Vec<PathBuf>,
    /// Accepted by the schema but not applied to any transfer stage
    pub skip: Vec<String>,
}

impl Profile {
    /// Load and validate a profile from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let profile: Profile = toml::from_str(&contents)
            .map_err(|err| Error::ConfigInvalid(format!("{}: {err}", path.display())))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check the profile before any transfer starts.
    ///
    /// Configuration problems are fatal to the whole run, so they are
    /// surfaced here rather than mid-transfer.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.name.trim().is_empty() {
            return Err(Error::ConfigInvalid("bucket name is empty".to_string()));
        }
        if self.bucket.provider == Provider::S3
            && self.bucket.region.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(Error::ConfigInvalid(
                "bucket region is required for the s3 provider".to_string(),
            ));
        }
        if self.options.max_uploads == 0 {
            return Err(Error::ConfigInvalid(
                "max_uploads must be greater than zero".to_string(),
            ));
        }
        if self.inputs.files.is_empty() && self.inputs.directories.is_empty() {
            return Err(Error::ConfigInvalid(
                "no files or directories to transfer".to_string(),
            ));
        }
        if !self.inputs.skip.is_empty() {
            warn!(
                patterns = self.inputs.skip.len(),
                "skip patterns are accepted but not applied"
            );
        }
        Ok(())
    }
}
