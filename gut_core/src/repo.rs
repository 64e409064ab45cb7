//! Repository bootstrapping and discovery.

use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::hash::Algorithm;
use crate::store::{OBJECTS_DIR, ObjectStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the metadata directory inside a work tree.
pub const METADATA_DIR: &str = ".gut";

const DEFAULT_DESCRIPTION: &str =
    "Unnamed repository; edit this file 'description' to name the repository.\n";

const DEFAULT_HEAD: &str = "ref: refs/heads/master\n";

/// A work tree plus its metadata directory.
#[derive(Debug, Clone)]
pub struct Repository {
    worktree: PathBuf,
    metadata_dir: PathBuf,
    config: RepoConfig,
}

impl Repository {
    /// Initialize a new repository in `worktree`.
    ///
    /// Creates the directory structure:
    /// - `branches/`, `objects/`, `refs/tags/`, `refs/heads/`
    /// - `description`, `HEAD` and `config` files
    pub fn init<P: AsRef<Path>>(worktree: P) -> Result<Self> {
        let worktree = worktree.as_ref().to_path_buf();
        let metadata_dir = worktree.join(METADATA_DIR);

        if worktree.exists() && !worktree.is_dir() {
            return Err(Error::invalid_repository(&worktree, "not a directory"));
        }

        if metadata_dir.exists() {
            if !metadata_dir.is_dir() {
                return Err(Error::invalid_repository(
                    &metadata_dir,
                    "metadata path is not a directory",
                ));
            }
            if fs::read_dir(&metadata_dir)?.next().is_some() {
                return Err(Error::invalid_repository(
                    &metadata_dir,
                    "metadata directory is not empty",
                ));
            }
        }

        for dir in ["branches", OBJECTS_DIR, "refs/tags", "refs/heads"] {
            fs::create_dir_all(metadata_dir.join(dir))?;
        }

        fs::write(metadata_dir.join("description"), DEFAULT_DESCRIPTION)?;
        fs::write(metadata_dir.join("HEAD"), DEFAULT_HEAD)?;

        let config = RepoConfig::default_config();
        config.save(&metadata_dir.join("config"))?;

        info!(path = %metadata_dir.display(), "initialized repository");

        Ok(Self {
            worktree,
            metadata_dir,
            config,
        })
    }

    /// Open an existing repository whose work tree is `worktree`.
    pub fn open<P: AsRef<Path>>(worktree: P) -> Result<Self> {
        let worktree = worktree.as_ref().to_path_buf();
        let metadata_dir = worktree.join(METADATA_DIR);

        if !metadata_dir.is_dir() {
            return Err(Error::invalid_repository(
                &worktree,
                format!("no {} directory", METADATA_DIR),
            ));
        }

        let config_path = metadata_dir.join("config");
        if !config_path.is_file() {
            return Err(Error::invalid_repository(&metadata_dir, "config file not found"));
        }
        let config = RepoConfig::load(&config_path)?;

        Ok(Self {
            worktree,
            metadata_dir,
            config,
        })
    }

    /// Find the repository containing `start`, walking up towards the root.
    pub fn find<P: AsRef<Path>>(start: P) -> Result<Self> {
        let start = start.as_ref();
        let mut path = fs::canonicalize(start)?;

        loop {
            if path.join(METADATA_DIR).is_dir() {
                debug!(path = %path.display(), "found repository");
                return Self::open(&path);
            }

            // The root's parent is itself (or absent).
            match path.parent() {
                Some(parent) if parent != path => path = parent.to_path_buf(),
                _ => {
                    return Err(Error::invalid_repository(
                        start,
                        format!("no {} directory here or in any parent", METADATA_DIR),
                    ));
                }
            }
        }
    }

    /// The directory holding `.gut`.
    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    /// The metadata directory (`<worktree>/.gut`).
    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Configuration as loaded from `.gut/config`.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Digest algorithm configured for this repository.
    pub fn algorithm(&self) -> Algorithm {
        // Validated on load.
        self.config.algorithm().unwrap_or_default()
    }

    /// The object store of this repository.
    pub fn objects(&self) -> Result<ObjectStore> {
        ObjectStore::open(&self.metadata_dir)
    }
}
