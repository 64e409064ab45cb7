//! Repository configuration (`<metadata>/config`, INI format).

use crate::error::{Error, Result};
use crate::hash::Algorithm;
use ini::Ini;
use std::path::Path;

/// Only repository format version understood by this crate.
pub const REPOSITORY_FORMAT_VERSION: &str = "0";

/// Parsed repository configuration.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    ini: Ini,
}

impl RepoConfig {
    /// The configuration written by `init`.
    pub fn default_config() -> Self {
        let mut ini = Ini::new();
        ini.with_section(Some("core"))
            .set("repositoryformatversion", REPOSITORY_FORMAT_VERSION)
            .set("filemode", "false")
            .set("bare", "false");
        Self { ini }
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => Error::Io { source },
            ini::Error::Parse(parse) => Error::config(path, parse.to_string()),
        })?;
        let config = Self { ini };
        config.validate(path)?;
        Ok(config)
    }

    /// Parse config text (used for validation and tests).
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| Error::config(path, e.to_string()))?;
        let config = Self { ini };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        match self.get("core", "repositoryformatversion") {
            Some(REPOSITORY_FORMAT_VERSION) => {}
            Some(other) => {
                return Err(Error::invalid_repository(
                    path,
                    format!("Unsupported repositoryformatversion {}", other),
                ));
            }
            None => {
                return Err(Error::invalid_repository(
                    path,
                    "core.repositoryformatversion missing",
                ));
            }
        }

        self.algorithm().map(|_| ())
    }

    /// Write the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.ini.write_to_file(path)?;
        Ok(())
    }

    /// Look up `section.key`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.get_from(Some(section), key)
    }

    /// Set `section.key`.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Digest algorithm for object addresses (`extensions.objectformat`).
    pub fn algorithm(&self) -> Result<Algorithm> {
        match self.get("extensions", "objectformat") {
            Some(name) => Algorithm::parse(name),
            None => Ok(Algorithm::default()),
        }
    }

    /// `Name <email>` from `user.name` and `user.email`, when both are set.
    pub fn identity(&self) -> Option<String> {
        let name = self.get("user", "name")?;
        let email = self.get("user", "email")?;
        Some(format!("{} <{}>", name, email))
    }
}
