use directories::ProjectDirs;
use std::path::PathBuf;

use crate::{Error, Result};

/// Application directories under the XDG base directories
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config directory (~/.config/youneeq)
    pub config: PathBuf,

    /// Settings file path
    pub settings_file: PathBuf,
}

impl Directories {
    /// Create a new `Directories` instance with standard XDG paths.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the system's project directories cannot be determined.
    pub fn new() -> Result<Self> {
        let project = ProjectDirs::from("", "", "youneeq")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;

        Ok(Self::with_base(project.config_dir().to_path_buf()))
    }

    #[must_use]
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            settings_file: base.join("settings.json"),
            config: base,
        }
    }

    /// Ensure the config directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config)
    }
}
