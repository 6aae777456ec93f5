//! # Configuration Module
//!
//! [`ApplyConfig`] is built once from the command line and then passed by
//! reference through the whole workflow.
//!
//! ## Defaults file
//! Frequently used options can be stored as JSON in
//! `~/.config/wonderful-bing/config.json`, all keys optional:
//!
//! ```json
//! { "directory": "/home/me/Pictures/bing", "save_story": true, "market": "en-GB" }
//! ```
//!
//! Command line flags always win over the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Xfconf property of the first monitor's image.
pub const DEFAULT_XFCE4_PATH: &str = "/backdrop/screen0/monitor0/image-path";

/// Optional defaults read from the user's config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Where to save pictures instead of the temp directory
    pub directory: Option<PathBuf>,
    pub xfce4_path: Option<String>,
    pub save_story: bool,
    /// Bing regional market code, e.g. "en-US"
    pub market: Option<String>,
}

impl Defaults {
    /// `~/.config/wonderful-bing/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wonderful-bing/config.json"))
    }

    /// Loads the defaults file, falling back to built-in defaults if it is
    /// missing or cannot be parsed.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(defaults) => defaults,
            Err(e) => {
                debug!("Ignoring unreadable {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

/// Validated settings for one `set` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfig {
    pub environment: String,
    /// Absolute, existing download directory
    pub directory: PathBuf,
    /// Handed to the wallpaper command as `{1}` (xfconf property for xfce4)
    pub secondary_path: String,
    pub save_caption: bool,
    /// Apply again even if today's picture was downloaded before
    pub force_reapply: bool,
}

impl ApplyConfig {
    /// Validates `directory` and makes it absolute.
    pub fn new(
        environment: impl Into<String>,
        directory: &Path,
        secondary_path: impl Into<String>,
        save_caption: bool,
        force_reapply: bool,
    ) -> Result<Self> {
        if !directory.is_dir() {
            return Err(Error::MissingDirectory(directory.to_path_buf()));
        }
        let directory = directory
            .canonicalize()
            .map_err(|e| Error::io(directory, e))?;

        Ok(Self {
            environment: environment.into(),
            directory,
            secondary_path: secondary_path.into(),
            save_caption,
            force_reapply,
        })
    }
}
