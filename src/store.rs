//! Persistence of the cached course hierarchy.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::node::{Folder, courses_from_json, courses_to_json};

/// Directory under the download root holding sync metadata.
pub const STATE_DIR: &str = ".learn-sync";

const CATALOG_FILE: &str = "catalog.json";

/// Reads and writes the cached hierarchy for one download directory.
#[derive(Debug, Clone)]
pub struct TreeStore {
    path: PathBuf,
}

impl TreeStore {
    /// Creates a store for the download directory `base`.
    #[must_use]
    pub fn new(base: &Path) -> Self {
        Self {
            path: base.join(STATE_DIR).join(CATALOG_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached courses. A missing cache is an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load(&self) -> Result<Vec<Folder>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => courses_from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No cached catalog at {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Saves the courses atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, courses: &[Folder]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, courses_to_json(courses)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        log::debug!("Saved catalog to {}", self.path.display());
        Ok(())
    }
}
