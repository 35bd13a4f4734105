//! A sync session over one download directory.
//!
//! Ties the cached hierarchy, the merged tree and the download results
//! together: open the cache, merge a fresh listing over it, select, download
//! or ignore, then write resolved links back and save.

use std::path::Path;

use crate::download::{BatchOutcome, DownloadJob, apply_outcome};
use crate::error::Result;
use crate::merge::merge;
use crate::node::Folder;
use crate::presence::mark_ignored;
use crate::remote::{CourseSource, fetch_courses};
use crate::select::extract;
use crate::store::TreeStore;
use crate::tree::CatalogTree;

/// The working tree for one download directory plus its on-disk cache.
pub struct SyncSession {
    tree: CatalogTree,
    store: TreeStore,
}

impl SyncSession {
    /// Opens the cached hierarchy under `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache exists but cannot be decoded.
    pub fn open(base: &Path) -> Result<Self> {
        let store = TreeStore::new(base);
        let cached = store.load()?;
        log::debug!("Opened session at {} ({} cached course(s))", base.display(), cached.len());
        Ok(Self {
            tree: CatalogTree::from_courses(base, cached),
            store,
        })
    }

    /// Replaces the tree with `fresh` merged over the current one.
    ///
    /// Selection is reset; resolved links carry over.
    pub fn reload(&mut self, fresh: Vec<Folder>) {
        let previous = self.tree.to_courses();
        self.tree = merge(&previous, fresh, self.tree.base().to_path_buf());
    }

    /// Fetches course trees from `source` and merges them in.
    ///
    /// A non-empty `only` limits the sync to the named courses.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing or a course tree cannot be fetched.
    pub async fn sync(&mut self, source: &dyn CourseSource, only: &[String]) -> Result<()> {
        let fresh = fetch_courses(source, only).await?;
        self.reload(fresh);
        Ok(())
    }

    #[must_use]
    pub const fn tree(&self) -> &CatalogTree {
        &self.tree
    }

    pub const fn tree_mut(&mut self) -> &mut CatalogTree {
        &mut self.tree
    }

    /// Jobs for the current selection.
    #[must_use]
    pub fn jobs(&self) -> Vec<DownloadJob> {
        extract(&self.tree)
    }

    /// Writes an ignore marker for every selected item and hides them.
    ///
    /// Returns the number of items marked.
    ///
    /// # Errors
    ///
    /// Returns an error if a marker cannot be written. Markers written
    /// before the failure stay in place.
    pub fn ignore_selected(&mut self) -> Result<usize> {
        let jobs = extract(&self.tree);
        for job in &jobs {
            mark_ignored(&job.destination, &job.leaf.name)?;
        }
        self.tree.refresh_presence();
        Ok(jobs.len())
    }

    /// Applies a finished batch and saves the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn finish_batch(&mut self, jobs: &[DownloadJob], outcome: &BatchOutcome) -> Result<()> {
        apply_outcome(&mut self.tree, jobs, outcome);
        self.save()
    }

    /// Saves the current hierarchy to the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.tree.to_courses())
    }
}
