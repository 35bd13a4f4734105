//! Download orchestration.
//!
//! A batch runs its jobs strictly one after another. A job that fails to
//! resolve or transfer is reported through [`DownloadProgress`] and counted
//! as skipped; the batch itself never fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, error_trace};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::node::{Leaf, LeafKind, ResolvedLink, lecture_filename};
use crate::presence::sanitize_filename;
use crate::remote::{Remote, filename_from_url};
use crate::stats::{BatchStats, BatchStatsBuilder, FileStats, TransferTracker};
use crate::tree::{CatalogTree, NodeId};

/// One leaf to download, with the directory it belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Tree node the job was extracted from.
    pub node: NodeId,
    /// Directory the file is written into.
    pub destination: PathBuf,
    pub kind: LeafKind,
    /// Snapshot of the leaf at extraction time.
    pub leaf: Leaf,
}

/// Trait for receiving download progress updates.
///
/// Job indices are 1-based positions in the batch. All methods have default
/// no-op implementations.
pub trait DownloadProgress: Send + Sync {
    /// Called once before the first job.
    fn on_batch_start(&self, _total: usize) {}

    /// Called when a job's reference could not be resolved.
    fn on_resolve_failed(&self, _index: usize, _name: &str, _trace: &str) {}

    /// Called when a job's file already exists on disk.
    fn on_skip(&self, _index: usize, _filename: &str) {}

    /// Called as bytes arrive, with the cumulative count and the total if known.
    fn on_progress(&self, _index: usize, _filename: &str, _bytes: u64, _total: Option<u64>) {}

    /// Called when a transfer completes.
    fn on_complete(&self, _index: usize, _filename: &str, _stats: &FileStats) {}

    /// Called when a transfer fails.
    fn on_error(&self, _index: usize, _filename: &str, _trace: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Progress events forwarded from a background batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    BatchStarted {
        total: usize,
    },
    ResolveFailed {
        index: usize,
        name: String,
        trace: String,
    },
    Skipped {
        index: usize,
        filename: String,
    },
    Progress {
        index: usize,
        filename: String,
        bytes: u64,
        total: Option<u64>,
    },
    Completed {
        index: usize,
        filename: String,
        size: u64,
    },
    Failed {
        index: usize,
        filename: String,
        trace: String,
    },
}

/// Forwards every callback over an unbounded channel.
///
/// Send errors are ignored: a dropped receiver only means nobody is
/// watching anymore.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl DownloadProgress for ChannelProgress {
    fn on_batch_start(&self, total: usize) {
        let _ = self.tx.send(ProgressEvent::BatchStarted { total });
    }

    fn on_resolve_failed(&self, index: usize, name: &str, trace: &str) {
        let _ = self.tx.send(ProgressEvent::ResolveFailed {
            index,
            name: name.to_string(),
            trace: trace.to_string(),
        });
    }

    fn on_skip(&self, index: usize, filename: &str) {
        let _ = self.tx.send(ProgressEvent::Skipped {
            index,
            filename: filename.to_string(),
        });
    }

    fn on_progress(&self, index: usize, filename: &str, bytes: u64, total: Option<u64>) {
        let _ = self.tx.send(ProgressEvent::Progress {
            index,
            filename: filename.to_string(),
            bytes,
            total,
        });
    }

    fn on_complete(&self, index: usize, filename: &str, stats: &FileStats) {
        let _ = self.tx.send(ProgressEvent::Completed {
            index,
            filename: filename.to_string(),
            size: stats.size,
        });
    }

    fn on_error(&self, index: usize, filename: &str, trace: &str) {
        let _ = self.tx.send(ProgressEvent::Failed {
            index,
            filename: filename.to_string(),
            trace: trace.to_string(),
        });
    }
}

/// Result of a batch.
///
/// `deltas` is aligned with the job list: entry `k` holds the link newly
/// resolved for job `k` during this batch, or `None` if the job reused a
/// cached link or failed to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub stats: BatchStats,
    pub deltas: Vec<Option<ResolvedLink>>,
}

impl BatchOutcome {
    #[must_use]
    pub const fn downloaded(&self) -> usize {
        self.stats.files_downloaded
    }

    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.stats.files_skipped
    }
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Runs download batches against a remote.
pub struct Downloader<R: Remote, F: FileSystem = TokioFileSystem> {
    remote: R,
    fs: F,
}

impl<R: Remote> Downloader<R, TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub const fn new(remote: R) -> Self {
        Self {
            remote,
            fs: TokioFileSystem,
        }
    }
}

impl<R: Remote, F: FileSystem> Downloader<R, F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(remote: R, fs: F) -> Self {
        Self { remote, fs }
    }

    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the link for a job and whether it was resolved just now.
    async fn link_for(&self, job: &DownloadJob) -> Result<(ResolvedLink, bool)> {
        if let Some(resolved) = &job.leaf.resolved {
            return Ok((resolved.clone(), false));
        }
        let reference = job.leaf.predownload_link.as_str();
        let link = match job.kind {
            LeafKind::File => {
                let url = self.remote.resolve_file_link(reference).await?;
                let filename =
                    filename_from_url(&url).unwrap_or_else(|| job.leaf.name.clone());
                ResolvedLink { url, filename }
            }
            LeafKind::RecordedLecture => {
                let url = self.remote.resolve_lecture_link(reference).await?;
                ResolvedLink {
                    url,
                    filename: lecture_filename(&job.leaf.name),
                }
            }
        };
        Ok((link, true))
    }

    /// Downloads a single file using atomic `.part` file semantics.
    ///
    /// Writes to `{path}.part` during the transfer, then renames to `{path}`
    /// on success. The `.part` file is removed on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the transfer
    /// fails.
    pub async fn download_file(
        &self,
        index: usize,
        link: &ResolvedLink,
        path: &Path,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<FileStats> {
        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent).await?;
        }

        let pp = part_path(path);
        let tracker = TransferTracker::new();
        let filename = link.filename.as_str();
        let on_bytes = |cumulative: u64, total: Option<u64>| {
            let bytes = tracker.record(cumulative);
            progress.on_progress(index, filename, bytes, total);
        };

        match self.remote.transfer(&link.url, &pp, &on_bytes).await {
            Ok(size) => {
                self.fs.rename_file(&pp, path).await?;
                Ok(tracker.finish(size))
            }
            Err(e) => {
                let _ = self.fs.remove_file(&pp).await;
                Err(e)
            }
        }
    }

    /// Runs every job in order and reports what happened.
    pub async fn run(
        &self,
        jobs: &[DownloadJob],
        progress: &Arc<dyn DownloadProgress>,
    ) -> BatchOutcome {
        let mut builder = BatchStatsBuilder::new();
        let mut deltas = Vec::with_capacity(jobs.len());
        progress.on_batch_start(jobs.len());

        for (position, job) in jobs.iter().enumerate() {
            let index = position + 1;

            let link = match self.link_for(job).await {
                Ok((link, fresh)) => {
                    deltas.push(fresh.then(|| link.clone()));
                    link
                }
                Err(e) => {
                    let trace = error_trace(&e);
                    log::error!("Could not resolve {}: {trace}", job.leaf.name);
                    progress.on_resolve_failed(index, &job.leaf.name, &trace);
                    deltas.push(None);
                    builder.add_skip();
                    continue;
                }
            };

            let path = job.destination.join(sanitize_filename(&link.filename));
            if self.fs.file_exists(&path).await {
                log::debug!("Skipping {}: already exists", path.display());
                progress.on_skip(index, &link.filename);
                builder.add_skip();
                continue;
            }

            match self.download_file(index, &link, &path, progress).await {
                Ok(file_stats) => {
                    log::info!("Downloaded {} ({} bytes)", path.display(), file_stats.size);
                    progress.on_complete(index, &link.filename, &file_stats);
                    builder.add_download(&file_stats);
                }
                Err(e) => {
                    let trace = error_trace(&e);
                    log::error!("Download of {} failed: {trace}", link.filename);
                    progress.on_error(index, &link.filename, &trace);
                    builder.add_skip();
                }
            }
        }

        let stats = builder.build();
        log::info!(
            "Batch finished: {} downloaded, {} skipped",
            stats.files_downloaded,
            stats.files_skipped
        );
        BatchOutcome { stats, deltas }
    }
}

/// A batch running on a background task.
pub struct BatchHandle {
    /// Progress events, in order. Closes when the batch ends.
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    task: JoinHandle<BatchOutcome>,
}

impl BatchHandle {
    /// Waits for the batch to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Task`](crate::Error::Task) if the background task
    /// panicked.
    pub async fn finish(self) -> Result<BatchOutcome> {
        Ok(self.task.await?)
    }
}

/// Runs a batch on a spawned task so the caller stays responsive.
#[must_use]
pub fn spawn_batch<R, F>(downloader: Arc<Downloader<R, F>>, jobs: Vec<DownloadJob>) -> BatchHandle
where
    R: Remote + 'static,
    F: FileSystem + 'static,
{
    let (tx, events) = mpsc::unbounded_channel();
    let progress: Arc<dyn DownloadProgress> = Arc::new(ChannelProgress::new(tx));
    let task = tokio::spawn(async move { downloader.run(&jobs, &progress).await });
    BatchHandle { events, task }
}

/// Writes a batch's newly resolved links back into the tree and recomputes
/// presence, so finished items disappear from the next selection.
pub fn apply_outcome(tree: &mut CatalogTree, jobs: &[DownloadJob], outcome: &BatchOutcome) {
    for (job, delta) in jobs.iter().zip(&outcome.deltas) {
        if let Some(link) = delta {
            tree.set_resolved(job.node, link.clone());
        }
    }
    tree.refresh_presence();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::node::{ContentNode, Folder};
    use crate::remote::{LinkResolver, ProgressFn, Transfer};
    use crate::select::{extract, select_all};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Resolves references from a table and serves bodies from another.
    #[derive(Default)]
    struct MockRemote {
        links: HashMap<String, String>,
        bodies: HashMap<String, Vec<u8>>,
        resolve_calls: AtomicUsize,
    }

    impl MockRemote {
        fn link(mut self, reference: &str, url: &str) -> Self {
            self.links.insert(reference.to_string(), url.to_string());
            self
        }

        fn body(mut self, url: &str, body: &[u8]) -> Self {
            self.bodies.insert(url.to_string(), body.to_vec());
            self
        }

        fn lookup(&self, reference: &str) -> Result<String> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            self.links
                .get(reference)
                .cloned()
                .ok_or_else(|| Error::Resolution {
                    reference: reference.to_string(),
                    message: "no such item".to_string(),
                })
        }
    }

    #[async_trait]
    impl LinkResolver for MockRemote {
        async fn resolve_file_link(&self, predownload_link: &str) -> Result<String> {
            self.lookup(predownload_link)
        }

        async fn resolve_lecture_link(&self, predownload_link: &str) -> Result<String> {
            self.lookup(predownload_link)
        }
    }

    #[async_trait]
    impl Transfer for MockRemote {
        async fn transfer(
            &self,
            url: &str,
            destination: &Path,
            progress: ProgressFn<'_>,
        ) -> Result<u64> {
            // Leave a partial file behind so cleanup is observable.
            std::fs::write(destination, b"partial")?;
            let body = self.bodies.get(url).ok_or_else(|| Error::Transfer {
                url: url.to_string(),
                message: "connection reset".to_string(),
            })?;
            std::fs::write(destination, body)?;
            let len = body.len() as u64;
            progress(len / 2, Some(len));
            progress(len, Some(len));
            Ok(len)
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl DownloadProgress for RecordingProgress {
        fn on_resolve_failed(&self, index: usize, name: &str, _trace: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("resolve-failed {index} {name}"));
        }

        fn on_skip(&self, index: usize, filename: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("skip {index} {filename}"));
        }

        fn on_complete(&self, index: usize, filename: &str, _stats: &FileStats) {
            self.events
                .lock()
                .unwrap()
                .push(format!("complete {index} {filename}"));
        }

        fn on_error(&self, index: usize, filename: &str, _trace: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error {index} {filename}"));
        }
    }

    fn course(children: Vec<ContentNode>) -> Vec<Folder> {
        vec![Folder::new("Course", children)]
    }

    fn selected_jobs(tree: &mut CatalogTree) -> Vec<DownloadJob> {
        select_all(tree);
        extract(tree)
    }

    #[test]
    fn no_progress_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoProgress>();
        assert_send_sync::<ChannelProgress>();
    }

    #[test]
    fn part_path_appends_extension() {
        assert_eq!(
            part_path(Path::new("Course/notes.pdf")),
            PathBuf::from("Course/notes.pdf.part")
        );
    }

    #[tokio::test]
    async fn single_file_cycle_then_nothing_left() {
        let dir = TempDir::new().unwrap();
        let mut tree = CatalogTree::from_courses(
            dir.path(),
            course(vec![ContentNode::File(Leaf::new("Notes", "ref1"))]),
        );
        let remote = MockRemote::default()
            .link("ref1", "https://cdn.example/x/notes.pdf")
            .body("https://cdn.example/x/notes.pdf", b"%PDF");
        let downloader = Downloader::new(remote);
        let progress: Arc<dyn DownloadProgress> = Arc::new(NoProgress);

        let jobs = selected_jobs(&mut tree);
        let outcome = downloader.run(&jobs, &progress).await;
        assert_eq!(outcome.downloaded(), 1);
        assert_eq!(outcome.skipped(), 0);
        assert_eq!(
            outcome.deltas,
            vec![Some(ResolvedLink {
                url: "https://cdn.example/x/notes.pdf".to_string(),
                filename: "notes.pdf".to_string(),
            })]
        );
        assert_eq!(
            std::fs::read(dir.path().join("Course").join("notes.pdf")).unwrap(),
            b"%PDF"
        );
        assert!(!dir.path().join("Course").join("notes.pdf.part").exists());

        apply_outcome(&mut tree, &jobs, &outcome);
        let notes = tree.find("Course/Notes").unwrap();
        assert!(tree.is_present(notes));
        assert!(tree.leaf(notes).unwrap().1.resolved.is_some());

        let jobs = extract(&tree);
        assert!(jobs.is_empty());
        let outcome = downloader.run(&jobs, &progress).await;
        assert_eq!((outcome.downloaded(), outcome.skipped()), (0, 0));
        assert!(outcome.deltas.is_empty());
    }

    #[tokio::test]
    async fn resolution_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let mut tree = CatalogTree::from_courses(
            dir.path(),
            course(vec![
                ContentNode::File(Leaf::new("a", "ref-a")),
                ContentNode::File(Leaf::new("b", "ref-missing")),
                ContentNode::RecordedLecture(Leaf::new("Tut 4", "ref-c")),
            ]),
        );
        let remote = MockRemote::default()
            .link("ref-a", "https://cdn.example/a.pdf")
            .link("ref-c", "https://cdn.example/stream?id=9")
            .body("https://cdn.example/a.pdf", b"a")
            .body("https://cdn.example/stream?id=9", b"video");
        let downloader = Downloader::new(remote);
        let recorder = Arc::new(RecordingProgress::default());
        let progress: Arc<dyn DownloadProgress> = recorder.clone();

        let jobs = selected_jobs(&mut tree);
        let outcome = downloader.run(&jobs, &progress).await;

        assert_eq!(outcome.deltas.len(), 3);
        assert!(outcome.deltas[1].is_none());
        assert_eq!(outcome.downloaded() + outcome.skipped(), 3);
        assert_eq!(outcome.downloaded(), 2);
        assert_eq!(
            outcome.deltas[2].as_ref().unwrap().filename,
            "Tut 4.mp4"
        );
        assert!(dir.path().join("Course").join("Tut 4.mp4").exists());
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "complete 1 a.pdf".to_string(),
                "resolve-failed 2 b".to_string(),
                "complete 3 Tut 4.mp4".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn transfer_failure_cleans_up_part_file() {
        let dir = TempDir::new().unwrap();
        let mut tree = CatalogTree::from_courses(
            dir.path(),
            course(vec![ContentNode::File(Leaf::new("a", "ref-a"))]),
        );
        let remote = MockRemote::default().link("ref-a", "https://cdn.example/a.pdf");
        let downloader = Downloader::new(remote);
        let progress: Arc<dyn DownloadProgress> = Arc::new(NoProgress);

        let jobs = selected_jobs(&mut tree);
        let outcome = downloader.run(&jobs, &progress).await;

        assert_eq!((outcome.downloaded(), outcome.skipped()), (0, 1));
        // The link was still resolved, so it is kept for next time.
        assert!(outcome.deltas[0].is_some());
        let course_dir = dir.path().join("Course");
        assert!(!course_dir.join("a.pdf").exists());
        assert!(!course_dir.join("a.pdf.part").exists());
    }

    #[tokio::test]
    async fn existing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut tree = CatalogTree::from_courses(
            dir.path(),
            course(vec![ContentNode::File(Leaf::new("Notes", "ref1"))]),
        );
        let jobs = selected_jobs(&mut tree);

        // Appears between extraction and the run.
        let course_dir = dir.path().join("Course");
        std::fs::create_dir_all(&course_dir).unwrap();
        std::fs::write(course_dir.join("notes.pdf"), b"old").unwrap();

        let remote = MockRemote::default()
            .link("ref1", "https://cdn.example/notes.pdf")
            .body("https://cdn.example/notes.pdf", b"new");
        let downloader = Downloader::new(remote);
        let recorder = Arc::new(RecordingProgress::default());
        let progress: Arc<dyn DownloadProgress> = recorder.clone();

        let outcome = downloader.run(&jobs, &progress).await;
        assert_eq!((outcome.downloaded(), outcome.skipped()), (0, 1));
        assert!(outcome.deltas[0].is_some());
        assert_eq!(std::fs::read(course_dir.join("notes.pdf")).unwrap(), b"old");
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["skip 1 notes.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn cached_links_are_not_resolved_again() {
        let dir = TempDir::new().unwrap();
        let mut tree = CatalogTree::from_courses(
            dir.path(),
            course(vec![ContentNode::File(
                Leaf::new("Notes", "ref1").with_resolved("https://cdn.example/n.pdf", "n.pdf"),
            )]),
        );
        let remote = MockRemote::default().body("https://cdn.example/n.pdf", b"n");
        let downloader = Downloader::new(remote);
        let progress: Arc<dyn DownloadProgress> = Arc::new(NoProgress);

        let jobs = selected_jobs(&mut tree);
        let outcome = downloader.run(&jobs, &progress).await;
        assert_eq!(outcome.downloaded(), 1);
        assert_eq!(outcome.deltas, vec![None]);
        assert_eq!(downloader.remote().resolve_calls.load(Ordering::SeqCst), 0);
        assert!(dir.path().join("Course").join("n.pdf").exists());
    }

    #[tokio::test]
    async fn spawned_batch_streams_events() {
        let dir = TempDir::new().unwrap();
        let mut tree = CatalogTree::from_courses(
            dir.path(),
            course(vec![ContentNode::File(Leaf::new("Notes", "ref1"))]),
        );
        let remote = MockRemote::default()
            .link("ref1", "https://cdn.example/notes.pdf")
            .body("https://cdn.example/notes.pdf", b"1234");
        let downloader = Arc::new(Downloader::new(remote));

        let jobs = selected_jobs(&mut tree);
        let mut handle = spawn_batch(Arc::clone(&downloader), jobs.clone());
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        let outcome = handle.finish().await.unwrap();

        assert_eq!(outcome.downloaded(), 1);
        assert_eq!(events.first(), Some(&ProgressEvent::BatchStarted { total: 1 }));
        assert!(events.contains(&ProgressEvent::Progress {
            index: 1,
            filename: "notes.pdf".to_string(),
            bytes: 4,
            total: Some(4),
        }));
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Completed {
                index: 1,
                filename: "notes.pdf".to_string(),
                size: 4,
            })
        );

        apply_outcome(&mut tree, &jobs, &outcome);
        assert_eq!(tree.visible_leaf_count(), 0);
    }
}
