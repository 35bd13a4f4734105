//! learn-sync - keeps a local mirror of course content from a learning platform.
//!
//! A sync merges a freshly fetched course hierarchy over the cached one,
//! hides everything already on disk (downloaded or explicitly ignored), lets
//! the caller select what remains and downloads the selection, caching
//! resolved download links for the next run.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use learn_sync::{
//!     AppConfig, Authenticator, DownloadProgress, Downloader, HttpRemote, JsonCatalog,
//!     NoProgress, StaticToken, SyncSession, select_all,
//! };
//!
//! # async fn example() -> learn_sync::Result<()> {
//! let config = AppConfig::load(None)?;
//! let source = JsonCatalog::from_path(Path::new("catalog.json"))?;
//!
//! // Merge the fresh listing over the cache and select everything pending
//! let mut session = SyncSession::open(&config.sync.download_dir)?;
//! session.sync(&source, &[]).await?;
//! select_all(session.tree_mut());
//!
//! // Download the selection
//! let token = StaticToken::new(config.token.clone()).authenticate().await?;
//! let downloader = Downloader::new(HttpRemote::new(&config.remote, &token)?);
//! let progress: Arc<dyn DownloadProgress> = Arc::new(NoProgress);
//! let jobs = session.jobs();
//! let outcome = downloader.run(&jobs, &progress).await;
//!
//! // Remember resolved links and hide what was downloaded
//! session.finish_batch(&jobs, &outcome)?;
//! println!("Downloaded {} files", outcome.downloaded());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod merge;
pub mod node;
pub mod presence;
pub mod remote;
pub mod select;
pub mod session;
pub mod stats;
pub mod store;
pub mod tree;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use config::{AppConfig, RemoteConfig, SyncConfig};
pub use download::{
    BatchHandle, BatchOutcome, ChannelProgress, DownloadJob, DownloadProgress, Downloader,
    NoProgress, ProgressEvent, apply_outcome, spawn_batch,
};
pub use error::{Error, Result, error_trace};
pub use format::{format_bytes, format_duration};
pub use fs::{FileSystem, TokioFileSystem};
pub use merge::merge;
pub use node::{ContentNode, Folder, Leaf, LeafKind, NodeKind, ResolvedLink};
pub use presence::{is_satisfied, mark_ignored, sanitize_filename};
pub use remote::{
    Authenticator, Course, CourseSource, HttpRemote, JsonCatalog, LinkResolver, SessionToken,
    StaticToken, Transfer,
};
pub use select::{deselect_all, extract, select_all, select_kind, select_path};
pub use session::SyncSession;
pub use stats::{BatchStats, FileStats};
pub use store::TreeStore;
pub use tree::{CatalogTree, CheckState, NodeId};
