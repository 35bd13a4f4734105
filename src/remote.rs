//! Remote service collaborators.
//!
//! The sync engine only talks to the learning platform through the traits in
//! this module: [`Authenticator`] produces a session token, [`CourseSource`]
//! lists courses and their content trees, [`LinkResolver`] turns predownload
//! references into transfer URLs and [`Transfer`] streams bytes to disk.
//!
//! [`HttpRemote`] implements resolution and transfer over `reqwest`. Real
//! login and course listing are out of scope; [`StaticToken`] and
//! [`JsonCatalog`] stand in for them.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{COOKIE, LOCATION};
use reqwest::{Client, Url, redirect};
use tokio::io::AsyncWriteExt;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::node::{Folder, courses_from_json};

/// Callback receiving `(bytes_so_far, total_if_known)` during a transfer.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// An opaque session token accepted by the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Produces a session token.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if no token can be obtained.
    async fn authenticate(&self) -> Result<SessionToken>;
}

/// An authenticator for a token obtained out of band (for example a
/// session cookie copied from a browser).
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    #[must_use]
    pub const fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Authenticator for StaticToken {
    async fn authenticate(&self) -> Result<SessionToken> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(SessionToken(token.to_string())),
            _ => Err(Error::Authentication(
                "no session token configured (set LEARN_SYNC_TOKEN)".to_string(),
            )),
        }
    }
}

/// A course the user is enrolled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub name: String,
    pub id: String,
}

/// Lists courses and fetches their content trees.
#[async_trait]
pub trait CourseSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the course list cannot be fetched.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Fetches the content tree of one course. The returned folder is named
    /// after the course.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be fetched or decoded.
    async fn fetch_course_tree(&self, course: &Course) -> Result<Folder>;
}

/// A course source backed by a JSON snapshot of the catalog, in the same
/// document format the cache uses.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    courses: Vec<Folder>,
}

impl JsonCatalog {
    #[must_use]
    pub const fn new(courses: Vec<Folder>) -> Self {
        Self { courses }
    }

    /// Reads a snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::new(courses_from_json(&json)?))
    }
}

#[async_trait]
impl CourseSource for JsonCatalog {
    async fn list_courses(&self) -> Result<Vec<Course>> {
        Ok(self
            .courses
            .iter()
            .map(|course| Course {
                name: course.name.clone(),
                id: course.name.clone(),
            })
            .collect())
    }

    async fn fetch_course_tree(&self, course: &Course) -> Result<Folder> {
        self.courses
            .iter()
            .find(|folder| folder.name == course.id)
            .cloned()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("course {:?} is not in the catalog", course.name),
                ))
            })
    }
}

/// Fetches every course tree from `source`, in listing order.
///
/// A non-empty `only` restricts the result to courses with those names.
///
/// # Errors
///
/// Returns the first listing or fetch error.
pub async fn fetch_courses(source: &dyn CourseSource, only: &[String]) -> Result<Vec<Folder>> {
    let mut trees = Vec::new();
    for course in source.list_courses().await? {
        if !only.is_empty() && !only.iter().any(|name| *name == course.name) {
            continue;
        }
        log::debug!("Fetching content tree for {}", course.name);
        let mut tree = source.fetch_course_tree(&course).await?;
        tree.name = course.name;
        trees.push(tree);
    }
    Ok(trees)
}

/// Exchanges predownload references for transfer URLs.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Resolves a regular file reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] if the reference cannot be resolved.
    async fn resolve_file_link(&self, predownload_link: &str) -> Result<String>;

    /// Resolves a recorded lecture reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] if the reference cannot be resolved.
    async fn resolve_lecture_link(&self, predownload_link: &str) -> Result<String>;
}

/// Streams a resolved URL to a local path.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Writes the body at `url` to `destination`, reporting progress as it
    /// goes. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    async fn transfer(&self, url: &str, destination: &Path, progress: ProgressFn<'_>)
    -> Result<u64>;
}

/// Everything the download orchestrator needs from the platform.
pub trait Remote: LinkResolver + Transfer {}

impl<T: LinkResolver + Transfer> Remote for T {}

/// Derives a local filename from the last path segment of a URL.
///
/// Percent-escapes are decoded. Returns `None` when the URL has no usable
/// last segment.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}

/// Resolution and transfer over HTTP.
///
/// Predownload references are relative to the configured base URL. The
/// platform answers them with a redirect whose `Location` is the transfer
/// URL, so resolution uses a client that does not follow redirects.
pub struct HttpRemote {
    base_url: Url,
    cookie: String,
    resolve_client: Client,
    transfer_client: Client,
}

impl HttpRemote {
    /// Builds HTTP clients from the remote configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or a client cannot be built.
    pub fn new(config: &RemoteConfig, token: &SessionToken) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {:?}: {e}", config.base_url)))?;
        let resolve_client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;
        let transfer_client = Client::builder()
            .connect_timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            base_url,
            cookie: format!("{}={}", config.session_cookie, token.as_str()),
            resolve_client,
            transfer_client,
        })
    }

    async fn follow_redirect(&self, reference: &str) -> Result<String> {
        let resolution_error = |message: String| Error::Resolution {
            reference: reference.to_string(),
            message,
        };

        let url = self
            .base_url
            .join(reference)
            .map_err(|e| resolution_error(e.to_string()))?;
        let response = self
            .resolve_client
            .get(url.clone())
            .header(COOKIE, &self.cookie)
            .send()
            .await?;

        let status = response.status();
        if !status.is_redirection() {
            return Err(resolution_error(format!("expected a redirect, got {status}")));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| resolution_error("redirect without a Location header".to_string()))?;
        let target = url
            .join(location)
            .map_err(|e| resolution_error(e.to_string()))?;
        log::debug!("Resolved {reference} -> {target}");
        Ok(target.into())
    }
}

#[async_trait]
impl LinkResolver for HttpRemote {
    async fn resolve_file_link(&self, predownload_link: &str) -> Result<String> {
        self.follow_redirect(predownload_link).await
    }

    async fn resolve_lecture_link(&self, predownload_link: &str) -> Result<String> {
        self.follow_redirect(predownload_link).await
    }
}

#[async_trait]
impl Transfer for HttpRemote {
    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64> {
        let response = self
            .transfer_client
            .get(url)
            .header(COOKIE, &self.cookie)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transfer {
                url: url.to_string(),
                message: format!("server responded with {status}"),
            });
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress(written, total);
        }
        file.flush().await?;
        Ok(written)
    }
}
