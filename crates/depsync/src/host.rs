//! Host collaborator: archive download URLs and remote file access.
//!
//! The core pipeline never speaks a code-host's API directly. The only
//! host-specific knowledge is how to form a tarball download URL for a
//! repository; file listings and file contents come from the archive service,
//! which takes that URL and inspects the tarball server-side.

use std::sync::Arc;

use async_trait::async_trait;
use backon::Retryable;
use serde::Deserialize;
use thiserror::Error;

use crate::entity::prelude::{HostKind, HostModel, RepositoryModel};
use crate::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::default_backoff;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Archive service unreachable: {0}")]
    Http(#[from] HttpError),

    #[error("Archive service returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed archive service payload: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Tarball download URL for a repository's default branch.
///
/// This is the value handed to the parse and archive services; they fetch the
/// tarball themselves.
pub fn download_url(host: &HostModel, repo: &RepositoryModel) -> String {
    let base = host.url.trim_end_matches('/');
    let branch = &repo.default_branch;
    match host.kind {
        HostKind::GitHub => format!(
            "https://codeload.github.com/{}/tar.gz/{}",
            repo.full_name, branch
        ),
        HostKind::GitLab => format!(
            "{}/{}/-/archive/{}/{}-{}.tar.gz",
            base,
            repo.full_name,
            branch,
            repo.project_slug(),
            branch
        ),
        HostKind::Gitea => format!("{}/{}/archive/{}.tar.gz", base, repo.full_name, branch),
    }
}

/// A single file fetched from a repository archive.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileContents {
    pub name: Option<String>,
    pub content: String,
    pub sha: Option<String>,
}

/// Read access to a repository's files, independent of host kind.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// List all file paths in the repository's default-branch archive.
    async fn get_file_list(&self, host: &HostModel, repo: &RepositoryModel) -> Result<Vec<String>>;

    /// Fetch one file from the archive. `None` when the file does not exist.
    async fn get_file_contents(
        &self,
        host: &HostModel,
        repo: &RepositoryModel,
        path: &str,
    ) -> Result<Option<FileContents>>;
}

/// [`HostApi`] implementation backed by the archive service.
pub struct ArchiveHost {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl ArchiveHost {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn list_url(&self, download_url: &str) -> String {
        format!(
            "{}/api/v1/archives/list?url={}",
            self.base_url,
            urlencoding::encode(download_url)
        )
    }

    fn contents_url(&self, download_url: &str, path: &str) -> String {
        format!(
            "{}/api/v1/archives/contents?url={}&path={}",
            self.base_url,
            urlencoding::encode(download_url),
            urlencoding::encode(path)
        )
    }

    /// GET with retry on transport-level failures only; HTTP status codes are
    /// the caller's business.
    async fn get(&self, url: String) -> Result<HttpResponse> {
        let request = || async {
            self.transport
                .send(HttpRequest {
                    method: HttpMethod::Get,
                    url: url.clone(),
                })
                .await
        };
        let resp = request
            .retry(default_backoff())
            .when(|e| matches!(e, HttpError::Transport(_)))
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl HostApi for ArchiveHost {
    #[tracing::instrument(skip(self, host, repo), fields(repository = %repo.full_name))]
    async fn get_file_list(&self, host: &HostModel, repo: &RepositoryModel) -> Result<Vec<String>> {
        let url = self.list_url(&download_url(host, repo));
        let resp = self.get(url).await?;
        if !resp.success() {
            return Err(HostError::Status {
                status: resp.status,
            });
        }
        serde_json::from_slice(&resp.body).map_err(|e| HostError::Malformed(e.to_string()))
    }

    #[tracing::instrument(skip(self, host, repo), fields(repository = %repo.full_name))]
    async fn get_file_contents(
        &self,
        host: &HostModel,
        repo: &RepositoryModel,
        path: &str,
    ) -> Result<Option<FileContents>> {
        let url = self.contents_url(&download_url(host, repo), path);
        let resp = self.get(url).await?;
        if resp.status == 404 {
            return Ok(None);
        }
        if !resp.success() {
            return Err(HostError::Status {
                status: resp.status,
            });
        }
        let contents: FileContents =
            serde_json::from_slice(&resp.body).map_err(|e| HostError::Malformed(e.to_string()))?;
        Ok(Some(contents))
    }
}
