use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

use super::error::{ParserError, Result};
use super::types::{JobResponse, ParseOutcome};

/// Client for the parse service's job API.
pub struct ParseClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl ParseClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a repository archive for parsing.
    ///
    /// Returns the job handle to store on the repository row. The submission
    /// response carries a status too, but it is ignored here; the job's result
    /// is collected by [`ParseClient::poll`] on a later tick.
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, download_url: &str) -> Result<String> {
        let url = format!(
            "{}/api/v1/jobs?url={}",
            self.base_url,
            urlencoding::encode(download_url)
        );
        let job: JobResponse = self.send_json(HttpMethod::Post, url).await?;
        job.id.ok_or_else(|| {
            ParserError::MalformedPayload("job submission response without an id".to_string())
        })
    }

    /// Check the status of a previously submitted job.
    #[tracing::instrument(skip(self))]
    pub async fn poll(&self, job_id: &str) -> Result<ParseOutcome> {
        let url = format!("{}/api/v1/jobs/{}", self.base_url, job_id);
        let job: JobResponse = self.send_json(HttpMethod::Get, url).await?;
        job.into_outcome()
    }

    async fn send_json<T: DeserializeOwned>(&self, method: HttpMethod, url: String) -> Result<T> {
        let resp: HttpResponse = self.transport.send(HttpRequest { method, url }).await?;
        if !resp.success() {
            return Err(ParserError::Status {
                status: resp.status,
            });
        }
        serde_json::from_slice(&resp.body)
            .map_err(|e| ParserError::MalformedPayload(e.to_string()))
    }
}
