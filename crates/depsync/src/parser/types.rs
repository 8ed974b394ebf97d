//! Wire types for the parse-service job protocol.

use serde::Deserialize;

use super::error::ParserError;

/// One package requirement inside a manifest payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DependencyPayload {
    pub name: Option<String>,
    pub requirement: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl DependencyPayload {
    /// Trimmed package name, if one was declared.
    pub fn trimmed_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Deduplication key within a manifest.
    pub fn dedup_key(&self) -> (Option<String>, Option<&str>, Option<&str>) {
        (
            self.trimmed_name().map(str::to_string),
            self.requirement.as_deref(),
            self.kind.as_deref(),
        )
    }
}

/// One dependency-declaration file in a parse result.
///
/// Older service versions report the ecosystem under `platform`; newer ones
/// under `ecosystem`. Both are accepted, `platform` winning when present.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManifestPayload {
    platform: Option<String>,
    ecosystem: Option<String>,
    pub kind: Option<String>,
    pub path: Option<String>,
    pub sha: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyPayload>,
}

impl ManifestPayload {
    #[cfg(test)]
    pub fn for_tests(
        ecosystem: &str,
        kind: &str,
        path: &str,
        sha: &str,
        dependencies: Vec<DependencyPayload>,
    ) -> Self {
        Self {
            platform: None,
            ecosystem: Some(ecosystem.to_string()),
            kind: Some(kind.to_string()),
            path: Some(path.to_string()),
            sha: Some(sha.to_string()),
            dependencies,
        }
    }

    /// The manifest's package-manager namespace.
    pub fn ecosystem(&self) -> Option<&str> {
        self.platform.as_deref().or(self.ecosystem.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobResults {
    #[serde(default)]
    pub manifests: Vec<ManifestPayload>,
}

/// Raw job response from the service: `{id, status, results?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    pub results: Option<JobResults>,
}

/// Classified outcome of a job status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The job has not reached a terminal state. Carries the handle the
    /// service currently knows the job by; if it differs from the stored one
    /// it must be persisted so future polls target the correct job.
    Pending { job_id: String },
    /// The job completed; the manifest set may be empty.
    Complete { manifests: Vec<ManifestPayload> },
    /// The job failed on the service side. Terminal.
    Errored,
}

impl JobResponse {
    /// Classify the response.
    ///
    /// Only `complete` and `error` are terminal; any other status string is
    /// treated as pending. A pending response without a job id is malformed -
    /// there would be nothing to poll.
    pub fn into_outcome(self) -> Result<ParseOutcome, ParserError> {
        match self.status.as_deref() {
            Some("complete") => Ok(ParseOutcome::Complete {
                manifests: self.results.map(|r| r.manifests).unwrap_or_default(),
            }),
            Some("error") => Ok(ParseOutcome::Errored),
            _ => match self.id {
                Some(job_id) => Ok(ParseOutcome::Pending { job_id }),
                None => Err(ParserError::MalformedPayload(
                    "pending job response without an id".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> JobResponse {
        serde_json::from_value(json).expect("valid job response")
    }

    #[test]
    fn test_outcome_complete_with_manifests() {
        let outcome = response(serde_json::json!({
            "id": "job-1",
            "status": "complete",
            "results": {"manifests": [
                {"ecosystem": "npm", "kind": "manifest", "path": "package.json", "sha": "abc",
                 "dependencies": [{"name": "react", "requirement": "^18", "type": "runtime"}]}
            ]}
        }))
        .into_outcome()
        .expect("outcome");

        match outcome {
            ParseOutcome::Complete { manifests } => {
                assert_eq!(manifests.len(), 1);
                assert_eq!(manifests[0].ecosystem(), Some("npm"));
                assert_eq!(manifests[0].dependencies.len(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_outcome_complete_without_results_is_empty() {
        let outcome = response(serde_json::json!({"id": "job-1", "status": "complete"}))
            .into_outcome()
            .expect("outcome");
        assert_eq!(outcome, ParseOutcome::Complete { manifests: vec![] });
    }

    #[test]
    fn test_outcome_error_is_terminal() {
        let outcome = response(serde_json::json!({"id": "job-1", "status": "error"}))
            .into_outcome()
            .expect("outcome");
        assert_eq!(outcome, ParseOutcome::Errored);
    }

    #[test]
    fn test_unknown_status_is_pending() {
        for status in ["pending", "queued", "working"] {
            let outcome = response(serde_json::json!({"id": "job-9", "status": status}))
                .into_outcome()
                .expect("outcome");
            assert_eq!(
                outcome,
                ParseOutcome::Pending {
                    job_id: "job-9".to_string()
                }
            );
        }
    }

    #[test]
    fn test_pending_without_id_is_malformed() {
        let err = response(serde_json::json!({"status": "pending"}))
            .into_outcome()
            .expect_err("missing id should be malformed");
        assert!(matches!(err, ParserError::MalformedPayload(_)));
    }

    #[test]
    fn test_platform_field_wins_over_ecosystem() {
        let manifest: ManifestPayload = serde_json::from_value(serde_json::json!({
            "platform": "npm", "ecosystem": "ignored", "kind": "manifest",
            "path": "package.json", "sha": "abc"
        }))
        .expect("valid manifest payload");
        assert_eq!(manifest.ecosystem(), Some("npm"));
    }

    #[test]
    fn test_dependency_trimmed_name_drops_blank_names() {
        let dep = DependencyPayload {
            name: Some("  react ".to_string()),
            requirement: Some("^18".to_string()),
            kind: Some("runtime".to_string()),
        };
        assert_eq!(dep.trimmed_name(), Some("react"));

        let blank = DependencyPayload {
            name: Some("   ".to_string()),
            requirement: None,
            kind: None,
        };
        assert_eq!(blank.trimmed_name(), None);
    }
}
