//! Dispatch ticks and the per-repository parse worker.
//!
//! A tick is the periodic scheduling entrypoint for one work category: it
//! consults the admission controller, selects candidate repositories, and
//! hands their ids to the work sink. Ticks never perform the work itself; the
//! per-repository entrypoints ([`parse_dependencies`]) run in whatever worker
//! consumes the queue.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use thiserror::Error;
use uuid::Uuid;

use crate::admission::{AdmissionController, WorkCategory};
use crate::entity::prelude::Host;
use crate::host;
use crate::parser::ParseClient;
use crate::queue::{QueueError, WorkSink};
use crate::reconcile;
use crate::repo::{self, RepoError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Reconcile(#[from] reconcile::ReconcileError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// What one dispatch tick did for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub category: WorkCategory,
    /// Whether the admission gate allowed new work.
    pub admitted: bool,
    /// New repository ids handed to the sink.
    pub enqueued: usize,
    /// Poll follow-ups for outstanding parse jobs (dependency parsing only).
    pub polls_enqueued: usize,
    /// Abandoned job handles cleared before selection (dependency parsing only).
    pub abandoned_cleared: u64,
}

/// Runs dispatch ticks against a database, an admission controller, and a
/// work sink.
pub struct Dispatcher {
    db: DatabaseConnection,
    admission: AdmissionController,
    sink: Arc<dyn WorkSink>,
    max_job_age: Duration,
}

impl Dispatcher {
    pub fn new(
        db: DatabaseConnection,
        admission: AdmissionController,
        sink: Arc<dyn WorkSink>,
    ) -> Self {
        Self {
            db,
            admission,
            sink,
            max_job_age: Duration::hours(24),
        }
    }

    /// Override how long an outstanding parse job may run before its handle
    /// is abandoned.
    #[must_use]
    pub fn with_max_job_age(mut self, max_job_age: Duration) -> Self {
        self.max_job_age = max_job_age;
        self
    }

    /// Run one tick for every category.
    pub async fn tick_all(&self) -> Result<Vec<TickSummary>> {
        let mut summaries = Vec::with_capacity(WorkCategory::ALL.len());
        for category in WorkCategory::ALL {
            summaries.push(self.tick(category).await?);
        }
        Ok(summaries)
    }

    /// Run one dispatch tick for a category.
    ///
    /// For dependency parsing, poll follow-ups for outstanding jobs are
    /// enqueued before the admission gate is consulted; only brand-new
    /// submissions sit behind the gate.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self, category: WorkCategory) -> Result<TickSummary> {
        let limits = self.admission.config().limits(category).clone();

        let mut abandoned_cleared = 0;
        let mut polls_enqueued = 0;
        if category == WorkCategory::DependencyParsing {
            abandoned_cleared =
                repo::clear_abandoned_jobs(&self.db, Utc::now() - self.max_job_age).await?;

            let polling = repo::parse_polling_candidates(&self.db, limits.batch).await?;
            for id in &polling {
                self.sink.enqueue(&limits.queue, *id).await?;
            }
            polls_enqueued = polling.len();
        }

        let admitted = self.admission.can_admit(category).await;
        let mut enqueued = 0;
        if admitted {
            let candidates = match category {
                WorkCategory::DependencyParsing => {
                    repo::parse_candidates(&self.db, limits.batch).await?
                }
                WorkCategory::TagDownload => repo::tag_candidates(&self.db, limits.batch).await?,
                WorkCategory::UsageUpdate => repo::usage_candidates(&self.db, limits.batch).await?,
                WorkCategory::MetadataRefresh => {
                    repo::metadata_refresh_candidates(&self.db, limits.batch).await?
                }
            };
            for id in &candidates {
                self.sink.enqueue(&limits.queue, *id).await?;
            }
            enqueued = candidates.len();
        }

        let summary = TickSummary {
            category,
            admitted,
            enqueued,
            polls_enqueued,
            abandoned_cleared,
        };
        tracing::info!(
            category = %category,
            admitted,
            enqueued,
            polls_enqueued,
            abandoned_cleared,
            "Dispatch tick complete"
        );
        Ok(summary)
    }
}

/// One parse-cycle step for one repository.
///
/// Submits a job when no handle is outstanding, polls the outstanding job
/// otherwise; never both, and never waits for the service in-process. A
/// service failure is logged and leaves the repository untouched, so it stays
/// selectable on a later tick.
#[tracing::instrument(skip(db, parser))]
pub async fn parse_dependencies(
    db: &DatabaseConnection,
    parser: &ParseClient,
    repo_id: Uuid,
) -> Result<()> {
    let Some(repository) = repo::find_by_id(db, repo_id).await? else {
        tracing::warn!(%repo_id, "Repository vanished before parse step");
        return Ok(());
    };
    if !repository.active() {
        return Ok(());
    }

    match &repository.dependency_job_id {
        Some(job_id) => match parser.poll(job_id).await {
            Ok(outcome) => reconcile::reconcile(db, &repository, outcome).await?,
            Err(e) => {
                tracing::warn!(
                    repository = %repository.full_name,
                    error = %e,
                    "Parse job poll failed, will retry on a later tick"
                );
            }
        },
        None => {
            let Some(host_row) = Host::find_by_id(repository.host_id).one(db).await? else {
                tracing::warn!(repository = %repository.full_name, "Repository has no host row");
                return Ok(());
            };
            let url = host::download_url(&host_row, &repository);
            match parser.submit(&url).await {
                Ok(job_id) => {
                    repo::record_job_submitted(db, repository.id, &job_id, Utc::now()).await?;
                }
                Err(e) => {
                    tracing::warn!(
                        repository = %repository.full_name,
                        error = %e,
                        "Parse job submission failed, will retry on a later tick"
                    );
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sea_orm::{ColumnTrait, QueryFilter};

    use crate::admission::AdmissionConfig;
    use crate::entity::prelude::{Manifest, ManifestColumn};
    use crate::http::{HttpMethod, MockTransport};
    use crate::queue::{InMemoryQueue, QueueMonitor};
    use crate::test_support::{repo_model, seed_repo, setup_db};

    use super::*;

    struct FixedDepth(u64);

    #[async_trait]
    impl QueueMonitor for FixedDepth {
        async fn depth(&self, _queue: &str) -> std::result::Result<u64, QueueError> {
            Ok(self.0)
        }
    }

    fn dispatcher_with_queue(db: &DatabaseConnection) -> (Dispatcher, InMemoryQueue) {
        let queue = InMemoryQueue::new();
        let admission =
            AdmissionController::new(Arc::new(queue.clone()), AdmissionConfig::default());
        let dispatcher = Dispatcher::new(db.clone(), admission, Arc::new(queue.clone()));
        (dispatcher, queue)
    }

    fn dispatcher_with_depth(db: &DatabaseConnection, depth: u64) -> (Dispatcher, InMemoryQueue) {
        let queue = InMemoryQueue::new();
        let admission =
            AdmissionController::new(Arc::new(FixedDepth(depth)), AdmissionConfig::default());
        let dispatcher = Dispatcher::new(db.clone(), admission, Arc::new(queue.clone()));
        (dispatcher, queue)
    }

    #[tokio::test]
    async fn test_tick_enqueues_new_parse_candidates() {
        let (db, host) = setup_db().await;
        let a = seed_repo(&db, host.id, "acme/alpha").await;
        let b = seed_repo(&db, host.id, "acme/beta").await;
        let (dispatcher, queue) = dispatcher_with_queue(&db);

        let summary = dispatcher
            .tick(WorkCategory::DependencyParsing)
            .await
            .expect("tick should succeed");

        assert!(summary.admitted);
        assert_eq!(summary.enqueued, 2);
        assert_eq!(summary.polls_enqueued, 0);

        let mut queued = queue.drain("dependencies");
        queued.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(queued, expected);
    }

    #[tokio::test]
    async fn test_tick_enqueues_polls_even_when_gate_is_closed() {
        let (db, host) = setup_db().await;
        let repo_row = seed_repo(&db, host.id, "acme/alpha").await;
        repo::record_job_submitted(&db, repo_row.id, "job-1", Utc::now())
            .await
            .unwrap();
        seed_repo(&db, host.id, "acme/beta").await;

        let (dispatcher, queue) = dispatcher_with_depth(&db, 1_000_000);
        let summary = dispatcher
            .tick(WorkCategory::DependencyParsing)
            .await
            .expect("tick should succeed");

        assert!(!summary.admitted);
        assert_eq!(summary.polls_enqueued, 1);
        assert_eq!(summary.enqueued, 0);
        assert_eq!(queue.drain("dependencies"), vec![repo_row.id]);
    }

    #[tokio::test]
    async fn test_tick_sweeps_abandoned_handles_before_selection() {
        let (db, host) = setup_db().await;
        let stuck = seed_repo(&db, host.id, "acme/stuck").await;
        repo::record_job_submitted(&db, stuck.id, "job-1", Utc::now() - Duration::days(2))
            .await
            .unwrap();

        let (dispatcher, queue) = dispatcher_with_queue(&db);
        let summary = dispatcher
            .tick(WorkCategory::DependencyParsing)
            .await
            .expect("tick should succeed");

        assert_eq!(summary.abandoned_cleared, 1);
        assert_eq!(summary.polls_enqueued, 0);
        assert_eq!(summary.enqueued, 1);
        assert_eq!(queue.drain("dependencies"), vec![stuck.id]);

        let after = repo::find_by_id(&db, stuck.id).await.unwrap().unwrap();
        assert!(after.dependency_job_id.is_none());
    }

    #[tokio::test]
    async fn test_tick_other_categories_respect_the_gate() {
        let (db, host) = setup_db().await;
        let repo_row = seed_repo(&db, host.id, "acme/alpha").await;

        let (denied, denied_queue) = dispatcher_with_depth(&db, 1_000_000);
        let summary = denied
            .tick(WorkCategory::TagDownload)
            .await
            .expect("tick should succeed");
        assert!(!summary.admitted);
        assert_eq!(summary.enqueued, 0);
        assert!(denied_queue.drain("tags").is_empty());

        let (allowed, allowed_queue) = dispatcher_with_queue(&db);
        let summary = allowed
            .tick(WorkCategory::TagDownload)
            .await
            .expect("tick should succeed");
        assert!(summary.admitted);
        assert_eq!(summary.enqueued, 1);
        assert_eq!(allowed_queue.drain("tags"), vec![repo_row.id]);
    }

    #[tokio::test]
    async fn test_tick_honors_batch_limit() {
        let (db, host) = setup_db().await;
        for name in ["acme/a", "acme/b", "acme/c"] {
            seed_repo(&db, host.id, name).await;
        }

        let queue = InMemoryQueue::new();
        let mut config = AdmissionConfig::default();
        config.dependency_parsing.batch = 1;
        let admission = AdmissionController::new(Arc::new(queue.clone()), config);
        let dispatcher = Dispatcher::new(db.clone(), admission, Arc::new(queue.clone()));

        let summary = dispatcher
            .tick(WorkCategory::DependencyParsing)
            .await
            .expect("tick should succeed");
        assert_eq!(summary.enqueued, 1);
        assert_eq!(queue.drain("dependencies").len(), 1);
    }

    #[tokio::test]
    async fn test_parse_dependencies_submits_when_no_handle() {
        let (db, host) = setup_db().await;
        let repo_row = seed_repo(&db, host.id, "acme/widget").await;

        let transport = MockTransport::new();
        let submit_url = "https://parser.example.com/api/v1/jobs?url=https%3A%2F%2Fcodeload.github.com%2Facme%2Fwidget%2Ftar.gz%2Fmain";
        transport.push_json(
            HttpMethod::Post,
            submit_url,
            serde_json::json!({"id": "job-1", "status": "pending"}),
        );
        let parser = ParseClient::new("https://parser.example.com", Arc::new(transport.clone()));

        parse_dependencies(&db, &parser, repo_row.id)
            .await
            .expect("worker step should succeed");

        let after = repo::find_by_id(&db, repo_row.id).await.unwrap().unwrap();
        assert_eq!(after.dependency_job_id.as_deref(), Some("job-1"));
        assert!(after.dependency_job_started_at.is_some());
        assert_eq!(transport.requests()[0].url, submit_url);
    }

    #[tokio::test]
    async fn test_parse_dependencies_polls_and_reconciles_when_handle_present() {
        let (db, host) = setup_db().await;
        let repo_row = seed_repo(&db, host.id, "acme/widget").await;
        repo::record_job_submitted(&db, repo_row.id, "job-1", Utc::now())
            .await
            .unwrap();

        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            "https://parser.example.com/api/v1/jobs/job-1",
            serde_json::json!({
                "id": "job-1",
                "status": "complete",
                "results": {"manifests": [
                    {"ecosystem": "cargo", "kind": "manifest", "path": "Cargo.toml", "sha": "abc",
                     "dependencies": [{"name": "serde", "requirement": "1", "type": "runtime"}]}
                ]}
            }),
        );
        let parser = ParseClient::new("https://parser.example.com", Arc::new(transport.clone()));

        parse_dependencies(&db, &parser, repo_row.id)
            .await
            .expect("worker step should succeed");

        let after = repo::find_by_id(&db, repo_row.id).await.unwrap().unwrap();
        assert!(after.dependencies_parsed_at.is_some());
        assert!(after.dependency_job_id.is_none());

        let manifests = Manifest::find()
            .filter(ManifestColumn::RepositoryId.eq(repo_row.id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(manifests.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_dependencies_leaves_state_on_transient_failure() {
        let (db, host) = setup_db().await;
        let repo_row = seed_repo(&db, host.id, "acme/widget").await;
        repo::record_job_submitted(&db, repo_row.id, "job-1", Utc::now())
            .await
            .unwrap();

        // No mock route registered: every poll fails at the transport.
        let transport = MockTransport::new();
        let parser = ParseClient::new("https://parser.example.com", Arc::new(transport));

        parse_dependencies(&db, &parser, repo_row.id)
            .await
            .expect("transient failure should not error the worker");

        let after = repo::find_by_id(&db, repo_row.id).await.unwrap().unwrap();
        assert_eq!(after.dependency_job_id.as_deref(), Some("job-1"));
        assert!(after.dependencies_parsed_at.is_none());
    }

    #[tokio::test]
    async fn test_parse_dependencies_skips_inactive_repositories() {
        let (db, host) = setup_db().await;
        let mut model = repo_model(host.id, "acme/widget");
        model.status = sea_orm::Set(Some("removed".to_string()));
        let repo_row = repo::insert(&db, model).await.unwrap();

        let transport = MockTransport::new();
        let parser = ParseClient::new("https://parser.example.com", Arc::new(transport.clone()));

        parse_dependencies(&db, &parser, repo_row.id)
            .await
            .expect("inactive repo should be a no-op");
        assert!(transport.requests().is_empty());
    }
}
