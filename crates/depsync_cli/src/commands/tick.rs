use std::sync::Arc;
use std::time::Duration;

use depsync::entity::prelude::Host;
use depsync::{
    parse_dependencies, update_metadata_files, AdmissionController, ArchiveHost, Dispatcher,
    InMemoryQueue, ParseClient, ReqwestTransport, WorkCategory,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::config::Config;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Run one dispatch tick, then work the in-process queues.
///
/// The CLI runs in single-process mode: the tick enqueues into an in-memory
/// queue and the same invocation immediately consumes the dependency-parsing
/// and metadata-refresh queues. Tag and usage ids are selected and counted but
/// left to external workers.
pub(crate) async fn handle_tick(
    config: &Config,
    database_url: &str,
    category: Option<WorkCategory>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = depsync::connect(database_url).await?;

    let queue = InMemoryQueue::new();
    let admission = AdmissionController::new(Arc::new(queue.clone()), config.admission_config());
    let dispatcher = Dispatcher::new(db.clone(), admission, Arc::new(queue.clone()))
        .with_max_job_age(chrono::Duration::hours(config.jobs.max_age_hours));

    let summaries = match category {
        Some(category) => vec![dispatcher.tick(category).await?],
        None => dispatcher.tick_all().await?,
    };
    for summary in &summaries {
        println!(
            "{}: admitted={} enqueued={} polls={} abandoned_cleared={}",
            summary.category,
            summary.admitted,
            summary.enqueued,
            summary.polls_enqueued,
            summary.abandoned_cleared
        );
    }

    let transport = Arc::new(ReqwestTransport::with_timeout(HTTP_TIMEOUT)?);
    let parser = ParseClient::new(config.services.parser_url.clone(), transport.clone());
    let archive = ArchiveHost::new(config.services.archives_url.clone(), transport);

    let dependency_queue = &config.admission.dependencies.queue;
    for repo_id in queue.drain(dependency_queue) {
        parse_dependencies(&db, &parser, repo_id).await?;
    }

    let metadata_queue = &config.admission.metadata.queue;
    for repo_id in queue.drain(metadata_queue) {
        refresh_metadata(&db, &archive, repo_id).await?;
    }

    let tags = queue.drain(&config.admission.tags.queue).len();
    let usage = queue.drain(&config.admission.usage.queue).len();
    if tags + usage > 0 {
        tracing::info!(
            tags,
            usage,
            "Tag and usage candidates selected; left to external workers"
        );
    }

    Ok(())
}

async fn refresh_metadata(
    db: &DatabaseConnection,
    archive: &ArchiveHost,
    repo_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(repo) = depsync::repo::find_by_id(db, repo_id).await? else {
        return Ok(());
    };
    let Some(host) = Host::find_by_id(repo.host_id).one(db).await? else {
        return Ok(());
    };
    if let Err(e) = update_metadata_files(db, archive, &host, &repo).await {
        tracing::warn!(
            repository = %repo.full_name,
            error = %e,
            "Metadata refresh failed, will retry on a later tick"
        );
    }
    Ok(())
}
