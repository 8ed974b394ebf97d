use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::entity::repository::{ActiveModel, Column, Entity as Repository, Model};

use super::errors::{RepoError, Result};

// ─── Single Record Operations ────────────────────────────────────────────────

/// Insert a new repository.
///
/// # Errors
/// Returns `RepoError::Database` if the insert fails (e.g., duplicate
/// host + full_name).
pub async fn insert(db: &DatabaseConnection, model: ActiveModel) -> Result<Model> {
    model.insert(db).await.map_err(RepoError::from)
}

/// Find a repository by its UUID.
pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    Repository::find_by_id(id)
        .one(db)
        .await
        .map_err(RepoError::from)
}

/// Find a repository by its natural key (host_id + full_name).
pub async fn find_by_full_name(
    db: &DatabaseConnection,
    host_id: Uuid,
    full_name: &str,
) -> Result<Option<Model>> {
    Repository::find()
        .filter(Column::HostId.eq(host_id))
        .filter(Column::FullName.eq(full_name))
        .one(db)
        .await
        .map_err(RepoError::from)
}

/// Record that a parse job was submitted for a repository.
///
/// Sets the job handle and the submission time. The handle stays in place
/// until the cycle reaches a terminal state or the job is abandoned.
pub async fn record_job_submitted(
    db: &DatabaseConnection,
    id: Uuid,
    job_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let model = ActiveModel {
        id: sea_orm::Unchanged(id),
        dependency_job_id: Set(Some(job_id.to_string())),
        dependency_job_started_at: Set(Some(now.fixed_offset())),
        ..Default::default()
    };
    model.update(db).await?;
    Ok(())
}

/// Replace the stored job handle.
///
/// The parse service can return a different handle for the same submission;
/// it must be persisted so future polls target the correct job.
pub async fn update_job_handle(db: &DatabaseConnection, id: Uuid, job_id: &str) -> Result<()> {
    let model = ActiveModel {
        id: sea_orm::Unchanged(id),
        dependency_job_id: Set(Some(job_id.to_string())),
        ..Default::default()
    };
    model.update(db).await?;
    Ok(())
}

/// Clear job handles older than the cutoff, making their repositories
/// re-selectable for a fresh submission.
///
/// There is no cancellation primitive for an outstanding external job; a
/// stuck job is only ever abandoned. Returns the number of handles cleared.
pub async fn clear_abandoned_jobs(
    db: &DatabaseConnection,
    older_than: DateTime<Utc>,
) -> Result<u64> {
    let result = Repository::update_many()
        .col_expr(Column::DependencyJobId, Expr::value(Option::<String>::None))
        .col_expr(
            Column::DependencyJobStartedAt,
            Expr::value(Option::<DateTime<chrono::FixedOffset>>::None),
        )
        .filter(Column::DependencyJobId.is_not_null())
        .filter(Column::DependencyJobStartedAt.lt(older_than.fixed_offset()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Stamp the time tags were last downloaded for a repository.
pub async fn stamp_tags_synced(db: &DatabaseConnection, id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let model = ActiveModel {
        id: sea_orm::Unchanged(id),
        tags_last_synced_at: Set(Some(now.fixed_offset())),
        ..Default::default()
    };
    model.update(db).await?;
    Ok(())
}

/// Stamp the time package usage was last computed for a repository.
pub async fn stamp_usage_updated(
    db: &DatabaseConnection,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    let model = ActiveModel {
        id: sea_orm::Unchanged(id),
        usage_updated_at: Set(Some(now.fixed_offset())),
        ..Default::default()
    };
    model.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::test_support::{seed_repo, setup_db};

    use super::*;

    #[tokio::test]
    async fn test_record_job_submitted_sets_handle_and_start_time() {
        let (db, host) = setup_db().await;
        let repo = seed_repo(&db, host.id, "org/app").await;
        let now = Utc::now();

        record_job_submitted(&db, repo.id, "job-123", now)
            .await
            .expect("submit should record");

        let found = find_by_id(&db, repo.id)
            .await
            .expect("lookup should succeed")
            .expect("repo should exist");
        assert_eq!(found.dependency_job_id.as_deref(), Some("job-123"));
        assert!(found.dependency_job_started_at.is_some());
    }

    #[tokio::test]
    async fn test_update_job_handle_replaces_handle_only() {
        let (db, host) = setup_db().await;
        let repo = seed_repo(&db, host.id, "org/app").await;
        let now = Utc::now();
        record_job_submitted(&db, repo.id, "job-old", now)
            .await
            .expect("submit should record");

        update_job_handle(&db, repo.id, "job-new")
            .await
            .expect("handle update should succeed");

        let found = find_by_id(&db, repo.id)
            .await
            .expect("lookup should succeed")
            .expect("repo should exist");
        assert_eq!(found.dependency_job_id.as_deref(), Some("job-new"));
        assert!(found.dependency_job_started_at.is_some());
    }

    #[tokio::test]
    async fn test_clear_abandoned_jobs_only_touches_old_handles() {
        let (db, host) = setup_db().await;
        let stuck = seed_repo(&db, host.id, "org/stuck").await;
        let fresh = seed_repo(&db, host.id, "org/fresh").await;

        record_job_submitted(&db, stuck.id, "job-stuck", Utc::now() - Duration::days(2))
            .await
            .expect("submit should record");
        record_job_submitted(&db, fresh.id, "job-fresh", Utc::now())
            .await
            .expect("submit should record");

        let cleared = clear_abandoned_jobs(&db, Utc::now() - Duration::hours(24))
            .await
            .expect("sweep should succeed");
        assert_eq!(cleared, 1);

        let stuck = find_by_id(&db, stuck.id).await.unwrap().unwrap();
        assert!(stuck.dependency_job_id.is_none());
        assert!(stuck.dependency_job_started_at.is_none());

        let fresh = find_by_id(&db, fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.dependency_job_id.as_deref(), Some("job-fresh"));
    }

    #[tokio::test]
    async fn test_find_by_full_name() {
        let (db, host) = setup_db().await;
        seed_repo(&db, host.id, "org/app").await;

        let found = find_by_full_name(&db, host.id, "org/app")
            .await
            .expect("lookup should succeed");
        assert!(found.is_some());

        let missing = find_by_full_name(&db, host.id, "org/other")
            .await
            .expect("lookup should succeed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_stamp_tags_and_usage_timestamps() {
        let (db, host) = setup_db().await;
        let repo = seed_repo(&db, host.id, "org/app").await;
        let now = Utc::now();

        stamp_tags_synced(&db, repo.id, now)
            .await
            .expect("tags stamp should succeed");
        stamp_usage_updated(&db, repo.id, now)
            .await
            .expect("usage stamp should succeed");

        let found = find_by_id(&db, repo.id).await.unwrap().unwrap();
        assert!(found.tags_last_synced_at.is_some());
        assert!(found.usage_updated_at.is_some());
    }
}
