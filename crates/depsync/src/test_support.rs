//! Shared fixtures for unit tests.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use crate::db::connect_and_migrate;
use crate::entity::host::{ActiveModel as HostActiveModel, Model as HostModel};
use crate::entity::host_kind::HostKind;
use crate::entity::repository::{ActiveModel as RepositoryActiveModel, Model as RepositoryModel};

/// Create an in-memory database with the schema applied and one seeded host.
pub async fn setup_db() -> (DatabaseConnection, HostModel) {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("test db should migrate");

    let host = HostActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("test-host-{}", Uuid::new_v4())),
        kind: Set(HostKind::GitHub),
        url: Set("https://github.com".to_string()),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(&db)
    .await
    .expect("host should insert");

    (db, host)
}

/// A healthy, non-fork repository active model with no derived metadata yet.
pub fn repo_model(host_id: Uuid, full_name: &str) -> RepositoryActiveModel {
    let now = Utc::now().fixed_offset();
    RepositoryActiveModel {
        id: Set(Uuid::new_v4()),
        host_id: Set(host_id),
        full_name: Set(full_name.to_string()),
        owner: Set(full_name.split('/').next().unwrap_or(full_name).to_string()),
        default_branch: Set("main".to_string()),
        fork: Set(false),
        archived: Set(false),
        status: Set(None),
        dependencies_parsed_at: Set(None),
        dependency_job_id: Set(None),
        dependency_job_started_at: Set(None),
        tags_last_synced_at: Set(None),
        usage_updated_at: Set(None),
        metadata: Set(serde_json::json!({})),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

/// Insert a healthy repository and return the stored model.
pub async fn seed_repo(
    db: &DatabaseConnection,
    host_id: Uuid,
    full_name: &str,
) -> RepositoryModel {
    crate::repo::insert(db, repo_model(host_id, full_name))
        .await
        .expect("repo should insert")
}
