//! Reconciliation of parse results into manifest and dependency rows.
//!
//! A terminal parse outcome is applied in a single transaction: manifests are
//! matched by their identity key (ecosystem, kind, filepath, sha), unchanged
//! ones are left untouched, new ones are created with their dependencies in
//! bulk, and stale ones are destroyed together with their dependencies. The
//! cycle then terminates by stamping `dependencies_parsed_at` and clearing the
//! job handle, all or nothing.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use thiserror::Error;
use uuid::Uuid;

use crate::entity::prelude::{
    Dependency, DependencyActiveModel, DependencyColumn, Manifest, ManifestActiveModel,
    ManifestColumn, ManifestModel, RepositoryActiveModel, RepositoryModel, DIRECT_KIND,
};
use crate::parser::{ManifestPayload, ParseOutcome};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Repo(#[from] crate::repo::RepoError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Apply a parse outcome to a repository.
///
/// Terminal outcomes (`Complete`, `Errored`) finish the parse cycle. A
/// `Pending` outcome only refreshes the stored job handle when the service
/// reports a different one; everything else is left for a later poll.
#[tracing::instrument(skip(db, repo, outcome), fields(repository = %repo.full_name))]
pub async fn reconcile(
    db: &DatabaseConnection,
    repo: &RepositoryModel,
    outcome: ParseOutcome,
) -> Result<()> {
    match outcome {
        ParseOutcome::Pending { job_id } => {
            if repo.dependency_job_id.as_deref() != Some(job_id.as_str()) {
                crate::repo::update_job_handle(db, repo.id, &job_id).await?;
            }
            Ok(())
        }
        ParseOutcome::Errored => apply_terminal(db, repo, Vec::new()).await,
        ParseOutcome::Complete { manifests } => apply_terminal(db, repo, manifests).await,
    }
}

/// Apply a terminal outcome in one transaction.
///
/// An errored job and a completed job with no manifests are equivalent: both
/// clear all derived rows so a repository that dropped its declaration files
/// does not keep phantom dependencies.
async fn apply_terminal(
    db: &DatabaseConnection,
    repo: &RepositoryModel,
    manifests: Vec<ManifestPayload>,
) -> Result<()> {
    let txn = db.begin().await?;

    if manifests.is_empty() {
        let all: Vec<Uuid> = Manifest::find()
            .filter(ManifestColumn::RepositoryId.eq(repo.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        destroy_manifests(&txn, &all).await?;
    } else {
        sync_manifests(&txn, repo.id, &manifests).await?;
        delete_stale_manifests(&txn, repo.id, &manifests).await?;
    }

    finish_cycle(&txn, repo.id).await?;
    txn.commit().await?;
    Ok(())
}

/// Create manifests (and their dependencies) that are not already present.
///
/// A payload matching an existing manifest's identity key is a no-op. Payloads
/// missing an ecosystem, path, or checksum are skipped, as are payloads that
/// declare no dependencies.
async fn sync_manifests<C: ConnectionTrait>(
    conn: &C,
    repository_id: Uuid,
    payloads: &[ManifestPayload],
) -> Result<()> {
    let existing = Manifest::find()
        .filter(ManifestColumn::RepositoryId.eq(repository_id))
        .all(conn)
        .await?;
    let existing_keys: HashSet<(String, String, String, String)> = existing
        .into_iter()
        .map(|m| (m.ecosystem, m.kind, m.filepath, m.sha))
        .collect();

    let now = Utc::now().fixed_offset();

    for payload in payloads {
        let (Some(ecosystem), Some(path), Some(sha)) =
            (payload.ecosystem(), payload.path.as_deref(), payload.sha.as_deref())
        else {
            tracing::warn!(repository_id = %repository_id, "Skipping incomplete manifest payload");
            continue;
        };
        if payload.dependencies.is_empty() {
            continue;
        }
        let kind = payload.kind.clone().unwrap_or_default();

        let key = (
            ecosystem.to_string(),
            kind.clone(),
            path.to_string(),
            sha.to_string(),
        );
        if existing_keys.contains(&key) {
            continue;
        }

        let manifest_id = Uuid::new_v4();
        let manifest = ManifestActiveModel {
            id: Set(manifest_id),
            repository_id: Set(repository_id),
            ecosystem: Set(ecosystem.to_string()),
            kind: Set(kind.clone()),
            filepath: Set(path.to_string()),
            sha: Set(sha.to_string()),
            created_at: Set(now),
        };
        manifest.insert(conn).await?;

        let direct = kind == DIRECT_KIND;
        let mut seen: HashSet<(String, Option<String>, Option<String>)> = HashSet::new();
        let mut rows: Vec<DependencyActiveModel> = Vec::new();
        for dep in &payload.dependencies {
            let Some(name) = dep.trimmed_name() else {
                continue;
            };
            let dedup = (
                name.to_string(),
                dep.requirement.clone(),
                dep.kind.clone(),
            );
            if !seen.insert(dedup) {
                continue;
            }
            rows.push(DependencyActiveModel {
                id: Set(Uuid::new_v4()),
                manifest_id: Set(manifest_id),
                repository_id: Set(repository_id),
                package_name: Set(name.to_string()),
                ecosystem: Set(ecosystem.to_string()),
                requirements: Set(dep.requirement.clone()),
                kind: Set(dep.kind.clone()),
                direct: Set(direct),
                created_at: Set(now),
            });
        }
        if !rows.is_empty() {
            Dependency::insert_many(rows).exec(conn).await?;
        }
    }

    Ok(())
}

/// Remove manifests the latest parse no longer reports, then collapse each
/// surviving (ecosystem, filepath) pair to its most recent manifest.
async fn delete_stale_manifests<C: ConnectionTrait>(
    conn: &C,
    repository_id: Uuid,
    payloads: &[ManifestPayload],
) -> Result<()> {
    let incoming: HashSet<(String, String)> = payloads
        .iter()
        .filter_map(|p| {
            let ecosystem = p.ecosystem()?;
            let path = p.path.as_deref()?;
            Some((ecosystem.to_string(), path.to_string()))
        })
        .collect();

    let existing = Manifest::find()
        .filter(ManifestColumn::RepositoryId.eq(repository_id))
        .all(conn)
        .await?;

    let mut stale: Vec<Uuid> = Vec::new();
    let mut survivors: Vec<ManifestModel> = Vec::new();
    for manifest in existing {
        let key = (manifest.ecosystem.clone(), manifest.filepath.clone());
        if incoming.contains(&key) {
            survivors.push(manifest);
        } else {
            stale.push(manifest.id);
        }
    }

    // Within each surviving pair, the newest manifest wins; older checksums
    // of the same file are superseded.
    survivors.sort_by(|a, b| {
        (&a.ecosystem, &a.filepath, a.created_at, a.id).cmp(&(
            &b.ecosystem,
            &b.filepath,
            b.created_at,
            b.id,
        ))
    });
    let mut iter = survivors.iter().peekable();
    while let Some(manifest) = iter.next() {
        let superseded = iter.peek().is_some_and(|next| {
            next.ecosystem == manifest.ecosystem && next.filepath == manifest.filepath
        });
        if superseded {
            stale.push(manifest.id);
        }
    }

    destroy_manifests(conn, &stale).await
}

/// Delete manifests and their dependencies by id.
///
/// Dependencies are removed explicitly; the schema carries no cascading
/// foreign keys.
async fn destroy_manifests<C: ConnectionTrait>(conn: &C, manifest_ids: &[Uuid]) -> Result<()> {
    if manifest_ids.is_empty() {
        return Ok(());
    }
    Dependency::delete_many()
        .filter(DependencyColumn::ManifestId.is_in(manifest_ids.iter().copied()))
        .exec(conn)
        .await?;
    Manifest::delete_many()
        .filter(ManifestColumn::Id.is_in(manifest_ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(())
}

/// Terminate the parse cycle: stamp the completion time and release the job
/// handle so the repository becomes eligible for a future re-parse.
async fn finish_cycle<C: ConnectionTrait>(conn: &C, repository_id: Uuid) -> Result<()> {
    let now = Utc::now().fixed_offset();
    let model = RepositoryActiveModel {
        id: sea_orm::Unchanged(repository_id),
        dependencies_parsed_at: Set(Some(now)),
        dependency_job_id: Set(None),
        dependency_job_started_at: Set(None),
        updated_at: Set(now),
        ..Default::default()
    };
    model.update(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::entity::prelude::{DependencyModel, ManifestModel, Repository};
    use crate::parser::DependencyPayload;
    use crate::repo;
    use crate::test_support::{seed_repo, setup_db};

    use super::*;

    fn dep(name: &str, requirement: &str, kind: &str) -> DependencyPayload {
        DependencyPayload {
            name: Some(name.to_string()),
            requirement: Some(requirement.to_string()),
            kind: Some(kind.to_string()),
        }
    }

    fn payload(
        ecosystem: &str,
        kind: &str,
        path: &str,
        sha: &str,
        deps: Vec<DependencyPayload>,
    ) -> ManifestPayload {
        ManifestPayload::for_tests(ecosystem, kind, path, sha, deps)
    }

    async fn manifests_of(db: &DatabaseConnection, repo_id: Uuid) -> Vec<ManifestModel> {
        Manifest::find()
            .filter(ManifestColumn::RepositoryId.eq(repo_id))
            .all(db)
            .await
            .expect("manifest query should succeed")
    }

    async fn dependencies_of(db: &DatabaseConnection, repo_id: Uuid) -> Vec<DependencyModel> {
        Dependency::find()
            .filter(DependencyColumn::RepositoryId.eq(repo_id))
            .all(db)
            .await
            .expect("dependency query should succeed")
    }

    async fn reload(db: &DatabaseConnection, id: Uuid) -> RepositoryModel {
        Repository::find_by_id(id)
            .one(db)
            .await
            .expect("lookup should succeed")
            .expect("repo should exist")
    }

    #[tokio::test]
    async fn test_complete_creates_manifests_and_terminates_cycle() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;
        repo::record_job_submitted(&db, seeded.id, "job-1", Utc::now())
            .await
            .unwrap();
        let seeded = reload(&db, seeded.id).await;

        let outcome = ParseOutcome::Complete {
            manifests: vec![payload(
                "npm",
                "manifest",
                "package.json",
                "sha-a",
                vec![dep("react", "^18", "runtime"), dep("jest", "^29", "development")],
            )],
        };
        reconcile(&db, &seeded, outcome).await.expect("reconcile");

        let manifests = manifests_of(&db, seeded.id).await;
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].ecosystem, "npm");
        assert_eq!(manifests[0].sha, "sha-a");

        let deps = dependencies_of(&db, seeded.id).await;
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().all(|d| d.direct));
        assert!(deps.iter().all(|d| d.manifest_id == manifests[0].id));

        let after = reload(&db, seeded.id).await;
        assert!(after.dependencies_parsed_at.is_some());
        assert!(after.dependency_job_id.is_none());
        assert!(after.dependency_job_started_at.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_for_unchanged_manifests() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;

        let outcome = || ParseOutcome::Complete {
            manifests: vec![payload(
                "npm",
                "manifest",
                "package.json",
                "sha-a",
                vec![dep("react", "^18", "runtime")],
            )],
        };
        reconcile(&db, &seeded, outcome()).await.expect("first run");
        let first = manifests_of(&db, seeded.id).await;

        let seeded = reload(&db, seeded.id).await;
        reconcile(&db, &seeded, outcome()).await.expect("second run");
        let second = manifests_of(&db, seeded.id).await;

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(dependencies_of(&db, seeded.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_changed_checksum_replaces_manifest_and_dependencies() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;

        let run = |sha: &str, dep_name: &str| ParseOutcome::Complete {
            manifests: vec![payload(
                "npm",
                "manifest",
                "package.json",
                sha,
                vec![dep(dep_name, "^1", "runtime")],
            )],
        };
        reconcile(&db, &seeded, run("sha-a", "left-pad"))
            .await
            .expect("first run");
        let seeded = reload(&db, seeded.id).await;
        reconcile(&db, &seeded, run("sha-b", "right-pad"))
            .await
            .expect("second run");

        let manifests = manifests_of(&db, seeded.id).await;
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].sha, "sha-b");

        let deps = dependencies_of(&db, seeded.id).await;
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].package_name, "right-pad");
    }

    #[tokio::test]
    async fn test_stale_manifests_are_destroyed_with_dependencies() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;

        reconcile(
            &db,
            &seeded,
            ParseOutcome::Complete {
                manifests: vec![
                    payload("npm", "manifest", "package.json", "sha-a", vec![dep("react", "^18", "runtime")]),
                    payload("cargo", "manifest", "Cargo.toml", "sha-b", vec![dep("serde", "1", "runtime")]),
                ],
            },
        )
        .await
        .expect("first run");

        let seeded = reload(&db, seeded.id).await;
        reconcile(
            &db,
            &seeded,
            ParseOutcome::Complete {
                manifests: vec![payload(
                    "npm",
                    "manifest",
                    "package.json",
                    "sha-a",
                    vec![dep("react", "^18", "runtime")],
                )],
            },
        )
        .await
        .expect("second run");

        let manifests = manifests_of(&db, seeded.id).await;
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].filepath, "package.json");

        let deps = dependencies_of(&db, seeded.id).await;
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].package_name, "react");
    }

    #[tokio::test]
    async fn test_empty_complete_clears_all_derived_rows() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;

        reconcile(
            &db,
            &seeded,
            ParseOutcome::Complete {
                manifests: vec![payload(
                    "npm",
                    "manifest",
                    "package.json",
                    "sha-a",
                    vec![dep("react", "^18", "runtime")],
                )],
            },
        )
        .await
        .expect("seed run");

        let seeded = reload(&db, seeded.id).await;
        reconcile(&db, &seeded, ParseOutcome::Complete { manifests: vec![] })
            .await
            .expect("empty run");

        assert!(manifests_of(&db, seeded.id).await.is_empty());
        assert!(dependencies_of(&db, seeded.id).await.is_empty());
        assert!(reload(&db, seeded.id).await.dependencies_parsed_at.is_some());
    }

    #[tokio::test]
    async fn test_errored_job_terminates_and_clears_rows() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;
        repo::record_job_submitted(&db, seeded.id, "job-1", Utc::now())
            .await
            .unwrap();

        let seeded = reload(&db, seeded.id).await;
        reconcile(&db, &seeded, ParseOutcome::Errored)
            .await
            .expect("errored run");

        let after = reload(&db, seeded.id).await;
        assert!(after.dependencies_parsed_at.is_some());
        assert!(after.dependency_job_id.is_none());
        assert!(manifests_of(&db, seeded.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_dependencies_are_deduped_and_names_trimmed() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;

        let deps = vec![
            dep("react", "^18", "runtime"),
            dep("  react ", "^18", "runtime"),
            dep("react", "^18", "development"),
            DependencyPayload {
                name: Some("   ".to_string()),
                requirement: Some("^1".to_string()),
                kind: Some("runtime".to_string()),
            },
        ];
        reconcile(
            &db,
            &seeded,
            ParseOutcome::Complete {
                manifests: vec![payload("npm", "lockfile", "package-lock.json", "sha-a", deps)],
            },
        )
        .await
        .expect("reconcile");

        let stored = dependencies_of(&db, seeded.id).await;
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|d| d.package_name == "react"));
        assert!(stored.iter().all(|d| !d.direct));
    }

    #[tokio::test]
    async fn test_payload_without_dependencies_creates_nothing() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;

        reconcile(
            &db,
            &seeded,
            ParseOutcome::Complete {
                manifests: vec![payload("npm", "manifest", "package.json", "sha-a", vec![])],
            },
        )
        .await
        .expect("reconcile");

        assert!(manifests_of(&db, seeded.id).await.is_empty());
        assert!(reload(&db, seeded.id).await.dependencies_parsed_at.is_some());
    }

    #[tokio::test]
    async fn test_pending_outcome_updates_changed_handle_only() {
        let (db, host) = setup_db().await;
        let seeded = seed_repo(&db, host.id, "acme/widget").await;
        repo::record_job_submitted(&db, seeded.id, "job-old", Utc::now())
            .await
            .unwrap();

        let seeded = reload(&db, seeded.id).await;
        reconcile(
            &db,
            &seeded,
            ParseOutcome::Pending {
                job_id: "job-new".to_string(),
            },
        )
        .await
        .expect("pending run");

        let after = reload(&db, seeded.id).await;
        assert_eq!(after.dependency_job_id.as_deref(), Some("job-new"));
        assert!(after.dependency_job_started_at.is_some());
        assert!(after.dependencies_parsed_at.is_none());
    }
}
