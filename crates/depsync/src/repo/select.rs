//! Candidate selection for the background-work categories.
//!
//! Each function returns an ordered, capped batch of repository identifiers
//! eligible for one category of work. Selection never returns a repository
//! already carrying unresolved in-flight state for that category: new-parse
//! selection excludes repositories with a live job handle, and polling
//! selection returns only those.

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, NullOrdering},
};
use uuid::Uuid;

use crate::entity::repository::{Column, Entity as Repository};

use super::errors::{RepoError, Result};

/// Repositories eligible for a fresh parse-job submission.
///
/// Healthy non-forks with no prior parse attempt: both
/// `dependencies_parsed_at` and `dependency_job_id` are null.
pub async fn parse_candidates(db: &DatabaseConnection, limit: u64) -> Result<Vec<Uuid>> {
    Repository::find()
        .filter(Column::Status.is_null())
        .filter(Column::Fork.eq(false))
        .filter(Column::DependenciesParsedAt.is_null())
        .filter(Column::DependencyJobId.is_null())
        .select_only()
        .column(Column::Id)
        .limit(limit)
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(RepoError::from)
}

/// Repositories with an outstanding parse job whose status should be polled.
pub async fn parse_polling_candidates(db: &DatabaseConnection, limit: u64) -> Result<Vec<Uuid>> {
    Repository::find()
        .filter(Column::DependencyJobId.is_not_null())
        .select_only()
        .column(Column::Id)
        .limit(limit)
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(RepoError::from)
}

/// Repositories due for a tag download, oldest sync first with never-synced
/// repositories taking priority.
pub async fn tag_candidates(db: &DatabaseConnection, limit: u64) -> Result<Vec<Uuid>> {
    Repository::find()
        .filter(Column::Status.is_null())
        .filter(Column::Fork.eq(false))
        .order_by_with_nulls(Column::TagsLastSyncedAt, Order::Asc, NullOrdering::First)
        .select_only()
        .column(Column::Id)
        .limit(limit)
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(RepoError::from)
}

/// Repositories due for a package-usage recomputation, oldest first, nulls
/// first.
pub async fn usage_candidates(db: &DatabaseConnection, limit: u64) -> Result<Vec<Uuid>> {
    Repository::find()
        .filter(Column::Status.is_null())
        .filter(Column::Fork.eq(false))
        .order_by_with_nulls(Column::UsageUpdatedAt, Order::Asc, NullOrdering::First)
        .select_only()
        .column(Column::Id)
        .limit(limit)
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(RepoError::from)
}

/// Repositories whose metadata blob is still the empty object.
///
/// The serialized length of `{}` is 2; the cast keeps the predicate portable
/// across the sqlite and postgres backends.
pub async fn metadata_refresh_candidates(db: &DatabaseConnection, limit: u64) -> Result<Vec<Uuid>> {
    Repository::find()
        .filter(Column::Status.is_null())
        .filter(Column::Fork.eq(false))
        .filter(Expr::cust("length(CAST(metadata AS TEXT)) = 2"))
        .select_only()
        .column(Column::Id)
        .limit(limit)
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .map_err(RepoError::from)
}
