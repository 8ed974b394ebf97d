//! Repository entity - a tracked source-control project mirrored from a host.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Repository model.
///
/// Derived-metadata bookkeeping lives on this row: the dependency parse cycle
/// (`dependency_job_id` / `dependencies_parsed_at`), tag sync and usage
/// timestamps, and the metadata file blob. A non-null `status` means the
/// repository is excluded from all background work (removed/moved/errored
/// upstream).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Reference to the host this repository is mirrored from.
    pub host_id: Uuid,

    /// Full slug name including owner (e.g., "rails/rails").
    pub full_name: String,

    /// Owner login (user or organization).
    pub owner: String,

    /// Default branch name.
    #[sea_orm(default_value = "main")]
    pub default_branch: String,

    /// Whether this is a fork of another repository. Forks are never selected
    /// for background work.
    #[sea_orm(default_value = false)]
    pub fork: bool,

    /// Whether the repository is archived (read-only).
    #[sea_orm(default_value = false)]
    pub archived: bool,

    /// Null = healthy/active. Non-null (e.g., "removed", "moved") excludes the
    /// repository from all admission.
    pub status: Option<String>,

    /// When the last dependency parse cycle reached a terminal state. Null
    /// until the first successful reconciliation.
    pub dependencies_parsed_at: Option<DateTimeWithTimeZone>,

    /// External parse job handle. Present exactly while a parse job is
    /// outstanding; at most one per repository.
    pub dependency_job_id: Option<String>,

    /// When the outstanding parse job was submitted. Used to abandon handles
    /// older than the configured maximum job age.
    pub dependency_job_started_at: Option<DateTimeWithTimeZone>,

    /// When tags were last downloaded from the host.
    pub tags_last_synced_at: Option<DateTimeWithTimeZone>,

    /// When package usage was last computed.
    pub usage_updated_at: Option<DateTimeWithTimeZone>,

    /// Metadata file map (`files`, `funding`). Empty object until the first
    /// metadata refresh.
    #[sea_orm(column_type = "Json")]
    pub metadata: Json,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A repository belongs to a host.
    #[sea_orm(
        belongs_to = "super::host::Entity",
        from = "Column::HostId",
        to = "super::host::Column::Id"
    )]
    Host,
    /// A repository has many manifests.
    #[sea_orm(has_many = "super::manifest::Entity")]
    Manifests,
    /// A repository has many dependencies (denormalized through manifests).
    #[sea_orm(has_many = "super::dependency::Entity")]
    Dependencies,
}

impl Related<super::host::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Host.def()
    }
}

impl Related<super::manifest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manifests.def()
    }
}

impl Related<super::dependency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dependencies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Explicit view of the per-repository dependency parse state machine.
///
/// The durable encoding is the nullable pair (`dependency_job_id`,
/// `dependencies_parsed_at`); this enum names the states so callers do not
/// reason about null combinations directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseState {
    /// No parse attempt has been made.
    NeverAttempted,
    /// A parse job is outstanding with the external service.
    Submitted { job_id: String },
    /// The last cycle reached a terminal state.
    Done { parsed_at: DateTimeWithTimeZone },
}

impl Model {
    /// The repository name without the owner prefix.
    pub fn project_slug(&self) -> &str {
        self.full_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.full_name)
    }

    /// Whether the repository is eligible for background work at all.
    pub fn active(&self) -> bool {
        self.status.is_none() && !self.fork
    }

    /// Current dependency parse state.
    ///
    /// An outstanding job handle wins over a past completion: a repository
    /// being re-parsed reports `Submitted` until the new cycle terminates.
    pub fn parse_state(&self) -> ParseState {
        if let Some(job_id) = &self.dependency_job_id {
            ParseState::Submitted {
                job_id: job_id.clone(),
            }
        } else if let Some(parsed_at) = self.dependencies_parsed_at {
            ParseState::Done { parsed_at }
        } else {
            ParseState::NeverAttempted
        }
    }
}
