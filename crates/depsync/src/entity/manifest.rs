//! Manifest entity - one dependency-declaration file belonging to a repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Manifest kind marking direct/lockfile-equivalent declaration files. A
/// dependency is `direct` iff its owning manifest has this kind.
pub const DIRECT_KIND: &str = "manifest";

/// Manifest model.
///
/// Identity is (repository, ecosystem, kind, filepath, sha): a manifest is
/// logically replaced, never updated in place, when its checksum changes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manifests")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning repository.
    pub repository_id: Uuid,

    /// Package-manager namespace (e.g., "npm", "pypi").
    pub ecosystem: String,

    /// Declaration kind ("manifest" for direct files, "lockfile" etc. otherwise).
    pub kind: String,

    /// Path of the file within the repository.
    #[sea_orm(column_type = "Text")]
    pub filepath: String,

    /// Content checksum from the parse service.
    pub sha: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A manifest belongs to a repository.
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id"
    )]
    Repository,
    /// A manifest exclusively owns its dependencies.
    #[sea_orm(has_many = "super::dependency::Entity")]
    Dependencies,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl Related<super::dependency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dependencies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether dependencies declared in this manifest are direct requirements.
    pub fn direct(&self) -> bool {
        self.kind == DIRECT_KIND
    }
}
