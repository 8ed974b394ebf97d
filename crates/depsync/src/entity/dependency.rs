//! Dependency entity - one package requirement declared inside a manifest.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dependency model.
///
/// Created in bulk alongside manifest creation and destroyed transitively when
/// the owning manifest is destroyed; there is no independent lifecycle. The
/// `repository_id` is denormalized for query efficiency.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dependencies")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning manifest.
    pub manifest_id: Uuid,

    /// Owning repository (denormalized from the manifest).
    pub repository_id: Uuid,

    /// Package name, trimmed of surrounding whitespace.
    pub package_name: String,

    /// Package-manager namespace, copied from the owning manifest.
    pub ecosystem: String,

    /// Version requirement / constraint string.
    pub requirements: Option<String>,

    /// Requirement kind (e.g., "runtime", "development", "optional").
    pub kind: Option<String>,

    /// True iff the owning manifest's kind is "manifest".
    #[sea_orm(default_value = false)]
    pub direct: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A dependency belongs to a manifest.
    #[sea_orm(
        belongs_to = "super::manifest::Entity",
        from = "Column::ManifestId",
        to = "super::manifest::Column::Id"
    )]
    Manifest,
    /// A dependency belongs to a repository.
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id"
    )]
    Repository,
}

impl Related<super::manifest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manifest.def()
    }
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
