//! Host entity - a specific deployment of a hosting provider.
//!
//! A host is a concrete forge deployment such as `github.com`, `gitlab.com`,
//! or a self-hosted Gitea. Repositories always belong to exactly one host;
//! provider-specific behavior is selected by the tagged `kind` field.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::host_kind::HostKind;

/// Host model - tracks forge deployments repositories are mirrored from.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hosts")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User-friendly name (e.g., "GitHub", "codeberg.org"). Unique.
    #[sea_orm(unique)]
    pub name: String,

    /// The kind of forge software this host runs.
    pub kind: HostKind,

    /// Base URL for the host (e.g., "https://github.com").
    #[sea_orm(column_type = "Text")]
    pub url: String,

    /// When this host was first configured.
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A host has many repositories.
    #[sea_orm(has_many = "super::repository::Entity")]
    Repositories,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repositories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
