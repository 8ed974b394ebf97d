//! Common re-exports for convenient entity usage.

pub use super::dependency::{
    ActiveModel as DependencyActiveModel, Column as DependencyColumn, Entity as Dependency,
    Model as DependencyModel,
};
pub use super::host::{
    ActiveModel as HostActiveModel, Column as HostColumn, Entity as Host, Model as HostModel,
};
pub use super::host_kind::HostKind;
pub use super::manifest::{
    ActiveModel as ManifestActiveModel, Column as ManifestColumn, Entity as Manifest,
    Model as ManifestModel, DIRECT_KIND,
};
pub use super::repository::{
    ActiveModel as RepositoryActiveModel, Column as RepositoryColumn, Entity as Repository,
    Model as RepositoryModel, ParseState,
};
