//! Initial migration to create the depsync database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_hosts(manager).await?;
        self.create_repositories(manager).await?;
        self.create_manifests(manager).await?;
        self.create_dependencies(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Dependencies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Manifests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Hosts::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_hosts(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Hosts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Hosts::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Hosts::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Hosts::Kind).string().not_null())
                    .col(ColumnDef::new(Hosts::Url).text().not_null())
                    .col(
                        ColumnDef::new(Hosts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repositories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repositories::HostId).uuid().not_null())
                    .col(ColumnDef::new(Repositories::FullName).string().not_null())
                    .col(ColumnDef::new(Repositories::Owner).string().not_null())
                    .col(
                        ColumnDef::new(Repositories::DefaultBranch)
                            .string()
                            .not_null()
                            .default("main"),
                    )
                    .col(
                        ColumnDef::new(Repositories::Fork)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Repositories::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Repositories::Status).string().null())
                    .col(
                        ColumnDef::new(Repositories::DependenciesParsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::DependencyJobId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::DependencyJobStartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::TagsLastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::UsageUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::Metadata)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(Repositories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repositories_host_id")
                            .from(Repositories::Table, Repositories::HostId)
                            .to(Hosts::Table, Hosts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_host_full_name")
                    .table(Repositories::Table)
                    .col(Repositories::HostId)
                    .col(Repositories::FullName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Candidate-selection access paths.
        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_parse_candidates")
                    .table(Repositories::Table)
                    .col(Repositories::Status)
                    .col(Repositories::Fork)
                    .col(Repositories::DependenciesParsedAt)
                    .col(Repositories::DependencyJobId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_tags_last_synced_at")
                    .table(Repositories::Table)
                    .col(Repositories::TagsLastSyncedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_usage_updated_at")
                    .table(Repositories::Table)
                    .col(Repositories::UsageUpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_manifests(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Manifests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Manifests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Manifests::RepositoryId).uuid().not_null())
                    .col(ColumnDef::new(Manifests::Ecosystem).string().not_null())
                    .col(ColumnDef::new(Manifests::Kind).string().not_null())
                    .col(ColumnDef::new(Manifests::Filepath).text().not_null())
                    .col(ColumnDef::new(Manifests::Sha).string().not_null())
                    .col(
                        ColumnDef::new(Manifests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_manifests_repository_id")
                            .from(Manifests::Table, Manifests::RepositoryId)
                            .to(Repositories::Table, Repositories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Manifest identity key: a manifest is replaced, not updated in place.
        manager
            .create_index(
                Index::create()
                    .name("idx_manifests_identity")
                    .table(Manifests::Table)
                    .col(Manifests::RepositoryId)
                    .col(Manifests::Ecosystem)
                    .col(Manifests::Kind)
                    .col(Manifests::Filepath)
                    .col(Manifests::Sha)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_dependencies(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Dependencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Dependencies::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Dependencies::ManifestId).uuid().not_null())
                    .col(
                        ColumnDef::new(Dependencies::RepositoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Dependencies::PackageName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Dependencies::Ecosystem).string().not_null())
                    .col(ColumnDef::new(Dependencies::Requirements).string().null())
                    .col(ColumnDef::new(Dependencies::Kind).string().null())
                    .col(
                        ColumnDef::new(Dependencies::Direct)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Dependencies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dependencies_manifest_id")
                            .from(Dependencies::Table, Dependencies::ManifestId)
                            .to(Manifests::Table, Manifests::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dependencies_repository_id")
                            .from(Dependencies::Table, Dependencies::RepositoryId)
                            .to(Repositories::Table, Repositories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dependencies_manifest_id")
                    .table(Dependencies::Table)
                    .col(Dependencies::ManifestId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_dependencies_package_name")
                    .table(Dependencies::Table)
                    .col(Dependencies::Ecosystem)
                    .col(Dependencies::PackageName)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum Hosts {
    Table,
    Id,
    Name,
    Kind,
    Url,
    CreatedAt,
}

#[derive(Iden)]
enum Repositories {
    Table,
    Id,
    HostId,
    FullName,
    Owner,
    DefaultBranch,
    Fork,
    Archived,
    Status,
    DependenciesParsedAt,
    DependencyJobId,
    DependencyJobStartedAt,
    TagsLastSyncedAt,
    UsageUpdatedAt,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Manifests {
    Table,
    Id,
    RepositoryId,
    Ecosystem,
    Kind,
    Filepath,
    Sha,
    CreatedAt,
}

#[derive(Iden)]
enum Dependencies {
    Table,
    Id,
    ManifestId,
    RepositoryId,
    PackageName,
    Ecosystem,
    Requirements,
    Kind,
    Direct,
    CreatedAt,
}
