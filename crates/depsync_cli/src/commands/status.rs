use depsync::entity::prelude::{Repository, RepositoryColumn};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// Print parse-state counts for the repository table.
pub(crate) async fn handle_status(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = depsync::connect(database_url).await?;

    let total = Repository::find().count(&db).await?;
    let excluded = Repository::find()
        .filter(RepositoryColumn::Status.is_not_null())
        .count(&db)
        .await?;
    let never_attempted = Repository::find()
        .filter(RepositoryColumn::Status.is_null())
        .filter(RepositoryColumn::Fork.eq(false))
        .filter(RepositoryColumn::DependenciesParsedAt.is_null())
        .filter(RepositoryColumn::DependencyJobId.is_null())
        .count(&db)
        .await?;
    let outstanding = Repository::find()
        .filter(RepositoryColumn::DependencyJobId.is_not_null())
        .count(&db)
        .await?;
    let parsed = Repository::find()
        .filter(RepositoryColumn::DependenciesParsedAt.is_not_null())
        .filter(RepositoryColumn::DependencyJobId.is_null())
        .count(&db)
        .await?;

    println!("Repositories:        {total}");
    println!("  excluded (status): {excluded}");
    println!("  never parsed:      {never_attempted}");
    println!("  jobs outstanding:  {outstanding}");
    println!("  parsed:            {parsed}");

    Ok(())
}
