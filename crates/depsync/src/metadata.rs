//! Metadata file discovery.
//!
//! Classifies a repository's file list into the community-health files
//! (readme, license, funding, and friends) and stores the result in the
//! repository's metadata blob. A funding file, when present, is additionally
//! fetched and its YAML stored under `metadata.funding`.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::entity::prelude::{HostModel, RepositoryActiveModel, RepositoryModel};
use crate::host::{HostApi, HostError};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Database(#[from] DbErr),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

// Conventional locations: repository root plus docs/, .github/ and .gitlab/.
const COMMUNITY_DIRS: &str = r"^(docs/)?(\.github/)?(\.gitlab/)?";

static FILE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    let pattern = |re: String| Regex::new(&format!("(?i){re}")).expect("file pattern is valid");
    vec![
        ("readme", pattern("^README".to_string())),
        ("changelog", pattern("^(CHANGE|HISTORY)".to_string())),
        ("contributing", pattern(format!("{COMMUNITY_DIRS}CONTRIBUTING"))),
        ("funding", pattern(format!(r"{COMMUNITY_DIRS}FUNDING\.yml"))),
        ("license", pattern("^(LICENSE|COPYING|MIT-LICENSE)".to_string())),
        (
            "code_of_conduct",
            pattern(format!("{COMMUNITY_DIRS}CODE[-_]OF[-_]CONDUCT")),
        ),
        ("threat_model", pattern("^THREAT[-_]MODEL".to_string())),
        ("audit", pattern("^AUDIT".to_string())),
        ("citation", pattern("^CITATION".to_string())),
        ("codeowners", pattern(format!("{COMMUNITY_DIRS}CODEOWNERS"))),
        ("security", pattern(format!("{COMMUNITY_DIRS}SECURITY"))),
        ("support", pattern(format!("{COMMUNITY_DIRS}SUPPORT$"))),
    ]
});

/// Classify a file list into the known metadata file slots.
///
/// Every slot is present in the result; unmatched slots are null. The first
/// matching file wins per slot.
pub fn classify_metadata_files(file_list: &[String]) -> Map<String, Value> {
    FILE_PATTERNS
        .iter()
        .map(|(key, pattern)| {
            let found = file_list.iter().find(|file| pattern.is_match(file));
            (
                (*key).to_string(),
                found.map_or(Value::Null, |f| Value::String(f.clone())),
            )
        })
        .collect()
}

/// Refresh a repository's metadata blob from its current file list.
///
/// An empty file list leaves the row untouched. A funding file that fails to
/// parse as YAML is recorded in `files` but contributes no `funding` entry.
#[tracing::instrument(skip(db, api, host, repo), fields(repository = %repo.full_name))]
pub async fn update_metadata_files(
    db: &DatabaseConnection,
    api: &dyn HostApi,
    host: &HostModel,
    repo: &RepositoryModel,
) -> Result<()> {
    let file_list = api.get_file_list(host, repo).await?;
    if file_list.is_empty() {
        return Ok(());
    }

    let files = classify_metadata_files(&file_list);
    let funding = match files.get("funding").and_then(Value::as_str) {
        Some(path) => fetch_funding(api, host, repo, path).await?,
        None => None,
    };

    let mut metadata = match &repo.metadata {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    metadata.insert("files".to_string(), Value::Object(files));
    if let Some(funding) = funding {
        metadata.insert("funding".to_string(), funding);
    }

    let model = RepositoryActiveModel {
        id: sea_orm::Unchanged(repo.id),
        metadata: Set(Value::Object(metadata)),
        updated_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    };
    model.update(db).await?;
    Ok(())
}

async fn fetch_funding(
    api: &dyn HostApi,
    host: &HostModel,
    repo: &RepositoryModel,
    path: &str,
) -> Result<Option<Value>> {
    let Some(file) = api.get_file_contents(host, repo, path).await? else {
        return Ok(None);
    };
    match serde_yaml_ng::from_str::<Value>(&file.content) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::warn!(
                repository = %repo.full_name,
                path,
                error = %e,
                "Ignoring unparseable funding file"
            );
            Ok(None)
        }
    }
}
