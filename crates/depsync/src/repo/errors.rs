use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during repository persistence operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Repository not found.
    #[error("Repository not found: {context}")]
    NotFound { context: String },
}

impl RepoError {
    /// Create a NotFound error for a UUID lookup.
    pub fn not_found_by_id(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("id={}", id),
        }
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
