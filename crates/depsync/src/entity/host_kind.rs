//! Host kind enum for type-safe hosting provider handling.
//!
//! This represents the *type* of forge software a host runs, not a specific
//! deployment. For deployment-specific data, see the `host` entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supported hosting provider kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum HostKind {
    /// GitHub (github.com or GitHub Enterprise)
    #[sea_orm(string_value = "github")]
    GitHub,
    /// GitLab (gitlab.com or self-hosted GitLab)
    #[sea_orm(string_value = "gitlab")]
    GitLab,
    /// Gitea or Forgejo (includes Codeberg and other instances)
    #[sea_orm(string_value = "gitea")]
    Gitea,
}

impl std::fmt::Display for HostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostKind::GitHub => write!(f, "github"),
            HostKind::GitLab => write!(f, "gitlab"),
            HostKind::Gitea => write!(f, "gitea"),
        }
    }
}

impl std::str::FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(HostKind::GitHub),
            "gitlab" => Ok(HostKind::GitLab),
            "gitea" | "forgejo" | "codeberg" => Ok(HostKind::Gitea),
            _ => Err(format!("Unknown host kind: {}", s)),
        }
    }
}
