//! Configuration file support for depsync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. Environment variables (prefixed with `DEPSYNC_`, e.g., `DEPSYNC_DATABASE_URL`)
//! 2. Local config file (./depsync.toml)
//! 3. XDG config file (~/.config/depsync/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/depsync/depsync.db` on
//! Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "postgres://localhost/depsync"
//!
//! [services]
//! parser_url = "https://parser.ecosyste.ms"
//! archives_url = "https://archives.ecosyste.ms"
//!
//! [jobs]
//! max_age_hours = 24
//!
//! [admission.dependencies]
//! queue = "dependencies"
//! ceiling = 2000
//! batch = 2000
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use depsync::{AdmissionConfig, CategoryLimits};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// External service endpoints.
    pub services: ServicesConfig,
    /// Parse job lifecycle settings.
    pub jobs: JobsConfig,
    /// Per-category admission settings.
    pub admission: AdmissionSettings,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/depsync/depsync.db` if not specified.
    pub url: Option<String>,
}

/// External service endpoints.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Base URL of the dependency parse service.
    pub parser_url: String,
    /// Base URL of the repository archive service.
    pub archives_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            parser_url: "https://parser.ecosyste.ms".to_string(),
            archives_url: "https://archives.ecosyste.ms".to_string(),
        }
    }
}

/// Parse job lifecycle settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Hours an outstanding parse job may run before its handle is abandoned.
    pub max_age_hours: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { max_age_hours: 24 }
    }
}

/// Admission settings for one work category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySettings {
    /// Downstream queue name.
    pub queue: String,
    /// Queue depth ceiling; new work is suppressed above it.
    pub ceiling: u64,
    /// Selection batch size per dispatch tick.
    pub batch: u64,
}

impl CategorySettings {
    fn new(queue: &str, ceiling: u64, batch: u64) -> Self {
        Self {
            queue: queue.to_string(),
            ceiling,
            batch,
        }
    }

    fn into_limits(self) -> CategoryLimits {
        CategoryLimits {
            queue: self.queue,
            ceiling: self.ceiling,
            batch: self.batch,
        }
    }
}

/// Admission settings for all work categories.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdmissionSettings {
    pub dependencies: CategorySettings,
    pub tags: CategorySettings,
    pub usage: CategorySettings,
    pub metadata: CategorySettings,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            dependencies: CategorySettings::new("dependencies", 2_000, 2_000),
            tags: CategorySettings::new("tags", 5_000, 5_000),
            usage: CategorySettings::new("usage", 2_000, 2_000),
            metadata: CategorySettings::new("default", 10_000, 5_000),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/depsync/config.toml)
    /// 3. Local config file (./depsync.toml)
    /// 4. Environment variables with DEPSYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "depsync") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("depsync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./depsync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., DEPSYNC_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("DEPSYNC")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the file
    /// if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("depsync.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Translate the admission settings into the library's configuration.
    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            dependency_parsing: self.admission.dependencies.clone().into_limits(),
            tag_download: self.admission.tags.clone().into_limits(),
            usage_update: self.admission.usage.clone().into_limits(),
            metadata_refresh: self.admission.metadata.clone().into_limits(),
        }
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/depsync` or `~/.local/state/depsync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "depsync").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
