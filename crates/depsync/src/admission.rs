//! Backpressure-aware job admission control.
//!
//! Each background-work category is bound to a downstream queue and a depth
//! ceiling. Before a dispatch tick enqueues new work for a category, the
//! admission controller compares the queue's current depth against the
//! ceiling. Overload is not an error: new submissions are silently suppressed
//! until depth recedes, and in-flight work is unaffected.

use std::sync::Arc;

use crate::queue::QueueMonitor;

/// The independent background-work categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkCategory {
    DependencyParsing,
    TagDownload,
    UsageUpdate,
    MetadataRefresh,
}

impl WorkCategory {
    pub const ALL: [WorkCategory; 4] = [
        WorkCategory::DependencyParsing,
        WorkCategory::TagDownload,
        WorkCategory::UsageUpdate,
        WorkCategory::MetadataRefresh,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkCategory::DependencyParsing => "dependency-parsing",
            WorkCategory::TagDownload => "tag-download",
            WorkCategory::UsageUpdate => "usage-update",
            WorkCategory::MetadataRefresh => "metadata-refresh",
        }
    }
}

impl std::fmt::Display for WorkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dependency-parsing" | "dependencies" => Ok(WorkCategory::DependencyParsing),
            "tag-download" | "tags" => Ok(WorkCategory::TagDownload),
            "usage-update" | "usage" => Ok(WorkCategory::UsageUpdate),
            "metadata-refresh" | "metadata" => Ok(WorkCategory::MetadataRefresh),
            _ => Err(format!("Unknown work category: {}", s)),
        }
    }
}

/// Per-category admission configuration: the downstream queue name, its depth
/// ceiling, and the selection batch size used by a dispatch tick.
#[derive(Debug, Clone)]
pub struct CategoryLimits {
    pub queue: String,
    pub ceiling: u64,
    pub batch: u64,
}

/// Admission configuration for all categories.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub dependency_parsing: CategoryLimits,
    pub tag_download: CategoryLimits,
    pub usage_update: CategoryLimits,
    pub metadata_refresh: CategoryLimits,
}

impl AdmissionConfig {
    pub fn limits(&self, category: WorkCategory) -> &CategoryLimits {
        match category {
            WorkCategory::DependencyParsing => &self.dependency_parsing,
            WorkCategory::TagDownload => &self.tag_download,
            WorkCategory::UsageUpdate => &self.usage_update,
            WorkCategory::MetadataRefresh => &self.metadata_refresh,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            dependency_parsing: CategoryLimits {
                queue: "dependencies".to_string(),
                ceiling: 2_000,
                batch: 2_000,
            },
            tag_download: CategoryLimits {
                queue: "tags".to_string(),
                ceiling: 5_000,
                batch: 5_000,
            },
            usage_update: CategoryLimits {
                queue: "usage".to_string(),
                ceiling: 2_000,
                batch: 2_000,
            },
            metadata_refresh: CategoryLimits {
                queue: "default".to_string(),
                ceiling: 10_000,
                batch: 5_000,
            },
        }
    }
}

/// Decides whether new units of work may be admitted for a category.
#[derive(Clone)]
pub struct AdmissionController {
    monitor: Arc<dyn QueueMonitor>,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(monitor: Arc<dyn QueueMonitor>, config: AdmissionConfig) -> Self {
        Self { monitor, config }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Whether new work may be enqueued for a category.
    ///
    /// Returns true iff the downstream queue's depth does not exceed the
    /// configured ceiling. A failed depth read denies admission.
    pub async fn can_admit(&self, category: WorkCategory) -> bool {
        let limits = self.config.limits(category);
        match self.monitor.depth(&limits.queue).await {
            Ok(depth) => depth <= limits.ceiling,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    queue = %limits.queue,
                    error = %e,
                    "Queue depth unavailable, denying admission"
                );
                false
            }
        }
    }
}
