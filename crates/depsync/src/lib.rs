//! Depsync - dependency-manifest reconciliation for tracked repositories.
//!
//! This library keeps a database of repositories in sync with what their
//! dependency-declaration files actually say. Parsing happens in an external
//! job service; depsync submits jobs, polls them, and reconciles terminal
//! results into manifest and dependency rows. Scheduling is pull-based: a
//! periodic dispatch tick selects eligible repositories per work category and
//! enqueues them, gated by the depth of the downstream queue.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use depsync::{
//!     connect_and_migrate, AdmissionConfig, AdmissionController, Dispatcher, InMemoryQueue,
//!     WorkCategory,
//! };
//!
//! let db = connect_and_migrate("sqlite://depsync.db?mode=rwc").await?;
//!
//! let queue = InMemoryQueue::new();
//! let admission = AdmissionController::new(Arc::new(queue.clone()), AdmissionConfig::default());
//! let dispatcher = Dispatcher::new(db.clone(), admission, Arc::new(queue.clone()));
//!
//! // One scheduling pass for the dependency-parsing category.
//! let summary = dispatcher.tick(WorkCategory::DependencyParsing).await?;
//! ```

pub mod admission;
pub mod db;
pub mod dispatch;
pub mod entity;
pub mod host;
pub mod http;
pub mod metadata;
pub mod migration;
pub mod parser;
pub mod queue;
pub mod reconcile;
pub mod repo;
pub mod retry;

#[cfg(test)]
mod test_support;

pub use admission::{AdmissionConfig, AdmissionController, CategoryLimits, WorkCategory};
pub use db::{connect, connect_and_migrate};
pub use dispatch::{parse_dependencies, DispatchError, Dispatcher, TickSummary};
pub use entity::prelude::*;
pub use host::{download_url, ArchiveHost, FileContents, HostApi, HostError};
pub use http::{HttpTransport, ReqwestTransport};
pub use metadata::{classify_metadata_files, update_metadata_files, MetadataError};
pub use parser::{ParseClient, ParseOutcome, ParserError};
pub use queue::{InMemoryQueue, QueueError, QueueMonitor, WorkSink};
pub use reconcile::{reconcile, ReconcileError};
pub use repo::RepoError;
