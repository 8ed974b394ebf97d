//! Client for the external dependency-parsing service.
//!
//! The service exposes an asynchronous job protocol: a submission exchanges a
//! repository download URL for a job handle, and a later status poll exchanges
//! the handle for a terminal result. Submission and polling are independent
//! non-blocking operations invoked on separate dispatch ticks; nothing in this
//! module sleeps or loops waiting for a job to finish.

mod client;
mod error;
mod types;

pub use client::ParseClient;
pub use error::{ParserError, Result};
pub use types::{DependencyPayload, JobResponse, ManifestPayload, ParseOutcome};
