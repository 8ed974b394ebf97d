//! Repository persistence operations.
//!
//! Split into single-record operations ([`single`]), candidate selection for
//! the background-work categories ([`select`]), and the module error type.

mod errors;
mod select;
mod single;

pub use errors::{RepoError, Result};
pub use select::{
    metadata_refresh_candidates, parse_candidates, parse_polling_candidates, tag_candidates,
    usage_candidates,
};
pub use single::{
    clear_abandoned_jobs, find_by_full_name, find_by_id, insert, record_job_submitted,
    stamp_tags_synced, stamp_usage_updated, update_job_handle,
};
