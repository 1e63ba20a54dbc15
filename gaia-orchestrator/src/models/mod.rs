//! Data models for gaia-orchestrator
//!
//! - Canonical wiki creation request (page tree + target)
//! - Background job state tracking

pub mod job;
pub mod wiki_request;

pub use job::{
    InvalidTransition, JobFailure, JobRecord, JobResult, JobStatus, PageResult, PageStatus,
};
pub use wiki_request::{
    count_pages, RequestError, TargetLocation, WikiCreateRequest, WikiPage, DEFAULT_DOC_NAME,
};
