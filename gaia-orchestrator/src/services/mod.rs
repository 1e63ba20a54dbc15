//! Service modules for wiki ingestion and creation
//!
//! Pure stages (extraction, normalization, target resolution) feed the
//! stateful ones (job store, builder) that talk to ClickUp through the
//! [`DocumentService`] seam.

pub mod clickup_client;
pub mod ingestion;
pub mod job_store;
pub mod payload_extractor;
pub mod payload_normalizer;
pub mod retry_policy;
pub mod target_resolver;
pub mod wiki_builder;

pub use clickup_client::{
    truncate_content, AttemptError, ClickUpClient, ClientError, DocumentService, RemoteDoc,
    RemotePage, TaskText, Workspace, TRUNCATION_NOTICE,
};
pub use ingestion::{handle_webhook, PayloadSource, WebhookOutcome};
pub use job_store::{JobStore, JobStoreError};
pub use payload_extractor::{extract_wiki_json, ExtractError, Extracted, Strategy, TextVariant};
pub use payload_normalizer::{into_request, normalize_payload, NormalizeError};
pub use retry_policy::{PacingGate, RetryPolicy};
pub use target_resolver::{parse_location_url, resolve_target, ResolvedTarget, TargetError};
pub use wiki_builder::{
    SubmitError, SubmittedJob, WikiBuilder, COMPLETION_POLL_ATTEMPTS, COMPLETION_POLL_INTERVAL,
};
