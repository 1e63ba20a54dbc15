//! Wiki creation orchestrator
//!
//! `submit` validates a request, records a queued job and hands execution to
//! a background task, returning immediately. The background task owns the
//! job for its whole lifetime:
//!
//! 1. mark the job running
//! 2. resolve the workspace (explicit id, else the first available team)
//! 3. resolve the doc (create one in a space, or reuse an existing doc)
//! 4. create pages depth-first, each under its parent's new id
//! 5. finish completed, or failed at the first page error
//!
//! Pages created before a failure are left in place; a failed job may have
//! produced a partial wiki.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    JobFailure, JobRecord, JobResult, JobStatus, PageResult, PageStatus, RequestError,
    WikiCreateRequest, WikiPage,
};

use super::clickup_client::{ClientError, DocumentService};
use super::job_store::JobStore;
use super::target_resolver::{resolve_target, ResolvedTarget, TargetError};

/// Interval between status checks for callers that wait on a job
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Status checks before a waiting caller gives up (~3 minutes)
pub const COMPLETION_POLL_ATTEMPTS: u32 = 90;

/// Request rejected before any job was created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] RequestError),

    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Acknowledgement of an accepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedJob {
    pub job_id: Uuid,
    pub total_pages: usize,
}

/// Concrete location pages are written to
struct Placement {
    workspace_id: String,
    doc_id: String,
    created_doc: bool,
    root_parent: Option<String>,
}

#[derive(Clone)]
pub struct WikiBuilder {
    documents: Arc<dyn DocumentService>,
    jobs: JobStore,
}

impl WikiBuilder {
    pub fn new(documents: Arc<dyn DocumentService>, jobs: JobStore) -> Self {
        Self { documents, jobs }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Accept a request and start it in the background
    ///
    /// Validation and target resolution happen here, so a rejected request
    /// never creates a job or touches the remote service.
    pub async fn submit(&self, request: WikiCreateRequest) -> Result<SubmittedJob, SubmitError> {
        request.validate()?;
        let target = resolve_target(&request.target)?;

        let record = JobRecord::new(&request);
        let submitted = SubmittedJob {
            job_id: record.job_id,
            total_pages: record.total_pages,
        };
        self.jobs.insert(record).await;

        tracing::info!(
            job_id = %submitted.job_id,
            doc_name = %request.doc_name,
            total_pages = submitted.total_pages,
            target = ?target,
            "Wiki job queued"
        );

        let builder = self.clone();
        tokio::spawn(async move {
            builder.execute(submitted.job_id, request, target).await;
        });

        Ok(submitted)
    }

    /// Poll a job until it is terminal or `attempts` checks have passed
    ///
    /// Returns the last record seen, which is still running on timeout.
    /// `None` means the job is unknown.
    pub async fn wait_for_completion(
        &self,
        job_id: Uuid,
        interval: Duration,
        attempts: u32,
    ) -> Option<JobRecord> {
        for _ in 0..attempts {
            tokio::time::sleep(interval).await;
            match self.jobs.get(job_id).await {
                Some(record) if record.is_terminal() => return Some(record),
                Some(_) => {}
                None => return None,
            }
        }
        self.jobs.get(job_id).await
    }

    pub async fn status(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.get(job_id).await
    }

    /// All jobs, most recent first
    pub async fn list(&self) -> Vec<JobRecord> {
        self.jobs.list().await
    }

    /// Run a queued job to a terminal state
    pub async fn execute(&self, job_id: Uuid, request: WikiCreateRequest, target: ResolvedTarget) {
        if let Err(e) = self.jobs.transition(job_id, JobStatus::Running).await {
            tracing::error!(job_id = %job_id, error = %e, "Cannot start job");
            return;
        }

        let outcome = self.run(job_id, &request, &target).await;

        let finished = match outcome {
            Ok(result) => {
                tracing::info!(
                    job_id = %job_id,
                    doc_id = %result.doc_id,
                    pages = result.page_ids.len(),
                    "Wiki job completed"
                );
                self.jobs.update(job_id, |record| record.complete(result)).await
            }
            Err(failure) => {
                tracing::error!(
                    job_id = %job_id,
                    error = %failure.message,
                    retryable = failure.retryable,
                    "Wiki job failed"
                );
                self.jobs.update(job_id, |record| record.fail(failure)).await
            }
        };

        match finished {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(job_id = %job_id, error = %e, "Job finish rejected"),
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "Job vanished before finishing"),
        }
    }

    async fn run(
        &self,
        job_id: Uuid,
        request: &WikiCreateRequest,
        target: &ResolvedTarget,
    ) -> Result<JobResult, JobFailure> {
        let placement = self.place(job_id, request, target).await?;

        let page_ids = self
            .upload_tree(
                job_id,
                &placement.workspace_id,
                &placement.doc_id,
                placement.root_parent.clone(),
                &request.pages,
            )
            .await?;

        Ok(JobResult {
            workspace_id: placement.workspace_id,
            doc_id: placement.doc_id,
            created_doc: placement.created_doc,
            page_ids,
        })
    }

    /// Resolve workspace and doc, creating the doc for space targets
    async fn place(
        &self,
        job_id: Uuid,
        request: &WikiCreateRequest,
        target: &ResolvedTarget,
    ) -> Result<Placement, JobFailure> {
        let workspace_id = match target.team_id() {
            Some(id) => id.to_string(),
            None => self.default_workspace().await?,
        };
        self.note(job_id, |record| record.workspace_id = Some(workspace_id.clone()))
            .await;

        let placement = match target {
            ResolvedTarget::Space { space_id, .. } => {
                let doc = self
                    .documents
                    .create_doc(&workspace_id, &request.doc_name, space_id)
                    .await
                    .map_err(|e| failure("failed to create doc", &e))?;
                Placement {
                    workspace_id,
                    doc_id: doc.id,
                    created_doc: true,
                    root_parent: None,
                }
            }
            ResolvedTarget::Doc { doc_id, .. } | ResolvedTarget::Page { doc_id, .. } => {
                match self.documents.get_doc(&workspace_id, doc_id).await {
                    Ok(doc) => {
                        tracing::debug!(job_id = %job_id, doc_id = %doc.id, name = %doc.name, "Target doc verified")
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, doc_id = %doc_id, error = %e, "Could not verify target doc, continuing")
                    }
                }
                let root_parent = match target {
                    ResolvedTarget::Page { page_id, .. } => Some(page_id.clone()),
                    _ => None,
                };
                Placement {
                    workspace_id,
                    doc_id: doc_id.clone(),
                    created_doc: false,
                    root_parent,
                }
            }
        };

        let doc_id = placement.doc_id.clone();
        self.note(job_id, |record| record.doc_id = Some(doc_id)).await;
        Ok(placement)
    }

    async fn default_workspace(&self) -> Result<String, JobFailure> {
        let workspaces = self
            .documents
            .list_workspaces()
            .await
            .map_err(|e| failure("failed to list workspaces", &e))?;

        match workspaces.into_iter().next() {
            Some(ws) => {
                tracing::info!(workspace_id = %ws.id, name = %ws.name, "Auto-detected workspace");
                Ok(ws.id)
            }
            None => Err(JobFailure {
                message: "no ClickUp workspace is available for this API key".to_string(),
                retryable: false,
            }),
        }
    }

    /// Create every page, parents before children and siblings in order
    ///
    /// Uses an explicit stack so tree depth never grows the call stack.
    async fn upload_tree(
        &self,
        job_id: Uuid,
        workspace_id: &str,
        doc_id: &str,
        root_parent: Option<String>,
        pages: &[WikiPage],
    ) -> Result<Vec<String>, JobFailure> {
        let mut created = Vec::new();
        let mut stack: Vec<(Vec<usize>, &WikiPage, Option<String>)> = pages
            .iter()
            .enumerate()
            .rev()
            .map(|(i, page)| (vec![i], page, root_parent.clone()))
            .collect();

        while let Some((path, page, parent)) = stack.pop() {
            let result = self
                .documents
                .create_page(workspace_id, doc_id, &page.title, &page.content, parent.as_deref())
                .await;

            match result {
                Ok(remote) => {
                    tracing::info!(
                        job_id = %job_id,
                        page_id = %remote.id,
                        title = %page.title,
                        depth = path.len() - 1,
                        "Created page"
                    );
                    let id = remote.id.clone();
                    self.note(job_id, |record| {
                        mark_page(record, &path, PageStatus::Uploaded, Some(id), None);
                        record.uploaded += 1;
                    })
                    .await;

                    for (i, child) in page.children.iter().enumerate().rev() {
                        let mut child_path = path.clone();
                        child_path.push(i);
                        stack.push((child_path, child, Some(remote.id.clone())));
                    }
                    created.push(remote.id);
                }
                Err(e) => {
                    let job_failure = failure(&format!("failed to create page '{}'", page.title), &e);
                    let message = e.to_string();
                    self.note(job_id, |record| {
                        mark_page(record, &path, PageStatus::Failed, None, Some(message));
                    })
                    .await;
                    return Err(job_failure);
                }
            }
        }

        Ok(created)
    }

    /// Record progress on the job; a missing job is logged, not fatal
    async fn note(&self, job_id: Uuid, edit: impl FnOnce(&mut JobRecord)) {
        if let Err(e) = self.jobs.update(job_id, edit).await {
            tracing::warn!(job_id = %job_id, error = %e, "Progress update dropped");
        }
    }
}

fn mark_page(
    record: &mut JobRecord,
    path: &[usize],
    status: PageStatus,
    page_id: Option<String>,
    error: Option<String>,
) {
    if let Some(node) = PageResult::at_path_mut(&mut record.pages, path) {
        node.status = status;
        node.page_id = page_id;
        node.error = error;
    }
}

fn failure(context: &str, err: &ClientError) -> JobFailure {
    JobFailure {
        message: format!("{}: {}", context, err),
        retryable: err.is_retryable(),
    }
}
