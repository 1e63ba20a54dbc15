//! Wiki creation job state machine
//!
//! A job progresses through four states:
//! QUEUED → RUNNING → COMPLETED | FAILED
//!
//! Terminal states are immutable. Records live only in process memory, so a
//! job id that disappears after a restart is expected, not a fault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;
use uuid::Uuid;

use super::wiki_request::{count_pages, WikiCreateRequest, WikiPage};

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, background task not yet started
    Queued,
    /// Background task is walking the page tree
    Running,
    /// Every page was created
    Completed,
    /// Execution stopped on an error; remote state may be partial
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether `self → next` is a legal edge of the state machine
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Upload state of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Uploaded,
    Failed,
}

/// Result of uploading a single page; mirrors the request tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageResult>,
}

impl PageResult {
    /// Build an all-pending result tree for `pages`
    pub fn pending_tree(pages: &[WikiPage]) -> Vec<PageResult> {
        pages
            .iter()
            .map(|page| PageResult {
                title: page.title.clone(),
                page_id: None,
                status: PageStatus::Pending,
                error: None,
                children: Self::pending_tree(&page.children),
            })
            .collect()
    }

    /// Locate a node by its index path from the forest root
    pub fn at_path_mut<'a>(forest: &'a mut [PageResult], path: &[usize]) -> Option<&'a mut PageResult> {
        let (first, rest) = path.split_first()?;
        let node = forest.get_mut(*first)?;
        if rest.is_empty() {
            Some(node)
        } else {
            Self::at_path_mut(&mut node.children, rest)
        }
    }
}

/// Summary of a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub workspace_id: String,
    pub doc_id: String,
    /// True when a new doc was created in a space
    pub created_doc: bool,
    /// Remote ids of created pages, in creation (depth-first) order
    pub page_ids: Vec<String>,
}

/// Cause of a failed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub message: String,
    /// True when resubmitting may succeed (remote unavailable / rate limited)
    pub retryable: bool,
}

/// Full status of a wiki creation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub doc_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub total_pages: usize,
    pub uploaded: usize,
    pub pages: Vec<PageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl JobRecord {
    /// Create a queued record for `request`
    pub fn new(request: &WikiCreateRequest) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Queued,
            doc_name: request.doc_name.clone(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            workspace_id: None,
            doc_id: None,
            total_pages: count_pages(&request.pages),
            uploaded: 0,
            pages: PageResult::pending_tree(&request.pages),
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, stamping start/end times
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        match next {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed => self.finished_at = Some(Utc::now()),
            JobStatus::Queued => {}
        }
        Ok(())
    }

    pub fn complete(&mut self, result: JobResult) -> Result<(), InvalidTransition> {
        self.transition_to(JobStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, failure: JobFailure) -> Result<(), InvalidTransition> {
        self.transition_to(JobStatus::Failed)?;
        self.error = Some(failure);
        Ok(())
    }

    /// Plain-text report for agents that can only read text responses
    pub fn render_report(&self) -> String {
        let outcome = if self.status == JobStatus::Completed {
            "COMPLETED"
        } else {
            "FAILED"
        };

        let mut out = String::new();
        let _ = writeln!(out, "WIKI CREATION {}", outcome);
        let _ = writeln!(out, "Job ID:    {}", self.job_id);
        let _ = writeln!(out, "Status:    {}", self.status);
        let _ = writeln!(out, "Doc ID:    {}", self.doc_id.as_deref().unwrap_or(""));
        let _ = writeln!(out, "Uploaded:  {}/{}", self.uploaded, self.total_pages);
        out.push('\n');
        out.push_str("Pages created:\n");
        render_tree(&mut out, &self.pages, 0);
        if let Some(failure) = &self.error {
            let _ = write!(out, "\nError: {}", failure.message);
            if failure.retryable {
                out.push_str(" (retryable)");
            }
            out.push('\n');
        }
        out
    }
}

fn render_tree(out: &mut String, pages: &[PageResult], depth: usize) {
    for page in pages {
        let _ = write!(out, "{}- {}", "  ".repeat(depth), page.title);
        if let Some(id) = &page.page_id {
            let _ = write!(out, " (ID: {})", id);
        }
        let status = match page.status {
            PageStatus::Pending => "pending",
            PageStatus::Uploaded => "uploaded",
            PageStatus::Failed => "failed",
        };
        let _ = writeln!(out, " [{}]", status);
        render_tree(out, &page.children, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetLocation;

    fn request() -> WikiCreateRequest {
        WikiCreateRequest {
            doc_name: "Handbook".to_string(),
            target: TargetLocation::from_url("https://app.clickup.com/1/v/dc/2"),
            pages: vec![
                WikiPage::new("Intro", "hi").with_children(vec![WikiPage::new("Setup", "")]),
                WikiPage::new("FAQ", ""),
            ],
        }
    }

    #[test]
    fn test_new_record_is_queued() {
        let record = JobRecord::new(&request());
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.total_pages, 3);
        assert_eq!(record.pages.len(), 2);
        assert_eq!(record.pages[0].children[0].status, PageStatus::Pending);
        assert!(record.result.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_legal_lifecycle() {
        let mut record = JobRecord::new(&request());
        record.transition_to(JobStatus::Running).unwrap();
        assert!(record.started_at.is_some());

        record
            .complete(JobResult {
                workspace_id: "1".to_string(),
                doc_id: "2".to_string(),
                created_doc: false,
                page_ids: vec![],
            })
            .unwrap();
        assert!(record.is_terminal());
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut record = JobRecord::new(&request());
        record.transition_to(JobStatus::Running).unwrap();
        record
            .fail(JobFailure {
                message: "boom".to_string(),
                retryable: false,
            })
            .unwrap();

        let err = record.transition_to(JobStatus::Completed).unwrap_err();
        assert_eq!(err.from, JobStatus::Failed);
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.transition_to(JobStatus::Running).is_err());
    }

    #[test]
    fn test_queued_cannot_skip_running() {
        let mut record = JobRecord::new(&request());
        assert!(record.transition_to(JobStatus::Completed).is_err());
        assert_eq!(record.status, JobStatus::Queued);
    }

    #[test]
    fn test_at_path_mut() {
        let mut record = JobRecord::new(&request());
        let node = PageResult::at_path_mut(&mut record.pages, &[0, 0]).unwrap();
        assert_eq!(node.title, "Setup");
        assert!(PageResult::at_path_mut(&mut record.pages, &[1, 0]).is_none());
        assert!(PageResult::at_path_mut(&mut record.pages, &[]).is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Completed).unwrap(), "\"completed\"");
    }

    #[test]
    fn test_render_report_tree() {
        let mut record = JobRecord::new(&request());
        record.transition_to(JobStatus::Running).unwrap();
        record.doc_id = Some("doc-9".to_string());
        record.pages[0].page_id = Some("p1".to_string());
        record.pages[0].status = PageStatus::Uploaded;
        record.uploaded = 1;
        record
            .fail(JobFailure {
                message: "remote unavailable".to_string(),
                retryable: true,
            })
            .unwrap();

        let report = record.render_report();
        assert!(report.starts_with("WIKI CREATION FAILED\n"));
        assert!(report.contains("Doc ID:    doc-9"));
        assert!(report.contains("Uploaded:  1/3"));
        assert!(report.contains("- Intro (ID: p1) [uploaded]\n"));
        assert!(report.contains("  - Setup [pending]\n"));
        assert!(report.contains("Error: remote unavailable (retryable)"));
    }
}
