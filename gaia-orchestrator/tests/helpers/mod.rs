//! Shared test helpers
//!
//! An in-memory [`DocumentService`] that records every call, plus settings
//! and polling helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use gaia_common::Settings;
use gaia_orchestrator::models::JobRecord;
use gaia_orchestrator::services::{
    ClientError, DocumentService, JobStore, RemoteDoc, RemotePage, TaskText, Workspace,
};

/// A recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListWorkspaces,
    CreateDoc {
        workspace_id: String,
        name: String,
        space_id: String,
    },
    CreatePage {
        workspace_id: String,
        doc_id: String,
        title: String,
        content: String,
        parent: Option<String>,
        assigned_id: Option<String>,
    },
    GetDoc {
        workspace_id: String,
        doc_id: String,
    },
    GetTask {
        task_id: String,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    next_id: u32,
    workspaces: Vec<Workspace>,
    tasks: HashMap<String, TaskText>,
    page_failures: HashMap<String, ClientError>,
}

/// In-memory document service double
#[derive(Default)]
pub struct MockDocuments {
    state: Mutex<MockState>,
}

impl MockDocuments {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.add_workspace("team-1", "Default Team");
        mock
    }

    pub fn add_workspace(&self, id: &str, name: &str) {
        self.state.lock().unwrap().workspaces.push(Workspace {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn clear_workspaces(&self) {
        self.state.lock().unwrap().workspaces.clear();
    }

    pub fn add_task(&self, task: TaskText) {
        self.state.lock().unwrap().tasks.insert(task.id.clone(), task);
    }

    /// Make `create_page` fail for pages titled `title`
    pub fn fail_page(&self, title: &str, error: ClientError) {
        self.state
            .lock()
            .unwrap()
            .page_failures
            .insert(title.to_string(), error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Successfully created pages as `(title, id, parent)`, in creation order
    pub fn created_pages(&self) -> Vec<(String, String, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreatePage {
                    title,
                    parent,
                    assigned_id: Some(id),
                    ..
                } => Some((title, id, parent)),
                _ => None,
            })
            .collect()
    }

    fn next_id(state: &mut MockState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }
}

#[async_trait]
impl DocumentService for MockDocuments {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListWorkspaces);
        Ok(state.workspaces.clone())
    }

    async fn create_doc(
        &self,
        workspace_id: &str,
        name: &str,
        space_id: &str,
    ) -> Result<RemoteDoc, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateDoc {
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            space_id: space_id.to_string(),
        });
        Ok(RemoteDoc {
            id: Self::next_id(&mut state, "doc"),
            name: name.to_string(),
        })
    }

    async fn create_page(
        &self,
        workspace_id: &str,
        doc_id: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
    ) -> Result<RemotePage, ClientError> {
        let mut state = self.state.lock().unwrap();
        let failure = state.page_failures.get(title).cloned();
        let assigned_id = match failure {
            Some(_) => None,
            None => Some(Self::next_id(&mut state, "page")),
        };
        state.calls.push(Call::CreatePage {
            workspace_id: workspace_id.to_string(),
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            parent: parent_page_id.map(str::to_string),
            assigned_id: assigned_id.clone(),
        });
        match (failure, assigned_id) {
            (Some(err), _) => Err(err),
            (None, Some(id)) => Ok(RemotePage { id }),
            (None, None) => unreachable!(),
        }
    }

    async fn get_doc(&self, workspace_id: &str, doc_id: &str) -> Result<RemoteDoc, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetDoc {
            workspace_id: workspace_id.to_string(),
            doc_id: doc_id.to_string(),
        });
        Ok(RemoteDoc {
            id: doc_id.to_string(),
            name: "Existing".to_string(),
        })
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskText, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetTask {
            task_id: task_id.to_string(),
        });
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| ClientError::Rejected {
                status: 404,
                body: "Task not found".to_string(),
            })
    }
}

/// Settings with an API key and no pacing
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.clickup.api_key = "pk_test".to_string();
    settings.upload.delay_ms = 0;
    settings.retry.base_delay_ms = 1;
    settings
}

pub fn mock() -> Arc<MockDocuments> {
    Arc::new(MockDocuments::new())
}

/// Poll until the job reaches a terminal state
pub async fn wait_for_terminal(jobs: &JobStore, job_id: Uuid) -> JobRecord {
    for _ in 0..500 {
        if let Some(record) = jobs.get(job_id).await {
            if record.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish in time", job_id);
}
