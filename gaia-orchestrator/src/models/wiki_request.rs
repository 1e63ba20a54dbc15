//! Canonical wiki creation request
//!
//! This is the shape every ingestion path (REST, GET helper, webhook) converges
//! on after extraction and normalization.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum title / doc name length accepted by the remote service
pub const MAX_TITLE_CHARS: usize = 500;

/// Doc name used when the payload does not provide one
pub const DEFAULT_DOC_NAME: &str = "Wiki";

/// Structural validation failure of a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("pages must contain at least one page")]
    EmptyPages,

    #[error("doc_name must be 1..=500 characters")]
    InvalidDocName,

    #[error("page at {path} has an empty title")]
    EmptyTitle { path: String },

    #[error("page at {path} has a title longer than 500 characters")]
    TitleTooLong { path: String },
}

/// A single page in the wiki tree (recursive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub title: String,
    /// Markdown content of the page
    #[serde(default)]
    pub content: String,
    /// Nested child pages, created under this page in order
    #[serde(default)]
    pub children: Vec<WikiPage>,
}

/// Where the wiki should be created, as supplied by the caller.
///
/// Either explicit identifiers or a ClickUp URL; see
/// [`crate::services::target_resolver`] for how this becomes a concrete
/// location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Workspace (team) id; auto-detected when omitted
    #[serde(
        default,
        alias = "team_id",
        deserialize_with = "opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub workspace_id: Option<String>,

    /// Space to create a brand-new doc in
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,

    /// Existing doc to add pages to
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,

    /// Existing page to nest new pages under
    #[serde(
        default,
        alias = "parent_page_id",
        deserialize_with = "opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_id: Option<String>,
}

/// Top-level wiki creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiCreateRequest {
    /// Title for a new doc (only used when the target is a space)
    #[serde(default = "default_doc_name")]
    pub doc_name: String,
    pub target: TargetLocation,
    pub pages: Vec<WikiPage>,
}

fn default_doc_name() -> String {
    DEFAULT_DOC_NAME.to_string()
}

impl TargetLocation {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

impl WikiPage {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<WikiPage>) -> Self {
        self.children = children;
        self
    }
}

impl WikiCreateRequest {
    /// Check the invariants the remote walk relies on: a non-empty tree and
    /// non-empty, bounded titles at every depth.
    pub fn validate(&self) -> Result<(), RequestError> {
        let name_len = self.doc_name.trim().chars().count();
        if name_len == 0 || name_len > MAX_TITLE_CHARS {
            return Err(RequestError::InvalidDocName);
        }
        if self.pages.is_empty() {
            return Err(RequestError::EmptyPages);
        }
        validate_pages(&self.pages, "pages")
    }

    pub fn total_pages(&self) -> usize {
        count_pages(&self.pages)
    }
}

fn validate_pages(pages: &[WikiPage], prefix: &str) -> Result<(), RequestError> {
    for (index, page) in pages.iter().enumerate() {
        let path = format!("{}[{}]", prefix, index);
        let title_len = page.title.trim().chars().count();
        if title_len == 0 {
            return Err(RequestError::EmptyTitle { path });
        }
        if title_len > MAX_TITLE_CHARS {
            return Err(RequestError::TitleTooLong { path });
        }
        validate_pages(&page.children, &format!("{}.children", path))?;
    }
    Ok(())
}

/// Count every node of a page forest
pub fn count_pages(pages: &[WikiPage]) -> usize {
    pages.iter().map(|p| 1 + count_pages(&p.children)).sum()
}

/// Accept ids as strings or bare numbers; blank strings count as absent
fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number id, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_applied() {
        let request: WikiCreateRequest = serde_json::from_value(json!({
            "target": {"doc_id": "abc"},
            "pages": [{"title": "Only"}]
        }))
        .unwrap();

        assert_eq!(request.doc_name, "Wiki");
        assert_eq!(request.pages[0].content, "");
        assert!(request.pages[0].children.is_empty());
    }

    #[test]
    fn test_numeric_ids_and_aliases() {
        let target: TargetLocation = serde_json::from_value(json!({
            "team_id": 9015,
            "doc_id": "d-1",
            "parent_page_id": "p-7",
            "space_id": ""
        }))
        .unwrap();

        assert_eq!(target.workspace_id.as_deref(), Some("9015"));
        assert_eq!(target.page_id.as_deref(), Some("p-7"));
        assert_eq!(target.space_id, None);
    }

    #[test]
    fn test_count_pages_counts_every_node() {
        let pages = vec![
            WikiPage::new("A", "").with_children(vec![
                WikiPage::new("A1", ""),
                WikiPage::new("A2", "").with_children(vec![WikiPage::new("A2a", "")]),
            ]),
            WikiPage::new("B", ""),
        ];
        assert_eq!(count_pages(&pages), 5);
    }

    #[test]
    fn test_validate_reports_nested_empty_title() {
        let request = WikiCreateRequest {
            doc_name: "Docs".to_string(),
            target: TargetLocation::from_url("https://app.clickup.com/1/v/dc/2"),
            pages: vec![WikiPage::new("A", "").with_children(vec![WikiPage::new("  ", "")])],
        };

        assert_eq!(
            request.validate(),
            Err(RequestError::EmptyTitle {
                path: "pages[0].children[0]".to_string()
            })
        );
    }

    #[test]
    fn test_validate_rejects_empty_pages() {
        let request = WikiCreateRequest {
            doc_name: "Docs".to_string(),
            target: TargetLocation::default(),
            pages: vec![],
        };
        assert_eq!(request.validate(), Err(RequestError::EmptyPages));
    }
}
