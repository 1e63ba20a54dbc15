//! Target location resolution
//!
//! Turns a caller-supplied [`TargetLocation`] into a concrete place in ClickUp.
//! Explicit identifiers win; otherwise the URL is matched against the known
//! ClickUp URL shapes and identifiers are taken positionally from the match.
//!
//! Resolution runs once, before a job is created, so a bad URL is reported
//! before any remote call is made.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::models::TargetLocation;

/// Resolution failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("unrecognized location URL: {0}")]
    UnrecognizedUrl(String),

    #[error("target must provide doc_id, space_id or a ClickUp url")]
    MissingLocation,
}

/// A resolved remote location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedTarget {
    /// New pages become children of `page_id`
    Page {
        team_id: Option<String>,
        doc_id: String,
        page_id: String,
    },
    /// New pages become top-level pages of the doc
    Doc {
        team_id: Option<String>,
        doc_id: String,
    },
    /// A new doc is created in the space first
    Space {
        team_id: Option<String>,
        space_id: String,
    },
}

impl ResolvedTarget {
    pub fn team_id(&self) -> Option<&str> {
        match self {
            ResolvedTarget::Page { team_id, .. }
            | ResolvedTarget::Doc { team_id, .. }
            | ResolvedTarget::Space { team_id, .. } => team_id.as_deref(),
        }
    }

    fn with_team(mut self, explicit: Option<&String>) -> Self {
        if let Some(id) = explicit {
            match &mut self {
                ResolvedTarget::Page { team_id, .. }
                | ResolvedTarget::Doc { team_id, .. }
                | ResolvedTarget::Space { team_id, .. } => *team_id = Some(id.clone()),
            }
        }
        self
    }
}

/// Known ClickUp URL shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlShape {
    DocPage,
    Doc,
    Space,
    LegacyDocPage,
}

const URL_PREFIX: &str = r"^(?:https?://)?app\.clickup\.com/(\d+)/";
const URL_SUFFIX: &str = r"/?(?:[?#].*)?$";

static URL_PATTERNS: Lazy<Vec<(UrlShape, Regex)>> = Lazy::new(|| {
    let shapes = [
        (UrlShape::DocPage, r"v/dc/([^/?#]+)/([^/?#]+)"),
        (UrlShape::Doc, r"v/dc/([^/?#]+)"),
        (UrlShape::Space, r"v/(?:o/)?s/([^/?#]+)"),
        (UrlShape::LegacyDocPage, r"docs/([^/?#]+)/([^/?#]+)"),
    ];
    shapes
        .into_iter()
        .map(|(shape, body)| {
            let pattern = format!("{}{}{}", URL_PREFIX, body, URL_SUFFIX);
            // Patterns are compile-time constants
            (shape, Regex::new(&pattern).expect("valid location pattern"))
        })
        .collect()
});

/// Resolve a target, preferring explicit ids over the URL
pub fn resolve_target(target: &TargetLocation) -> Result<ResolvedTarget, TargetError> {
    if let Some(doc_id) = &target.doc_id {
        return Ok(match &target.page_id {
            Some(page_id) => ResolvedTarget::Page {
                team_id: target.workspace_id.clone(),
                doc_id: doc_id.clone(),
                page_id: page_id.clone(),
            },
            None => ResolvedTarget::Doc {
                team_id: target.workspace_id.clone(),
                doc_id: doc_id.clone(),
            },
        });
    }

    if let Some(space_id) = &target.space_id {
        return Ok(ResolvedTarget::Space {
            team_id: target.workspace_id.clone(),
            space_id: space_id.clone(),
        });
    }

    match target.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Ok(parse_location_url(url)?.with_team(target.workspace_id.as_ref())),
        None => Err(TargetError::MissingLocation),
    }
}

/// Match `url` against the known shapes; exactly one must match
pub fn parse_location_url(url: &str) -> Result<ResolvedTarget, TargetError> {
    let url = url.trim();
    let mut matches = URL_PATTERNS
        .iter()
        .filter_map(|(shape, re)| re.captures(url).map(|caps| (*shape, caps)));

    let (shape, caps) = match (matches.next(), matches.next()) {
        (Some(only), None) => only,
        _ => return Err(TargetError::UnrecognizedUrl(url.to_string())),
    };

    let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
    let team_id = Some(group(1));

    let resolved = match shape {
        UrlShape::DocPage | UrlShape::LegacyDocPage => ResolvedTarget::Page {
            team_id,
            doc_id: group(2),
            page_id: group(3),
        },
        UrlShape::Doc => ResolvedTarget::Doc {
            team_id,
            doc_id: group(2),
        },
        UrlShape::Space => ResolvedTarget::Space {
            team_id,
            space_id: group(2),
        },
    };

    tracing::debug!(url = %url, shape = ?shape, "Resolved location URL");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(team: &str, doc: &str, page: &str) -> ResolvedTarget {
        ResolvedTarget::Page {
            team_id: Some(team.to_string()),
            doc_id: doc.to_string(),
            page_id: page.to_string(),
        }
    }

    #[test]
    fn test_doc_page_url() {
        let resolved = parse_location_url(
            "https://app.clickup.com/90151997238/v/dc/2kyqmktp-35355/2kyqmktp-581535",
        )
        .unwrap();
        assert_eq!(resolved, page("90151997238", "2kyqmktp-35355", "2kyqmktp-581535"));
    }

    #[test]
    fn test_doc_only_url() {
        let resolved = parse_location_url("https://app.clickup.com/42/v/dc/abc-1/").unwrap();
        assert_eq!(
            resolved,
            ResolvedTarget::Doc {
                team_id: Some("42".to_string()),
                doc_id: "abc-1".to_string()
            }
        );
    }

    #[test]
    fn test_space_urls() {
        for url in [
            "https://app.clickup.com/42/v/s/777",
            "app.clickup.com/42/v/o/s/777?view=list",
        ] {
            assert_eq!(
                parse_location_url(url).unwrap(),
                ResolvedTarget::Space {
                    team_id: Some("42".to_string()),
                    space_id: "777".to_string()
                },
                "{}",
                url
            );
        }
    }

    #[test]
    fn test_legacy_docs_alias() {
        let resolved = parse_location_url("https://app.clickup.com/1/docs/2/3").unwrap();
        assert_eq!(resolved, page("1", "2", "3"));
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        let resolved = parse_location_url("https://app.clickup.com/1/v/dc/2/3?block=x#top").unwrap();
        assert_eq!(resolved, page("1", "2", "3"));
    }

    #[test]
    fn test_unmatched_urls_fail() {
        for url in [
            "https://app.clickup.com/1/v/li/2",
            "https://example.com/1/v/dc/2/3",
            "https://app.clickup.com/team/v/dc/2",
            "https://app.clickup.com/1/v/dc/2/3/4",
            "not a url",
        ] {
            assert_eq!(
                parse_location_url(url),
                Err(TargetError::UnrecognizedUrl(url.to_string())),
                "{}",
                url
            );
        }
    }

    #[test]
    fn test_explicit_ids_win_over_url() {
        let target = TargetLocation {
            url: Some("not a url".to_string()),
            workspace_id: Some("9".to_string()),
            doc_id: Some("d".to_string()),
            page_id: Some("p".to_string()),
            space_id: None,
        };
        assert_eq!(resolve_target(&target).unwrap(), page("9", "d", "p"));
    }

    #[test]
    fn test_explicit_space_without_team() {
        let target = TargetLocation {
            space_id: Some("s1".to_string()),
            ..TargetLocation::default()
        };
        let resolved = resolve_target(&target).unwrap();
        assert_eq!(resolved.team_id(), None);
    }

    #[test]
    fn test_explicit_workspace_overrides_url_team() {
        let target = TargetLocation {
            url: Some("https://app.clickup.com/1/v/dc/2".to_string()),
            workspace_id: Some("77".to_string()),
            ..TargetLocation::default()
        };
        assert_eq!(resolve_target(&target).unwrap().team_id(), Some("77"));
    }

    #[test]
    fn test_empty_target_fails() {
        assert_eq!(
            resolve_target(&TargetLocation::default()),
            Err(TargetError::MissingLocation)
        );
    }
}
