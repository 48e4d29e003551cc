//! Response models for the endpoints wrapped by [`SocketClient`](crate::SocketClient).
//!
//! Models only name the fields callers commonly read; everything else is kept
//! in `extra` so no response data is lost when the API grows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /quota`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaResponse {
    /// Remaining API units.
    pub quota: u64,
}

/// One organization the token can access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// URL slug used in `orgs/{slug}/...` paths.
    #[serde(default)]
    pub slug: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Subscription plan.
    #[serde(default)]
    pub plan: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /organizations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationsResponse {
    /// Organizations keyed by id.
    pub organizations: BTreeMap<String, Organization>,
}

/// One issue reported for a package version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageIssue {
    /// Issue type, e.g. `installScripts`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Issue-specific payload.
    #[serde(default)]
    pub value: Value,
}

/// Package score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageScore {
    /// Per-category scores, each in `0.0..=1.0`.
    #[serde(flatten)]
    pub categories: BTreeMap<String, Value>,
}

/// One package analysis from the batch `purl` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurlArtifact {
    /// Ecosystem, e.g. `npm` or `pypi`.
    #[serde(rename = "type")]
    pub ecosystem: String,
    /// Package namespace or scope.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Package name.
    pub name: String,
    /// Package version.
    #[serde(default)]
    pub version: Option<String>,
    /// Score summary.
    #[serde(default)]
    pub score: Option<Value>,
    /// Alerts raised for the package.
    #[serde(default)]
    pub alerts: Vec<Value>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A full scan created from uploaded manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullScan {
    /// Scan id.
    pub id: String,
    /// Owning organization slug.
    #[serde(default)]
    pub organization_slug: Option<String>,
    /// Repository slug.
    #[serde(default)]
    pub repository_slug: Option<String>,
    /// Branch the scan belongs to.
    #[serde(default)]
    pub branch: Option<String>,
    /// Commit message recorded with the scan.
    #[serde(default)]
    pub commit_message: Option<String>,
    /// Link to the HTML report.
    #[serde(default)]
    pub html_report_url: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query options for creating a full scan.
///
/// Keys are sent through the query renaming rules, so `default_branch`
/// reaches the API as `default_branch` and unset options are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullScanParams {
    /// Repository slug (required by the API).
    pub repo: String,
    /// Branch name.
    pub branch: Option<String>,
    /// Commit message.
    pub commit_message: Option<String>,
    /// Commit hash.
    pub commit_hash: Option<String>,
    /// Pull request number.
    pub pull_request: Option<u64>,
    /// Mark the branch as the repository default.
    pub make_default_branch: Option<bool>,
    /// Mark the scan as the pending head of its branch.
    pub set_as_pending_head: Option<bool>,
    /// Integration the scan originates from, e.g. `github`.
    pub integration_type: Option<String>,
    /// Organization slug within the integration.
    pub integration_org_slug: Option<String>,
}

impl FullScanParams {
    /// Parameters for `repo` with every option unset.
    #[must_use]
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            ..Self::default()
        }
    }

    /// Caller-facing query pairs; empty entries are dropped when shaped.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("repo", self.repo.clone())];
        let optional = [
            ("branch", self.branch.clone()),
            ("commit_message", self.commit_message.clone()),
            ("commit_hash", self.commit_hash.clone()),
            ("pullRequest", self.pull_request.map(|n| n.to_string())),
            ("makeDefaultBranch", self.make_default_branch.map(|b| b.to_string())),
            ("setAsPendingHead", self.set_as_pending_head.map(|b| b.to_string())),
            ("integrationType", self.integration_type.clone()),
            ("integrationOrgSlug", self.integration_org_slug.clone()),
        ];
        pairs.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|value| (key, value))),
        );
        pairs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::request::shape_query;
    use crate::result::ApiValue;

    #[test]
    fn test_full_scan_params_shape() {
        let mut params = FullScanParams::new("web");
        params.pull_request = Some(42);
        params.make_default_branch = Some(false);
        params.branch = Some(String::new());

        let query = shape_query(params.query_pairs());
        assert_eq!(query["repo"], "web");
        assert_eq!(query["pull_request"], "42");
        assert_eq!(query["make_default_branch"], "false");
        assert!(!query.contains_key("branch"));
        assert!(!query.contains_key("set_as_pending_head"));
    }

    #[test]
    fn test_purl_artifact_keeps_unknown_fields() {
        let artifact: PurlArtifact = serde_json::from_value(json!({
            "type": "npm",
            "name": "lodash",
            "version": "4.17.21",
            "license": "MIT"
        }))
        .unwrap();
        assert_eq!(artifact.ecosystem, "npm");
        assert_eq!(artifact.extra["license"], json!("MIT"));
    }

    #[test]
    fn test_unexpected_artifact_is_opaque() {
        let raw = json!({"_type": "summary", "count": 2});
        let value: ApiValue<PurlArtifact> = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(value, ApiValue::Opaque(raw));
    }
}
