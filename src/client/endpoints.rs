//! Endpoint wrappers: path, query and body shaping over [`SocketClient::send`].

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tracing::instrument;

use super::SocketClient;
use super::files::select_upload_files;
use crate::error::SocketError;
use crate::multipart::{build_json_part, build_parts};
use crate::request::{RequestDescriptor, ResponseType};
use crate::result::{ApiResult, ApiValue};
use crate::types::{
    FullScan, FullScanParams, OrganizationsResponse, PackageIssue, PackageScore, PurlArtifact,
    QuotaResponse,
};

fn npm_package_path(name: &str, version: &str, leaf: &str) -> String {
    format!(
        "npm/{}/{}/{leaf}",
        urlencoding::encode(name),
        urlencoding::encode(version)
    )
}

impl SocketClient {
    /// Remaining API quota for the token.
    #[instrument(skip(self))]
    pub async fn get_quota(&self) -> ApiResult<QuotaResponse> {
        self.send_json(RequestDescriptor::get("quota").with_endpoint("getQuota"))
            .await
    }

    /// Organizations the token can access.
    #[instrument(skip(self))]
    pub async fn get_organizations(&self) -> ApiResult<OrganizationsResponse> {
        self.send_json(RequestDescriptor::get("organizations").with_endpoint("getOrganizations"))
            .await
    }

    /// Issues reported for an npm package version.
    #[instrument(skip(self))]
    pub async fn get_issues_by_npm_package(
        &self,
        name: &str,
        version: &str,
    ) -> ApiResult<Vec<ApiValue<PackageIssue>>> {
        let request = RequestDescriptor::get(npm_package_path(name, version, "issues"))
            .with_endpoint("getIssuesByNPMPackage");
        self.send_json(request).await
    }

    /// Score breakdown for an npm package version.
    #[instrument(skip(self))]
    pub async fn get_score_by_npm_package(
        &self,
        name: &str,
        version: &str,
    ) -> ApiResult<ApiValue<PackageScore>> {
        let request = RequestDescriptor::get(npm_package_path(name, version, "score"))
            .with_endpoint("getScoreByNPMPackage");
        self.send_json(request).await
    }

    /// Analyzes package URLs in one request; the response is NDJSON.
    #[instrument(skip(self, components, query), fields(components = components.len()))]
    pub async fn batch_package_fetch(
        &self,
        components: Vec<String>,
        query: Vec<(String, String)>,
    ) -> ApiResult<Vec<ApiValue<PurlArtifact>>> {
        let body = json!({
            "components": components
                .iter()
                .map(|purl| json!({ "purl": purl }))
                .collect::<Vec<_>>(),
        });
        let request = RequestDescriptor::post("purl")
            .with_query(query)
            .with_json(body)
            .with_response_type(ResponseType::Stream)
            .with_endpoint("batchPackageFetch");
        self.send_json(request).await
    }

    /// Uploads manifest files as a dependencies snapshot.
    #[instrument(skip(self, filepaths), fields(files = filepaths.len()))]
    pub async fn create_dependencies_snapshot(
        &self,
        filepaths: &[PathBuf],
        base_path: &Path,
        query: Vec<(String, String)>,
    ) -> ApiResult<Value> {
        let files = match self.upload_files("createDependenciesSnapshot", filepaths).await {
            Ok(files) => files,
            Err(error) => return ApiResult::Error(error),
        };
        let request = RequestDescriptor::post("dependencies/upload")
            .with_query(query)
            .with_multipart(build_parts(&files, base_path))
            .with_endpoint("createDependenciesSnapshot");
        self.send_json(request).await
    }

    /// Creates a full scan for `org_slug` from manifest files.
    #[instrument(skip(self, filepaths, params), fields(files = filepaths.len(), repo = %params.repo))]
    pub async fn create_org_full_scan(
        &self,
        org_slug: &str,
        filepaths: &[PathBuf],
        base_path: &Path,
        params: &FullScanParams,
    ) -> ApiResult<ApiValue<FullScan>> {
        let files = match self.upload_files("createOrgFullScan", filepaths).await {
            Ok(files) => files,
            Err(error) => return ApiResult::Error(error),
        };
        let request = RequestDescriptor::post(format!(
            "orgs/{}/full-scans",
            urlencoding::encode(org_slug)
        ))
        .with_query(params.query_pairs())
        .with_multipart(build_parts(&files, base_path))
        .with_endpoint("createOrgFullScan");
        self.send_json(request).await
    }

    /// Creates a full scan from an in-memory JSON document uploaded as a file.
    ///
    /// Without `basename` the part is sent as `data.json`.
    #[instrument(skip(self, data, params), fields(repo = %params.repo))]
    pub async fn create_org_full_scan_from_json(
        &self,
        org_slug: &str,
        data: &Value,
        basename: Option<&str>,
        params: &FullScanParams,
    ) -> ApiResult<ApiValue<FullScan>> {
        let part = match build_json_part(data, basename) {
            Ok(part) => part,
            Err(error) => {
                return ApiResult::Error(SocketError::file_validation(
                    format!("createOrgFullScanFromJson could not serialize its payload: {error}"),
                    None,
                ));
            }
        };
        let request = RequestDescriptor::post(format!(
            "orgs/{}/full-scans",
            urlencoding::encode(org_slug)
        ))
        .with_query(params.query_pairs())
        .with_multipart(vec![part])
        .with_endpoint("createOrgFullScanFromJson");
        self.send_json(request).await
    }

    async fn upload_files(
        &self,
        operation: &str,
        filepaths: &[PathBuf],
    ) -> Result<Vec<PathBuf>, SocketError> {
        let validator = self.inner.config.file_validator.as_deref();
        select_upload_files(validator, operation, filepaths).await
    }
}
