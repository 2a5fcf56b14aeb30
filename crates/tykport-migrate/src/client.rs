//! Tyk Dashboard API client for migration operations.

use crate::error::{MigrationError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const LIST_APIS_PATH: &str = "/api/apis";
const IMPORT_OAS_PATH: &str = "/api/apis/oas/import";

/// Status value Tyk returns for a successful import.
pub const STATUS_OK: &str = "OK";

/// Client for interacting with the Tyk Dashboard during migration.
pub struct TykClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Proxy section of a Tyk API definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TykProxy {
    #[serde(default)]
    pub listen_path: String,
    #[serde(default)]
    pub target_url: String,
}

/// The fields of a Tyk API definition used for duplicate detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TykApiDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub proxy: TykProxy,
}

#[derive(Debug, Deserialize)]
struct ApiListEntry {
    api_definition: TykApiDefinition,
}

#[derive(Debug, Deserialize)]
struct ApiListResponse {
    // An empty dashboard answers with `"apis": null`.
    #[serde(default)]
    apis: Option<Vec<ApiListEntry>>,
}

impl ApiListResponse {
    fn into_definitions(self) -> Vec<TykApiDefinition> {
        self.apis
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.api_definition)
            .collect()
    }
}

/// Response body of the OAS import endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportResponse {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Meta", default)]
    pub meta: Option<serde_json::Value>,
}

impl ImportResponse {
    /// Whether Tyk accepted the definition.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl TykClient {
    /// Create a new Tyk Dashboard client.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent("tykport")
            .timeout(timeout)
            .build()
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| MigrationError::InvalidConfig(format!("Tyk URL {base_url}: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| MigrationError::InvalidConfig(e.to_string()))
    }

    /// Build the import URL with URL-encoded `listenPath` and `upstreamURL`.
    pub fn import_url(&self, listen_path: &str, upstream_url: &str) -> Result<Url> {
        let mut url = self.url(IMPORT_OAS_PATH)?;
        url.query_pairs_mut()
            .append_pair("listenPath", listen_path)
            .append_pair("upstreamURL", upstream_url);
        Ok(url)
    }

    fn check_auth(response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(MigrationError::AuthenticationFailed(
                    "Tyk rejected the token. Check the dashboard API key.".to_string(),
                ))
            }
            _ => Ok(response),
        }
    }

    /// Fetch every API definition in a single page.
    pub async fn list_apis(&self) -> Result<Vec<TykApiDefinition>> {
        let mut url = self.url(LIST_APIS_PATH)?;
        url.query_pairs_mut().append_pair("p", "-1");

        let response = self
            .client
            .get(url)
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;
        let response = Self::check_auth(response)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MigrationError::ApiError(format!(
                "Listing APIs failed with status {status}: {body}"
            )));
        }

        let listing: ApiListResponse = response
            .json()
            .await
            .map_err(|e| MigrationError::ApiError(e.to_string()))?;

        Ok(listing.into_definitions())
    }

    /// Import a raw OpenAPI/Swagger document.
    ///
    /// `document` is posted byte for byte. Tyk reports rejections in the
    /// body, sometimes with a non-2xx status, so any response carrying a
    /// `Status` field is returned to the caller.
    pub async fn import_oas(
        &self,
        document: &[u8],
        listen_path: &str,
        upstream_url: &str,
    ) -> Result<ImportResponse> {
        let url = self.import_url(listen_path, upstream_url)?;

        let response = self
            .client
            .post(url)
            .header("Authorization", &self.token)
            .header(CONTENT_TYPE, "application/json")
            .body(document.to_vec())
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;
        let response = Self::check_auth(response)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        serde_json::from_str(&body).map_err(|_| {
            MigrationError::ApiError(format!("Import failed with status {status}: {body}"))
        })
    }

    /// Check that the dashboard is reachable and the token is accepted.
    pub async fn health_check(&self) -> Result<()> {
        self.list_apis().await.map(|_| ())
    }
}
