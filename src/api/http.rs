//! HTTP implementation of the backend collaborators.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use synthetics_protocol::{
    Batch, Payload, PollResult, ServerBatch, SyntheticsOrgSettings, Test, Trigger,
};
use tracing::debug;

use super::{ApiError, SyntheticsApi};
use crate::retry::retry;

/// Retries for a request failing with a 5xx
const MAX_RETRIES: u32 = 3;

const RETRY_DELAY: Duration = Duration::from_millis(500);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable overriding the API host
pub const HOST_OVERRIDE_ENV: &str = "DD_API_HOST_OVERRIDE";

/// API version of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    Unstable,
}

impl ApiVersion {
    fn path(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "api/v1",
            ApiVersion::Unstable => "api/unstable",
        }
    }
}

/// Base URL of the API for a site.
///
/// The intake host is only used for the sites that have one. A host
/// override wins over everything.
pub fn get_datadog_host(
    site: &str,
    version: ApiVersion,
    use_intake: bool,
    host_override: Option<&str>,
) -> String {
    let host = match host_override {
        Some(host) if !host.is_empty() => host.trim_end_matches('/').to_string(),
        _ if use_intake && (site == "datadoghq.com" || site == "datad0g.com") => {
            format!("https://intake.synthetics.{}", site)
        }
        _ => format!("https://api.{}", site),
    };

    format!("{}/{}", host, version.path())
}

/// Base URLs of the endpoints a client calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub v1: String,
    pub unstable: String,
    pub intake: String,
}

impl ApiEndpoints {
    pub fn for_site(site: &str, host_override: Option<&str>) -> Self {
        Self {
            v1: get_datadog_host(site, ApiVersion::V1, false, host_override),
            unstable: get_datadog_host(site, ApiVersion::Unstable, false, host_override),
            intake: get_datadog_host(site, ApiVersion::V1, true, host_override),
        }
    }

    /// Endpoints for a site, honouring `DD_API_HOST_OVERRIDE`
    pub fn from_env(site: &str) -> Self {
        let host_override = std::env::var(HOST_OVERRIDE_ENV).ok();
        Self::for_site(site, host_override.as_deref())
    }
}

#[derive(Deserialize)]
struct BackendErrors {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct BatchResponse {
    data: ServerBatch,
}

#[derive(Deserialize)]
struct PollResultsResponse {
    results: Vec<PollResult>,
}

#[derive(Deserialize)]
struct SearchedTest {
    public_id: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    tests: Vec<SearchedTest>,
}

/// `SyntheticsApi` over HTTP
pub struct HttpApiClient {
    client: Client,
    endpoints: ApiEndpoints,
    api_key: String,
    app_key: String,
}

impl HttpApiClient {
    pub fn new(
        endpoints: ApiEndpoints,
        api_key: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoints,
            api_key: api_key.into(),
            app_key: app_key.into(),
        })
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Send a request built by `build`, retrying on 5xx responses.
    async fn send<T, B>(&self, build: B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        let build = &build;

        retry(
            move || async move {
                let response = build(&self.client)
                    .header("DD-API-KEY", &self.api_key)
                    .header("DD-APPLICATION-KEY", &self.app_key)
                    .send()
                    .await
                    .map_err(|e| ApiError::Transport(e.to_string()))?;

                Self::decode(response).await
            },
            |retries, error: &ApiError| {
                (retries < MAX_RETRIES && error.is_server_error()).then_some(RETRY_DELAY)
            },
        )
        .await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let errors = match serde_json::from_str::<BackendErrors>(&body) {
                Ok(parsed) => parsed.errors,
                Err(_) if body.is_empty() => Vec::new(),
                Err(_) => vec![body],
            };
            debug!(status = status.as_u16(), ?errors, "backend returned an error");

            return Err(ApiError::Backend {
                status: status.as_u16(),
                errors,
            });
        }

        response.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SyntheticsApi for HttpApiClient {
    async fn get_test(&self, public_id: &str) -> Result<Test, ApiError> {
        let url = format!(
            "{}/synthetics/tests/{}",
            self.endpoints.v1,
            urlencoding::encode(public_id)
        );
        debug!(url = %url, "fetching test");

        self.send(|client| client.get(&url)).await
    }

    async fn search_tests(&self, query: &str) -> Result<Vec<String>, ApiError> {
        let url = format!(
            "{}/synthetics/tests/search?text={}",
            self.endpoints.v1,
            urlencoding::encode(query)
        );
        debug!(url = %url, "searching tests");

        let response: SearchResponse = self.send(|client| client.get(&url)).await?;
        Ok(response.tests.into_iter().map(|t| t.public_id).collect())
    }

    async fn trigger_tests(&self, payload: &Payload) -> Result<Trigger, ApiError> {
        let url = format!("{}/synthetics/tests/trigger/ci", self.endpoints.intake);
        debug!(url = %url, tests = payload.tests.len(), "triggering tests");

        self.send(|client| client.post(&url).json(payload)).await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Batch, ApiError> {
        let url = format!(
            "{}/synthetics/ci/batch/{}",
            self.endpoints.v1,
            urlencoding::encode(batch_id)
        );

        let response: BatchResponse = self.send(|client| client.get(&url)).await?;
        Ok(Batch::from(response.data))
    }

    async fn poll_results(&self, result_ids: &[String]) -> Result<Vec<PollResult>, ApiError> {
        let ids = serde_json::to_string(result_ids).map_err(|e| ApiError::Decode(e.to_string()))?;
        let url = format!(
            "{}/synthetics/tests/poll_results?result_ids={}",
            self.endpoints.v1,
            urlencoding::encode(&ids)
        );

        let response: PollResultsResponse = self.send(|client| client.get(&url)).await?;
        Ok(response.results)
    }

    async fn get_org_settings(&self) -> Result<SyntheticsOrgSettings, ApiError> {
        let url = format!("{}/synthetics/settings", self.endpoints.unstable);

        self.send(|client| client.get(&url)).await
    }
}
