//! Resource client for the Azure management plane.
//!
//! [`ResourceClient`] is the seam between the reconciler and Azure. The
//! production implementation, [`ArmClient`], talks to the Azure Resource
//! Manager REST API over `reqwest`; tests substitute in-memory fakes.
//!
//! Get-calls report a missing resource as `Ok(None)` (or
//! [`AzureError::ResourceNotFound`] where absence is not a valid answer).
//! Every other non-success response becomes
//! [`AzureError::UpstreamCallFailure`].

use super::credential::{AzureCredential, TokenProvider};
use super::error::{AzureError, AzureResult, NotFoundExt};
use super::models::{
    AppServicePlan, ArmResource, DnsFlags, ObservedWebApp, ResourceGroup, SiteDocument,
    SiteEnvelope, SiteSourceControl,
};
use crate::config::AzureConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LOCATION, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Operations the reconciler needs from Azure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch a resource group. A missing group is `ResourceNotFound`.
    async fn get_resource_group(&self, name: &str) -> AzureResult<ResourceGroup>;

    /// Fetch a Web App with its site config and source control binding.
    async fn get_webapp(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<Option<ObservedWebApp>>;

    /// Create or update a Web App and return its state afterwards.
    async fn create_or_update_webapp(
        &self,
        resource_group: &str,
        name: &str,
        site: &SiteEnvelope,
        flags: &DnsFlags,
    ) -> AzureResult<ObservedWebApp>;

    /// Delete a Web App. Deleting an absent app succeeds.
    async fn delete_webapp(&self, resource_group: &str, name: &str) -> AzureResult<()>;

    async fn get_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<Option<AppServicePlan>>;

    async fn create_or_update_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
        plan: &AppServicePlan,
    ) -> AzureResult<AppServicePlan>;

    async fn list_app_settings(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<BTreeMap<String, String>>;

    /// Replace the full app settings map.
    async fn update_app_settings(
        &self,
        resource_group: &str,
        name: &str,
        settings: &BTreeMap<String, String>,
    ) -> AzureResult<()>;

    async fn create_or_update_source_control(
        &self,
        resource_group: &str,
        name: &str,
        source_control: &SiteSourceControl,
    ) -> AzureResult<()>;
}

#[derive(Debug, Deserialize)]
struct ArmErrorEnvelope {
    error: Option<ArmErrorDetail>,
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

/// Extract a readable message from an ARM error body.
fn parse_error_body(body: &str) -> String {
    let parsed = serde_json::from_str::<ArmErrorEnvelope>(body).ok();
    let (code, message) = match parsed {
        Some(ArmErrorEnvelope {
            error: Some(detail),
            ..
        }) => (detail.code, detail.message),
        Some(envelope) => (envelope.code, envelope.message),
        None => (None, None),
    };

    match (code, message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (None, Some(message)) => message,
        (Some(code), None) => code,
        (None, None) if body.trim().is_empty() => "no response body".to_string(),
        (None, None) => body.trim().to_string(),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn header_url(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Azure Resource Manager REST client.
pub struct ArmClient {
    http: Client,
    tokens: TokenProvider,
    endpoint: Url,
    subscription_id: String,
    web_api_version: String,
    resources_api_version: String,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// Build a client from configuration.
    pub fn new(config: &AzureConfig) -> AzureResult<Self> {
        let subscription_id = config.subscription_id.clone().ok_or_else(|| {
            AzureError::Configuration(
                "subscription_id is not set; use AZURE_SUBSCRIPTION_ID or the azure.subscription_id setting"
                    .to_string(),
            )
        })?;
        let credential = AzureCredential::from_config(config)?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("azure-webapp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoint = Url::parse(&config.resource_manager_endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(AzureError::Configuration(format!(
                "invalid resource manager endpoint '{}'",
                config.resource_manager_endpoint
            )));
        }

        let tokens = TokenProvider::new(
            credential,
            config.authority_host.clone(),
            &config.resource_manager_endpoint,
            http.clone(),
        );

        Ok(Self {
            http,
            tokens,
            endpoint,
            subscription_id,
            web_api_version: config.web_api_version.clone(),
            resources_api_version: config.resources_api_version.clone(),
            poll_interval: config.poll_interval,
            operation_timeout: config.operation_timeout,
        })
    }

    fn url(&self, segments: &[&str], api_version: &str) -> AzureResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AzureError::Configuration("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn site_url(&self, resource_group: &str, name: &str, extra: &[&str]) -> AzureResult<Url> {
        let mut segments = vec![
            "subscriptions",
            self.subscription_id.as_str(),
            "resourceGroups",
            resource_group,
            "providers",
            "Microsoft.Web",
            "sites",
            name,
        ];
        segments.extend_from_slice(extra);
        self.url(&segments, &self.web_api_version)
    }

    fn plan_url(&self, resource_group: &str, name: &str) -> AzureResult<Url> {
        self.url(
            &[
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                resource_group,
                "providers",
                "Microsoft.Web",
                "serverfarms",
                name,
            ],
            &self.web_api_version,
        )
    }

    /// Send a request with authentication, without checking its status.
    async fn execute(&self, operation: &str, request: RequestBuilder) -> AzureResult<Response> {
        let token = self.tokens.token().await?;
        request
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AzureError::upstream(operation, None, e.to_string()))
    }

    async fn ensure_success(operation: &str, response: Response) -> AzureResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = parse_error_body(&body);
        warn!(operation, status = status.as_u16(), "Azure call failed");
        Err(AzureError::upstream(operation, Some(status.as_u16()), message))
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, url: Url) -> AzureResult<T> {
        debug!(operation, path = url.path(), "GET");
        let response = self.execute(operation, self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AzureError::ResourceNotFound(operation.to_string()));
        }
        let response = Self::ensure_success(operation, response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a mutating request and wait for any long-running operation.
    async fn mutate<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> AzureResult<StatusCode> {
        debug!(operation, method = %method, path = url.path(), "Sending request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.execute(operation, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AzureError::ResourceNotFound(operation.to_string()));
        }
        let response = Self::ensure_success(operation, response).await?;
        let status = response.status();
        self.wait_for_completion(operation, status, response.headers())
            .await?;
        Ok(status)
    }

    /// Poll `Azure-AsyncOperation` or `Location` until the operation ends.
    async fn wait_for_completion(
        &self,
        operation: &str,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> AzureResult<()> {
        let (poll_url, async_operation) =
            if let Some(url) = header_url(headers, AZURE_ASYNC_OPERATION) {
                (url, true)
            } else if status == StatusCode::ACCEPTED {
                match header_url(headers, LOCATION) {
                    Some(url) => (url, false),
                    None => return Ok(()),
                }
            } else {
                return Ok(());
            };

        info!(operation, "Waiting for long-running operation");
        let started = Instant::now();
        let mut delay = retry_after(headers).unwrap_or(self.poll_interval);

        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.operation_timeout {
                return Err(AzureError::Timeout {
                    operation: operation.to_string(),
                    timeout_secs: self.operation_timeout.as_secs(),
                });
            }
            tokio::time::sleep(delay.min(self.operation_timeout - elapsed)).await;

            let response = self
                .execute(operation, self.http.get(poll_url.as_str()))
                .await?;
            let response = Self::ensure_success(operation, response).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            if async_operation {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| mutation_failure(operation, e.into()))?;
                let state: OperationStatus = serde_json::from_slice(&bytes)
                    .map_err(|e| mutation_failure(operation, e.into()))?;
                match state.status.as_str() {
                    "Succeeded" => return Ok(()),
                    "Failed" | "Canceled" | "Cancelled" => {
                        let message = state
                            .error
                            .and_then(|e| e.message.or(e.code))
                            .unwrap_or_else(|| format!("operation {}", state.status));
                        return Err(AzureError::upstream(operation, None, message));
                    }
                    other => debug!(operation, status = other, "Operation still running"),
                }
            } else if response.status() != StatusCode::ACCEPTED {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl ResourceClient for ArmClient {
    async fn get_resource_group(&self, name: &str) -> AzureResult<ResourceGroup> {
        let url = self.url(
            &[
                "subscriptions",
                self.subscription_id.as_str(),
                "resourcegroups",
                name,
            ],
            &self.resources_api_version,
        )?;
        self.get_json("get_resource_group", url).await
    }

    async fn get_webapp(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<Option<ObservedWebApp>> {
        let site: Option<SiteDocument> = self
            .get_json("get_webapp", self.site_url(resource_group, name, &[])?)
            .await
            .not_found_as_none()?;
        let Some(site) = site else {
            return Ok(None);
        };

        let mut observed = ObservedWebApp::from_document(site);

        let config: ArmResource<Map<String, Value>> = self
            .get_json(
                "get_webapp_configuration",
                self.site_url(resource_group, name, &["config", "web"])?,
            )
            .await?;
        observed.merge_site_config(&config.properties);

        let source_control: Option<ArmResource<SiteSourceControl>> = self
            .get_json(
                "get_source_control",
                self.site_url(resource_group, name, &["sourcecontrols", "web"])?,
            )
            .await
            .not_found_as_none()?;

        Ok(Some(
            observed.with_source_control(source_control.map(|sc| sc.properties)),
        ))
    }

    async fn create_or_update_webapp(
        &self,
        resource_group: &str,
        name: &str,
        site: &SiteEnvelope,
        flags: &DnsFlags,
    ) -> AzureResult<ObservedWebApp> {
        const OPERATION: &str = "create_or_update_webapp";
        let mut url = self.site_url(resource_group, name, &[])?;
        url.query_pairs_mut().extend_pairs(flags.query_pairs());

        self.mutate(OPERATION, Method::PUT, url, Some(site))
            .await
            .map_err(|e| mutation_failure(OPERATION, e))?;

        self.get_webapp(resource_group, name)
            .await
            .map_err(|e| mutation_failure(OPERATION, e))?
            .ok_or_else(|| {
                AzureError::upstream(OPERATION, None, "web app not found after create_or_update")
            })
    }

    async fn delete_webapp(&self, resource_group: &str, name: &str) -> AzureResult<()> {
        let url = self.site_url(resource_group, name, &[])?;
        self.mutate::<()>("delete_webapp", Method::DELETE, url, None)
            .await
            .not_found_as_none()?;
        Ok(())
    }

    async fn get_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<Option<AppServicePlan>> {
        self.get_json(
            "get_app_service_plan",
            self.plan_url(resource_group, name)?,
        )
        .await
        .not_found_as_none()
    }

    async fn create_or_update_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
        plan: &AppServicePlan,
    ) -> AzureResult<AppServicePlan> {
        const OPERATION: &str = "create_or_update_app_service_plan";
        self.mutate(
            OPERATION,
            Method::PUT,
            self.plan_url(resource_group, name)?,
            Some(plan),
        )
        .await
        .map_err(|e| mutation_failure(OPERATION, e))?;

        self.get_app_service_plan(resource_group, name)
            .await
            .map_err(|e| mutation_failure(OPERATION, e))?
            .ok_or_else(|| {
                AzureError::upstream(OPERATION, None, "app service plan not found after create")
            })
    }

    async fn list_app_settings(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<BTreeMap<String, String>> {
        const OPERATION: &str = "list_app_settings";
        let url = self.site_url(resource_group, name, &["config", "appsettings", "list"])?;
        debug!(operation = OPERATION, path = url.path(), "POST");
        let response = self.execute(OPERATION, self.http.post(url)).await?;
        let response = Self::ensure_success(OPERATION, response).await?;
        let bytes = response.bytes().await?;
        let settings: ArmResource<Option<BTreeMap<String, String>>> =
            serde_json::from_slice(&bytes)?;
        Ok(settings.properties.unwrap_or_default())
    }

    async fn update_app_settings(
        &self,
        resource_group: &str,
        name: &str,
        settings: &BTreeMap<String, String>,
    ) -> AzureResult<()> {
        const OPERATION: &str = "update_app_settings";
        let url = self.site_url(resource_group, name, &["config", "appsettings"])?;
        let body = ArmResource::new(settings);
        debug!(
            operation = OPERATION,
            keys = ?settings.keys().collect::<Vec<_>>(),
            "Updating app settings"
        );
        self.mutate(OPERATION, Method::PUT, url, Some(&body))
            .await
            .map_err(|e| mutation_failure(OPERATION, e))?;
        Ok(())
    }

    async fn create_or_update_source_control(
        &self,
        resource_group: &str,
        name: &str,
        source_control: &SiteSourceControl,
    ) -> AzureResult<()> {
        const OPERATION: &str = "create_or_update_source_control";
        let url = self.site_url(resource_group, name, &["sourcecontrols", "web"])?;
        let body = ArmResource::new(source_control);
        self.mutate(OPERATION, Method::PUT, url, Some(&body))
            .await
            .map_err(|e| mutation_failure(OPERATION, e))?;
        Ok(())
    }
}

/// Normalize an error raised while performing a mutating call.
///
/// A 404 is a failure here, not an absent observation. Transport and
/// decoding errors are reported against the operation like any other
/// upstream failure.
fn mutation_failure(operation: &str, err: AzureError) -> AzureError {
    match err {
        AzureError::ResourceNotFound(_) => {
            AzureError::upstream(operation, Some(404), "parent resource not found")
        }
        AzureError::Http(e) => {
            AzureError::upstream(operation, e.status().map(|s| s.as_u16()), e.to_string())
        }
        AzureError::Json(e) => {
            AzureError::upstream(operation, None, format!("invalid response body: {}", e))
        }
        other => other,
    }
}
