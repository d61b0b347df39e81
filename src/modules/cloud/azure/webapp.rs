//! Azure Web App module.
//!
//! Creates, updates or deletes a Web App (and, when needed, its App
//! Service Plan) so that it matches the supplied parameters.

use super::client::{ArmClient, ResourceClient};
use super::desired::{is_known_param, DesiredState, WebAppSpec};
use super::reconcile::{Action, Change, Reconciler, ReconciliationResult};
use crate::config::{AzureConfig, Config};
use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use std::sync::Arc;
use tracing::debug;

/// How the module gets hold of a [`ResourceClient`].
enum ClientSource {
    /// Load configuration when the module runs.
    Discover,
    /// Build an ARM client from this configuration.
    Config(Box<AzureConfig>),
    /// Use this client as-is.
    Client(Arc<dyn ResourceClient>),
}

/// Azure Web App module
pub struct AzureWebAppModule {
    source: ClientSource,
}

impl Default for AzureWebAppModule {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureWebAppModule {
    /// Module that loads its configuration from the usual files and
    /// environment on every run.
    pub fn new() -> Self {
        Self {
            source: ClientSource::Discover,
        }
    }

    pub fn with_config(config: AzureConfig) -> Self {
        Self {
            source: ClientSource::Config(Box::new(config)),
        }
    }

    pub fn with_client(client: Arc<dyn ResourceClient>) -> Self {
        Self {
            source: ClientSource::Client(client),
        }
    }

    /// Apply per-run authentication parameters on top of configuration.
    fn apply_auth_params(config: &mut AzureConfig, params: &ModuleParams) -> ModuleResult<()> {
        if let Some(subscription_id) = params.get_string("subscription_id")? {
            config.subscription_id = Some(subscription_id);
        }
        if let Some(client_id) = params.get_string("client_id")? {
            config.client_id = Some(client_id);
        }
        if let Some(secret) = params.get_string("secret")? {
            config.client_secret = Some(secret);
        }
        if let Some(tenant) = params.get_string("tenant")? {
            config.tenant_id = Some(tenant);
        }
        Ok(())
    }

    fn client(&self, params: &ModuleParams) -> ModuleResult<Arc<dyn ResourceClient>> {
        let mut config = match &self.source {
            ClientSource::Client(client) => return Ok(Arc::clone(client)),
            ClientSource::Config(config) => (**config).clone(),
            ClientSource::Discover => {
                Config::load(None)
                    .map_err(|e| {
                        ModuleError::ExecutionFailed(format!(
                            "Failed to load configuration: {:#}",
                            e
                        ))
                    })?
                    .azure
            }
        };
        Self::apply_auth_params(&mut config, params)?;
        Ok(Arc::new(ArmClient::new(&config)?))
    }

    fn message(spec: &WebAppSpec, result: &ReconciliationResult, check_mode: bool) -> String {
        if !result.changed {
            return match spec.state {
                DesiredState::Absent => format!("Web app '{}' is absent", spec.name),
                DesiredState::Present => format!("Web app '{}' is up to date", spec.name),
            };
        }

        let (would, did) = if result.action == Action::Create.name() {
            ("create", "Created")
        } else if result.changes.contains(&Change::DeleteWebApp) {
            ("delete", "Deleted")
        } else {
            ("update", "Updated")
        };
        let prefix = if check_mode {
            format!("Would {}", would)
        } else {
            did.to_string()
        };
        format!(
            "{} web app '{}' in resource group '{}'",
            prefix, spec.name, spec.resource_group
        )
    }

    async fn execute_async(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let spec = WebAppSpec::from_params(params)?;
        let client = self.client(params)?;

        let result = Reconciler::new(client.as_ref(), context.check_mode)
            .reconcile(&spec)
            .await?;
        debug!(changes = ?result.changes, "Reconciliation finished");

        let msg = Self::message(&spec, &result, context.check_mode);
        let mut output = if result.changed {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        };

        output = output
            .with_data("id", serde_json::json!(result.id))
            .with_data("state", serde_json::json!(result.state))
            .with_data("action", serde_json::json!(result.action))
            .with_data("changes", serde_json::json!(result.changes));

        if context.diff_mode {
            if let Some((before, after)) = &result.diff {
                let before = serde_json::to_string_pretty(before)
                    .map_err(|e| ModuleError::ExecutionFailed(e.to_string()))?;
                let after = serde_json::to_string_pretty(after)
                    .map_err(|e| ModuleError::ExecutionFailed(e.to_string()))?;
                output = output.with_diff(Diff::new(before, after));
            }
        }

        Ok(output)
    }
}

impl Module for AzureWebAppModule {
    fn name(&self) -> &'static str {
        "azure_rm_webapp"
    }

    fn description(&self) -> &'static str {
        "Create, update and delete Azure Web Apps and their App Service Plans"
    }

    fn required_params(&self) -> &[&'static str] {
        &["resource_group", "name"]
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        ModuleError::ExecutionFailed(format!("Failed to start runtime: {}", e))
                    })?;
                return runtime.block_on(self.execute_async(params, context));
            }
        };

        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(self.execute_async(params, context)))
                .join()
                .map_err(|_| ModuleError::ExecutionFailed("Module task panicked".to_string()))?
        })
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let mut unknown: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|key| !is_known_param(key))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(ModuleError::InvalidParameter(format!(
                "Unsupported parameters: {}",
                unknown.join(", ")
            )));
        }

        if let Some(state) = params.get_string("state")? {
            DesiredState::from_str(&state)?;
        }

        Ok(())
    }
}
