//! Desired-state builder.
//!
//! Turns raw module parameters into an immutable [`WebAppSpec`]. All
//! validation that needs no API call happens here, so parameter mistakes
//! (conflicting runtime settings, unknown sku codes, unknown fields) fail
//! before anything is sent to Azure.

use super::error::{AzureError, AzureResult};
use super::fields::{self, Bucket, ConfigProperty, SiteProperty, ValueKind};
use super::models::{NameValuePair, SiteEnvelope, SiteEnvelopeProperties, SiteSourceControl, SkuDescription, Tags};
use super::sku::{get_sku_name, normalize_sku};
use crate::modules::{ModuleError, ModuleParams, ModuleResult, ParamExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parameters the module accepts, besides the routed site and config fields.
pub const KNOWN_PARAMS: &[&str] = &[
    "resource_group",
    "name",
    "location",
    "plan",
    "java_container_settings",
    "container_settings",
    "deployment_source",
    "startup_file",
    "app_settings",
    "site_config",
    "tags",
    "append_tags",
    "state",
    // Authentication overrides
    "subscription_id",
    "client_id",
    "secret",
    "tenant",
];

/// Whether `key` is a parameter of the module.
pub fn is_known_param(key: &str) -> bool {
    KNOWN_PARAMS.contains(&key) || fields::route(key).is_some()
}

/// Lifecycle state requested for the Web App.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl DesiredState {
    pub fn from_str(s: &str) -> ModuleResult<Self> {
        match s.to_lowercase().as_str() {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid state '{}'. Valid states: present, absent",
                s
            ))),
        }
    }
}

/// The App Service Plan a Web App runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSpec {
    pub resource_group: String,
    pub name: String,
    pub is_linux: Option<bool>,
    /// Normalized sku code
    pub sku: Option<String>,
    pub number_of_workers: Option<i64>,
    pub location: Option<String>,
}

impl PlanSpec {
    /// Parse the `plan` parameter: a dict, a plan name, or a plan resource id.
    ///
    /// A plan without its own resource group lives in `default_resource_group`.
    pub fn from_value(value: &Value, default_resource_group: &str) -> ModuleResult<Self> {
        match value {
            Value::String(s) if s.starts_with('/') => Self::from_resource_id(s),
            Value::String(s) if !s.trim().is_empty() => Ok(Self::named(default_resource_group, s)),
            Value::Object(obj) => {
                let params = sub_params(obj);
                let name = params
                    .get_string("name")?
                    .ok_or_else(|| ModuleError::MissingParameter("plan.name".to_string()))?;
                let sku = params.get_string("sku")?.map(|s| normalize_sku(&s));
                if let Some(sku) = &sku {
                    get_sku_name(sku)?;
                }
                Ok(Self {
                    resource_group: params
                        .get_string("resource_group")?
                        .unwrap_or_else(|| default_resource_group.to_string()),
                    name,
                    is_linux: params.get_bool("is_linux")?,
                    sku,
                    number_of_workers: params.get_i64("number_of_workers")?,
                    location: params.get_string("location")?,
                })
            }
            _ => Err(ModuleError::InvalidParameter(
                "plan must be a plan name, a plan resource id or a dict".to_string(),
            )),
        }
    }

    fn named(resource_group: &str, name: &str) -> Self {
        Self {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            is_linux: None,
            sku: None,
            number_of_workers: None,
            location: None,
        }
    }

    /// Parse `/subscriptions/{s}/resourceGroups/{rg}/providers/Microsoft.Web/serverfarms/{name}`.
    fn from_resource_id(id: &str) -> ModuleResult<Self> {
        let segments: Vec<&str> = id.split('/').filter(|s| !s.is_empty()).collect();
        let after = |key: &str| {
            segments
                .iter()
                .position(|s| s.eq_ignore_ascii_case(key))
                .and_then(|i| segments.get(i + 1))
                .copied()
        };

        match (after("resourceGroups"), after("serverfarms")) {
            (Some(rg), Some(name)) => Ok(Self::named(rg, name)),
            _ => Err(ModuleError::InvalidParameter(format!(
                "'{}' is not an App Service Plan resource id",
                id
            ))),
        }
    }

    /// Fields that must be known before this plan can be created.
    pub fn missing_create_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.is_linux.is_none() {
            missing.push("is_linux".to_string());
        }
        if self.sku.is_none() {
            missing.push("sku".to_string());
        }
        missing
    }

    /// Sku block of a plan creation body.
    pub fn sku_description(&self) -> AzureResult<SkuDescription> {
        let sku = self.sku.as_deref().ok_or_else(|| AzureError::MissingPlanFields {
            fields: vec!["sku".to_string()],
        })?;
        Ok(SkuDescription {
            name: sku.to_string(),
            tier: Some(get_sku_name(sku)?.to_string()),
            capacity: self.number_of_workers,
        })
    }
}

/// Docker image settings for Linux container apps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSettings {
    pub name: String,
    pub registry_server_url: Option<String>,
    pub registry_server_user: Option<String>,
    pub registry_server_password: Option<String>,
}

impl ContainerSettings {
    fn from_value(value: &Value) -> ModuleResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ModuleError::InvalidParameter("container_settings must be a dict".to_string())
        })?;
        let params = sub_params(obj);
        Ok(Self {
            name: params
                .get_string("name")?
                .ok_or_else(|| ModuleError::MissingParameter("container_settings.name".to_string()))?,
            registry_server_url: params.get_string("registry_server_url")?,
            registry_server_user: params.get_string("registry_server_user")?,
            registry_server_password: params.get_string("registry_server_password")?,
        })
    }

    fn registry_host(&self) -> Option<&str> {
        self.registry_server_url.as_deref().map(|url| {
            let host = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .unwrap_or(url);
            host.trim_end_matches('/')
        })
    }

    /// `DOCKER|[registry/]image`
    pub fn linux_fx_version(&self) -> String {
        match self.registry_host() {
            Some(host) => format!("DOCKER|{}/{}", host, self.name),
            None => format!("DOCKER|{}", self.name),
        }
    }

    /// Registry app settings implied by these settings.
    pub fn app_settings(&self) -> BTreeMap<String, String> {
        let mut settings = BTreeMap::new();
        if let Some(url) = &self.registry_server_url {
            let url = if url.contains("://") {
                url.clone()
            } else {
                format!("https://{}", url)
            };
            settings.insert("DOCKER_REGISTRY_SERVER_URL".to_string(), url);
        }
        if let Some(user) = &self.registry_server_user {
            settings.insert("DOCKER_REGISTRY_SERVER_USERNAME".to_string(), user.clone());
        }
        if let Some(password) = &self.registry_server_password {
            settings.insert(
                "DOCKER_REGISTRY_SERVER_PASSWORD".to_string(),
                password.clone(),
            );
        }
        settings
    }
}

/// Repository the site deploys from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentSource {
    pub url: Option<String>,
    pub branch: Option<String>,
}

impl DeploymentSource {
    fn from_value(value: &Value) -> ModuleResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ModuleError::InvalidParameter("deployment_source must be a dict".to_string())
        })?;
        reject_unknown("deployment_source", obj, &["url", "branch"])?;
        let params = sub_params(obj);
        Ok(Self {
            url: params.get_string("url")?.filter(|url| !url.is_empty()),
            branch: params.get_string("branch")?,
        })
    }

    /// Source control binding to send, falling back to the live repository
    /// when no url is given. `None` when neither names a repository.
    pub fn binding(&self, live: Option<&SiteSourceControl>) -> Option<SiteSourceControl> {
        let url = self
            .url
            .clone()
            .or_else(|| live.and_then(|sc| sc.repo_url.clone()))
            .filter(|url| !url.is_empty())?;
        let branch = self
            .branch
            .clone()
            .or_else(|| live.and_then(|sc| sc.branch.clone()));
        Some(SiteSourceControl::new(Some(url), branch))
    }
}

/// Desired configuration of one Web App.
#[derive(Debug, Clone, PartialEq)]
pub struct WebAppSpec {
    pub resource_group: String,
    pub name: String,
    pub location: Option<String>,
    pub plan: Option<PlanSpec>,
    pub site_properties: BTreeMap<SiteProperty, Value>,
    pub site_config: BTreeMap<ConfigProperty, Value>,
    /// `None` leaves the live settings untouched.
    pub app_settings: Option<BTreeMap<String, String>>,
    pub deployment_source: Option<DeploymentSource>,
    pub startup_file: Option<String>,
    pub tags: Option<Tags>,
    pub append_tags: bool,
    pub state: DesiredState,
}

impl WebAppSpec {
    pub fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let resource_group = params.get_string_required("resource_group")?;
        let name = params.get_string_required("name")?;

        let state = match params.get_string("state")? {
            Some(s) => DesiredState::from_str(&s)?,
            None => DesiredState::default(),
        };

        let plan = match params.get("plan") {
            Some(Value::Null) | None => None,
            Some(value) => Some(PlanSpec::from_value(value, &resource_group)?),
        };

        let mut site_properties = BTreeMap::new();
        let mut site_config = BTreeMap::new();
        for (param, bucket) in fields::FIELD_ROUTES.iter() {
            let value = match bucket {
                Bucket::Site(prop) => read_typed(params, param, prop.kind())?,
                Bucket::Config(prop) => read_typed(params, param, prop.kind())?,
            };
            if let Some(value) = value {
                match bucket {
                    Bucket::Site(prop) => {
                        site_properties.insert(*prop, value);
                    }
                    Bucket::Config(prop) => {
                        site_config.insert(*prop, value);
                    }
                }
            }
        }

        if let Some(Value::Object(extra)) = params.get("site_config") {
            let allowed: Vec<&str> = ConfigProperty::EXTRA.iter().map(|p| p.param_name()).collect();
            reject_unknown("site_config", extra, &allowed)?;
            let extra_params = sub_params(extra);
            for prop in ConfigProperty::EXTRA {
                if let Some(value) = read_typed(&extra_params, prop.param_name(), prop.kind())? {
                    site_config.insert(prop, value);
                }
            }
        } else if matches!(params.get("site_config"), Some(v) if !v.is_null()) {
            return Err(ModuleError::InvalidParameter(
                "site_config must be a dict".to_string(),
            ));
        }

        if let Some(value) = params.get("java_container_settings").filter(|v| !v.is_null()) {
            let obj = value.as_object().ok_or_else(|| {
                ModuleError::InvalidParameter("java_container_settings must be a dict".to_string())
            })?;
            reject_unknown("java_container_settings", obj, &["name", "version"])?;
            let java = sub_params(obj);
            if let Some(container) = java.get_string("name")? {
                site_config.insert(ConfigProperty::JavaContainer, Value::String(container));
            }
            if let Some(version) = java.get_string("version")? {
                site_config.insert(ConfigProperty::JavaContainerVersion, Value::String(version));
            }
        }

        let mut app_settings = params.get_string_map("app_settings")?;

        if let Some(value) = params.get("container_settings").filter(|v| !v.is_null()) {
            if site_config.contains_key(&ConfigProperty::LinuxFxVersion) {
                return Err(AzureError::ConflictingConfiguration(
                    "Cannot set linux_fx_version with container_settings at same time".to_string(),
                )
                .into());
            }
            let container = ContainerSettings::from_value(value)?;
            site_config.insert(
                ConfigProperty::LinuxFxVersion,
                Value::String(container.linux_fx_version()),
            );
            let injected = container.app_settings();
            if !injected.is_empty() {
                app_settings.get_or_insert_with(BTreeMap::new).extend(injected);
            }
        }

        let deployment_source = match params.get("deployment_source") {
            Some(Value::Null) | None => None,
            Some(value) => Some(DeploymentSource::from_value(value)?),
        };

        Ok(Self {
            resource_group,
            name,
            location: params.get_string("location")?,
            plan,
            site_properties,
            site_config,
            app_settings,
            deployment_source,
            startup_file: params.get_string("startup_file")?,
            tags: params.get_string_map("tags")?,
            append_tags: params.get_bool("append_tags")?.unwrap_or(true),
            state,
        })
    }

    /// Site config as it applies to a plan of the given OS.
    ///
    /// On Linux plans `startup_file` becomes `app_command_line` unless that
    /// is set explicitly.
    pub fn effective_site_config(&self, is_linux: bool) -> BTreeMap<ConfigProperty, Value> {
        let mut config = self.site_config.clone();
        if is_linux {
            if let Some(startup) = &self.startup_file {
                config
                    .entry(ConfigProperty::AppCommandLine)
                    .or_insert_with(|| Value::String(startup.clone()));
            }
        }
        config
    }

    /// Build the create-or-update body for the site.
    ///
    /// App settings are embedded only when `with_app_settings` is set, which
    /// is the case for creation; updates send them separately.
    pub fn site_envelope(
        &self,
        location: &str,
        server_farm_id: &str,
        is_linux: bool,
        tags: Option<Tags>,
        with_app_settings: bool,
    ) -> SiteEnvelope {
        let mut site_config: Map<String, Value> = self
            .effective_site_config(is_linux)
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.arm_name().to_string(), v))
            .collect();

        if with_app_settings {
            if let Some(settings) = &self.app_settings {
                let pairs: Vec<Value> = settings
                    .iter()
                    .map(|(name, value)| NameValuePair {
                        name: name.clone(),
                        value: value.clone(),
                    })
                    .filter_map(|pair| serde_json::to_value(pair).ok())
                    .collect();
                site_config.insert("appSettings".to_string(), Value::Array(pairs));
            }
        }

        let flag = |p: SiteProperty| self.site_properties.get(&p).and_then(Value::as_bool);

        SiteEnvelope {
            location: location.to_string(),
            kind: None,
            tags,
            properties: SiteEnvelopeProperties {
                server_farm_id: server_farm_id.to_string(),
                reserved: Some(is_linux),
                client_affinity_enabled: flag(SiteProperty::ClientAffinityEnabled),
                https_only: flag(SiteProperty::HttpsOnly),
                site_config: if site_config.is_empty() {
                    None
                } else {
                    Some(site_config)
                },
            },
        }
    }
}

fn sub_params(obj: &Map<String, Value>) -> ModuleParams {
    obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn reject_unknown(parent: &str, obj: &Map<String, Value>, allowed: &[&str]) -> ModuleResult<()> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(ModuleError::InvalidParameter(format!(
            "Unsupported parameter '{}.{}'",
            parent, key
        ))),
        None => Ok(()),
    }
}

fn read_typed(params: &ModuleParams, key: &str, kind: ValueKind) -> ModuleResult<Option<Value>> {
    Ok(match kind {
        ValueKind::Bool => params.get_bool(key)?.map(Value::Bool),
        ValueKind::Int => params.get_i64(key)?.map(Value::from),
        ValueKind::Str => match params.get(key) {
            Some(Value::Null) | None => None,
            Some(_) => params.get_string(key)?.map(Value::String),
        },
    })
}
