//! Azure Resource Manager wire models for App Service.
//!
//! These mirror the JSON documents of the `Microsoft.Web` and
//! `Microsoft.Resources` providers closely enough for the reconciler; any
//! field the module does not manage is ignored on read and omitted on write.

use super::fields::{ConfigProperty, SiteProperty};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Resource tags.
pub type Tags = BTreeMap<String, String>;

/// Wrapper for sub-resources whose payload lives under `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmResource<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: T,
}

impl<T> ArmResource<T> {
    pub fn new(properties: T) -> Self {
        Self {
            id: None,
            name: None,
            properties,
        }
    }
}

/// A resource group as returned by `GET resourcegroups/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub location: String,
}

/// Pricing tier of an App Service Plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppServicePlanProperties {
    /// `true` for Linux plans.
    #[serde(default)]
    pub reserved: bool,
}

/// An App Service Plan (`Microsoft.Web/serverfarms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppServicePlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<SkuDescription>,
    #[serde(default)]
    pub properties: AppServicePlanProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl AppServicePlan {
    /// Build a plan creation body.
    pub fn definition(location: impl Into<String>, sku: SkuDescription, is_linux: bool) -> Self {
        Self {
            id: None,
            name: None,
            location: location.into(),
            kind: Some(if is_linux { "linux" } else { "app" }.to_string()),
            sku: Some(sku),
            properties: AppServicePlanProperties { reserved: is_linux },
            tags: None,
        }
    }

    pub fn is_linux(&self) -> bool {
        self.properties.reserved
    }
}

/// A single app setting in the `siteConfig.appSettings` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValuePair {
    pub name: String,
    pub value: String,
}

/// Properties of a site create-or-update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEnvelopeProperties {
    pub server_farm_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_affinity_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_config: Option<Map<String, Value>>,
}

/// Body of `PUT sites/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEnvelope {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    pub properties: SiteEnvelopeProperties,
}

impl SiteEnvelope {
    /// App settings carried inside `siteConfig`, if any.
    pub fn app_settings(&self) -> Option<BTreeMap<String, String>> {
        let list = self
            .properties
            .site_config
            .as_ref()?
            .get("appSettings")?
            .as_array()?;
        Some(
            list.iter()
                .filter_map(|v| serde_json::from_value::<NameValuePair>(v.clone()).ok())
                .map(|p| (p.name, p.value))
                .collect(),
        )
    }
}

/// Source control binding of a site (`sites/{name}/sourcecontrols/web`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSourceControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub is_manual_integration: bool,
    #[serde(default)]
    pub is_mercurial: bool,
}

impl SiteSourceControl {
    pub fn new(repo_url: Option<String>, branch: Option<String>) -> Self {
        Self {
            repo_url,
            branch,
            is_manual_integration: false,
            is_mercurial: false,
        }
    }

    /// A binding with no repository configured.
    pub fn is_empty(&self) -> bool {
        self.repo_url.as_deref().map_or(true, str::is_empty)
    }
}

/// Raw site document from `GET sites/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteDocument {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: Option<Tags>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Snapshot of a live Web App, merged from the site, its `config/web`
/// and its source control binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedWebApp {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Runtime state reported by the service, e.g. `Running`.
    pub state: String,
    pub tags: Tags,
    pub server_farm_id: Option<String>,
    pub reserved: bool,
    pub site_properties: BTreeMap<SiteProperty, Value>,
    pub site_config: BTreeMap<ConfigProperty, Value>,
    pub site_source_control: Option<SiteSourceControl>,
}

impl ObservedWebApp {
    pub fn from_document(doc: SiteDocument) -> Self {
        let props = &doc.properties;
        let str_prop = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);

        let site_properties = SiteProperty::ALL
            .iter()
            .filter_map(|p| {
                props
                    .get(p.arm_name())
                    .filter(|v| !v.is_null())
                    .map(|v| (*p, v.clone()))
            })
            .collect();

        let mut observed = Self {
            state: str_prop("state").unwrap_or_default(),
            server_farm_id: str_prop("serverFarmId"),
            reserved: props
                .get("reserved")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            site_properties,
            tags: doc.tags.clone().unwrap_or_default(),
            id: doc.id,
            name: doc.name,
            location: doc.location,
            site_config: BTreeMap::new(),
            site_source_control: None,
        };

        if let Some(Value::Object(config)) = doc.properties.get("siteConfig") {
            observed.merge_site_config(config);
        }
        observed
    }

    /// Overlay entries of a `siteConfig` / `config/web` properties object.
    pub fn merge_site_config(&mut self, config: &Map<String, Value>) {
        for prop in ConfigProperty::ALL.iter() {
            if let Some(value) = config.get(prop.arm_name()).filter(|v| !v.is_null()) {
                self.site_config.insert(*prop, value.clone());
            }
        }
    }

    pub fn with_source_control(mut self, source_control: Option<SiteSourceControl>) -> Self {
        self.site_source_control = source_control.filter(|sc| !sc.is_empty());
        self
    }

    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Creation-time flags passed as query parameters of `PUT sites/{name}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DnsFlags {
    pub skip_dns_registration: Option<bool>,
    pub skip_custom_domain_verification: Option<bool>,
    pub force_dns_registration: Option<bool>,
    pub ttl_in_seconds: Option<i64>,
}

impl DnsFlags {
    pub fn from_site_properties(props: &BTreeMap<SiteProperty, Value>) -> Self {
        let flag = |p: SiteProperty| props.get(&p).and_then(Value::as_bool);
        Self {
            skip_dns_registration: flag(SiteProperty::SkipDnsRegistration),
            skip_custom_domain_verification: flag(SiteProperty::SkipCustomDomainVerification),
            force_dns_registration: flag(SiteProperty::ForceDnsRegistration),
            ttl_in_seconds: props.get(&SiteProperty::TtlInSeconds).and_then(Value::as_i64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }

    /// Query parameters in the order the service documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.skip_dns_registration {
            pairs.push((SiteProperty::SkipDnsRegistration.arm_name(), v.to_string()));
        }
        if let Some(v) = self.skip_custom_domain_verification {
            pairs.push((
                SiteProperty::SkipCustomDomainVerification.arm_name(),
                v.to_string(),
            ));
        }
        if let Some(v) = self.force_dns_registration {
            pairs.push((SiteProperty::ForceDnsRegistration.arm_name(), v.to_string()));
        }
        if let Some(v) = self.ttl_in_seconds {
            pairs.push((SiteProperty::TtlInSeconds.arm_name(), v.to_string()));
        }
        pairs
    }
}
