//! Shared test utilities for the azure-webapp test suite.
//!
//! This module provides:
//! - `RecordingClient`, an in-memory stand-in for Azure that records every call
//! - Fixture helpers for parameters, specs and observed apps
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use azure_webapp::modules::cloud::azure::fields::SiteProperty;
use azure_webapp::modules::cloud::azure::models::{
    AppServicePlan, DnsFlags, ObservedWebApp, ResourceGroup, SiteEnvelope, SiteSourceControl,
    SkuDescription,
};
use azure_webapp::modules::cloud::azure::{AzureError, AzureResult, ResourceClient, WebAppSpec};
use azure_webapp::modules::ModuleParams;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Operations that change something in Azure.
pub const MUTATING_OPERATIONS: &[&str] = &[
    "create_or_update_webapp",
    "delete_webapp",
    "create_or_update_app_service_plan",
    "update_app_settings",
    "create_or_update_source_control",
];

type Key = (String, String);

fn key(resource_group: &str, name: &str) -> Key {
    (resource_group.to_lowercase(), name.to_lowercase())
}

pub fn site_id(resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}",
        SUBSCRIPTION, resource_group, name
    )
}

pub fn plan_id(resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/serverfarms/{}",
        SUBSCRIPTION, resource_group, name
    )
}

/// A call made against the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub resource_group: String,
    pub name: String,
}

// ============================================================================
// Recording Client
// ============================================================================

/// In-memory Azure that applies writes to its own state and records calls.
pub struct RecordingClient {
    resource_groups: RwLock<HashMap<String, String>>,
    webapps: RwLock<HashMap<Key, ObservedWebApp>>,
    settings: RwLock<HashMap<Key, BTreeMap<String, String>>>,
    plans: RwLock<HashMap<Key, AppServicePlan>>,
    calls: RwLock<Vec<Call>>,
    envelopes: RwLock<Vec<SiteEnvelope>>,
    flags: RwLock<Vec<DnsFlags>>,
    failure: RwLock<Option<(&'static str, u16)>>,
    call_count: AtomicU32,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            resource_groups: RwLock::new(HashMap::new()),
            webapps: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
            plans: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            envelopes: RwLock::new(Vec::new()),
            flags: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_resource_group(self, name: &str, location: &str) -> Self {
        self.resource_groups
            .write()
            .insert(name.to_lowercase(), location.to_string());
        self
    }

    pub fn with_plan(self, resource_group: &str, name: &str, is_linux: bool) -> Self {
        let mut plan = AppServicePlan::definition(
            "westus",
            SkuDescription {
                name: "S1".into(),
                tier: Some("STANDARD".into()),
                capacity: None,
            },
            is_linux,
        );
        plan.id = Some(plan_id(resource_group, name));
        plan.name = Some(name.to_string());
        self.plans.write().insert(key(resource_group, name), plan);
        self
    }

    pub fn with_webapp(self, resource_group: &str, app: ObservedWebApp) -> Self {
        self.webapps
            .write()
            .insert(key(resource_group, &app.name), app);
        self
    }

    pub fn with_settings(self, resource_group: &str, name: &str, settings: &[(&str, &str)]) -> Self {
        self.settings.write().insert(
            key(resource_group, name),
            settings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Make `operation` fail with `status`.
    pub fn fail_on(&self, operation: &'static str, status: u16) {
        *self.failure.write() = Some((operation, status));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls.read().iter().map(|c| c.operation).collect()
    }

    pub fn mutating_operations(&self) -> Vec<&'static str> {
        self.operations()
            .into_iter()
            .filter(|op| MUTATING_OPERATIONS.contains(op))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    pub fn webapp(&self, resource_group: &str, name: &str) -> Option<ObservedWebApp> {
        self.webapps.read().get(&key(resource_group, name)).cloned()
    }

    pub fn plan(&self, resource_group: &str, name: &str) -> Option<AppServicePlan> {
        self.plans.read().get(&key(resource_group, name)).cloned()
    }

    pub fn settings(&self, resource_group: &str, name: &str) -> BTreeMap<String, String> {
        self.settings
            .read()
            .get(&key(resource_group, name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_envelope(&self) -> Option<SiteEnvelope> {
        self.envelopes.read().last().cloned()
    }

    pub fn last_flags(&self) -> Option<DnsFlags> {
        self.flags.read().last().cloned()
    }

    fn record(&self, operation: &'static str, resource_group: &str, name: &str) -> AzureResult<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.write().push(Call {
            operation,
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        });
        match *self.failure.read() {
            Some((op, status)) if op == operation => Err(AzureError::upstream(
                operation,
                Some(status),
                "injected failure",
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceClient for RecordingClient {
    async fn get_resource_group(&self, name: &str) -> AzureResult<ResourceGroup> {
        self.record("get_resource_group", name, name)?;
        let location = self
            .resource_groups
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| AzureError::ResourceNotFound(format!("resource group '{}'", name)))?;
        Ok(ResourceGroup {
            id: None,
            name: Some(name.to_string()),
            location,
        })
    }

    async fn get_webapp(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<Option<ObservedWebApp>> {
        self.record("get_webapp", resource_group, name)?;
        Ok(self.webapp(resource_group, name).map(|app| {
            let source_control = app.site_source_control.clone();
            app.with_source_control(source_control)
        }))
    }

    async fn create_or_update_webapp(
        &self,
        resource_group: &str,
        name: &str,
        site: &SiteEnvelope,
        flags: &DnsFlags,
    ) -> AzureResult<ObservedWebApp> {
        self.record("create_or_update_webapp", resource_group, name)?;
        self.envelopes.write().push(site.clone());
        self.flags.write().push(flags.clone());

        let mut webapps = self.webapps.write();
        let created = !webapps.contains_key(&key(resource_group, name));
        let app = webapps
            .entry(key(resource_group, name))
            .or_insert_with(|| ObservedWebApp {
                id: site_id(resource_group, name),
                name: name.to_string(),
                location: site.location.clone(),
                state: "Running".to_string(),
                ..Default::default()
            });

        app.server_farm_id = Some(site.properties.server_farm_id.clone());
        if let Some(reserved) = site.properties.reserved {
            app.reserved = reserved;
        }
        if let Some(tags) = &site.tags {
            app.tags = tags.clone();
        }
        if let Some(v) = site.properties.client_affinity_enabled {
            app.site_properties
                .insert(SiteProperty::ClientAffinityEnabled, Value::Bool(v));
        }
        if let Some(v) = site.properties.https_only {
            app.site_properties
                .insert(SiteProperty::HttpsOnly, Value::Bool(v));
        }
        if let Some(config) = &site.properties.site_config {
            app.merge_site_config(config);
        }
        let app = app.clone();
        drop(webapps);

        if created {
            if let Some(settings) = site.app_settings() {
                self.settings.write().insert(key(resource_group, name), settings);
            }
        }
        Ok(app)
    }

    async fn delete_webapp(&self, resource_group: &str, name: &str) -> AzureResult<()> {
        self.record("delete_webapp", resource_group, name)?;
        self.webapps.write().remove(&key(resource_group, name));
        self.settings.write().remove(&key(resource_group, name));
        Ok(())
    }

    async fn get_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<Option<AppServicePlan>> {
        self.record("get_app_service_plan", resource_group, name)?;
        Ok(self.plan(resource_group, name))
    }

    async fn create_or_update_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
        plan: &AppServicePlan,
    ) -> AzureResult<AppServicePlan> {
        self.record("create_or_update_app_service_plan", resource_group, name)?;
        let mut stored = plan.clone();
        stored.id = Some(plan_id(resource_group, name));
        stored.name = Some(name.to_string());
        self.plans
            .write()
            .insert(key(resource_group, name), stored.clone());
        Ok(stored)
    }

    async fn list_app_settings(
        &self,
        resource_group: &str,
        name: &str,
    ) -> AzureResult<BTreeMap<String, String>> {
        self.record("list_app_settings", resource_group, name)?;
        Ok(self.settings(resource_group, name))
    }

    async fn update_app_settings(
        &self,
        resource_group: &str,
        name: &str,
        settings: &BTreeMap<String, String>,
    ) -> AzureResult<()> {
        self.record("update_app_settings", resource_group, name)?;
        self.settings
            .write()
            .insert(key(resource_group, name), settings.clone());
        Ok(())
    }

    async fn create_or_update_source_control(
        &self,
        resource_group: &str,
        name: &str,
        source_control: &SiteSourceControl,
    ) -> AzureResult<()> {
        self.record("create_or_update_source_control", resource_group, name)?;
        if let Some(app) = self.webapps.write().get_mut(&key(resource_group, name)) {
            app.site_source_control = Some(source_control.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn params(value: Value) -> ModuleParams {
    serde_json::from_value(value).expect("parameters must be a JSON object")
}

pub fn spec(value: Value) -> WebAppSpec {
    WebAppSpec::from_params(&params(value)).expect("valid web app parameters")
}

/// A running app on plan `farm` in `westus`.
pub fn running_app(resource_group: &str, name: &str, farm: &str) -> ObservedWebApp {
    ObservedWebApp {
        id: site_id(resource_group, name),
        name: name.to_string(),
        location: "westus".to_string(),
        state: "Running".to_string(),
        server_farm_id: Some(plan_id(resource_group, farm)),
        ..Default::default()
    }
}
