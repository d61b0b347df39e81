//! Reconciler: sequences the calls that converge a Web App.
//!
//! The action is decided once per run from the desired lifecycle state and
//! the observed app. Calls run strictly in dependency order (plan before
//! site, site before settings and source control). Any failed call aborts
//! the run; nothing already applied is rolled back. In check mode every
//! read still happens but no mutating call is made.

use super::client::ResourceClient;
use super::desired::{DesiredState, PlanSpec, WebAppSpec};
use super::diff::WebAppDiff;
use super::error::{AzureError, AzureResult};
use super::models::{AppServicePlan, DnsFlags, ObservedWebApp};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info};

/// What a run does to the Web App.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    NoAction,
    Create,
    Update(Box<ObservedWebApp>),
    Delete(Box<ObservedWebApp>),
}

impl Action {
    pub fn decide(state: DesiredState, observed: Option<ObservedWebApp>) -> Self {
        match (observed, state) {
            (None, DesiredState::Present) => Action::Create,
            (None, DesiredState::Absent) => Action::NoAction,
            (Some(app), DesiredState::Present) => Action::Update(Box::new(app)),
            (Some(app), DesiredState::Absent) => Action::Delete(Box::new(app)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::NoAction => "none",
            Action::Create => "create",
            Action::Update(_) => "update",
            Action::Delete(_) => "delete",
        }
    }
}

/// A single mutating call made, or planned in check mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    CreatePlan,
    CreateWebApp,
    UpdateSite,
    UpdateAppSettings,
    UpdateSourceControl,
    DeleteWebApp,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Change::CreatePlan => "create app service plan",
            Change::CreateWebApp => "create web app",
            Change::UpdateSite => "update site",
            Change::UpdateAppSettings => "update app settings",
            Change::UpdateSourceControl => "update source control",
            Change::DeleteWebApp => "delete web app",
        };
        f.write_str(s)
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationResult {
    pub changed: bool,
    pub id: Option<String>,
    pub state: Option<String>,
    pub action: &'static str,
    pub changes: Vec<Change>,
    /// Before/after views of what changed
    pub diff: Option<(Value, Value)>,
}

impl ReconciliationResult {
    fn unchanged(action: &Action, observed: Option<&ObservedWebApp>) -> Self {
        Self {
            changed: false,
            id: observed.map(|o| o.id.clone()),
            state: observed.map(|o| o.state.clone()),
            action: action.name(),
            changes: Vec::new(),
            diff: None,
        }
    }
}

/// Drives a [`ResourceClient`] towards a [`WebAppSpec`].
pub struct Reconciler<'a> {
    client: &'a dyn ResourceClient,
    check_mode: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn ResourceClient, check_mode: bool) -> Self {
        Self { client, check_mode }
    }

    pub async fn reconcile(&self, desired: &WebAppSpec) -> AzureResult<ReconciliationResult> {
        let observed = self
            .client
            .get_webapp(&desired.resource_group, &desired.name)
            .await?;

        let action = Action::decide(desired.state, observed);
        info!(
            resource_group = %desired.resource_group,
            name = %desired.name,
            action = action.name(),
            check_mode = self.check_mode,
            "Reconciling web app"
        );

        match action {
            Action::NoAction => Ok(ReconciliationResult::unchanged(&Action::NoAction, None)),
            Action::Create => self.create(desired).await,
            Action::Update(observed) => self.update(desired, *observed).await,
            Action::Delete(observed) => self.delete(desired, *observed).await,
        }
    }

    async fn resource_group_location(&self, resource_group: &str) -> AzureResult<String> {
        match self.client.get_resource_group(resource_group).await {
            Ok(group) => Ok(group.location),
            Err(e) if e.is_not_found() => Err(AzureError::upstream(
                "get_resource_group",
                Some(404),
                format!("resource group '{}' not found", resource_group),
            )),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, desired: &WebAppSpec) -> AzureResult<ReconciliationResult> {
        let location = match &desired.location {
            Some(location) => location.clone(),
            None => self.resource_group_location(&desired.resource_group).await?,
        };

        let plan_spec = desired
            .plan
            .as_ref()
            .ok_or_else(|| AzureError::MissingPlanFields {
                fields: vec!["name".into(), "is_linux".into(), "sku".into()],
            })?;

        let existing_plan = self
            .client
            .get_app_service_plan(&plan_spec.resource_group, &plan_spec.name)
            .await?;

        let mut changes = Vec::new();
        if existing_plan.is_none() {
            let missing = plan_spec.missing_create_fields();
            if !missing.is_empty() {
                return Err(AzureError::MissingPlanFields { fields: missing });
            }
            changes.push(Change::CreatePlan);
        }
        changes.push(Change::CreateWebApp);
        let binding = desired
            .deployment_source
            .as_ref()
            .and_then(|source| source.binding(None));
        if binding.is_some() {
            changes.push(Change::UpdateSourceControl);
        }

        let diff = Some((
            json!({}),
            json!({
                "name": desired.name,
                "location": location,
                "plan": format!("{}/{}", plan_spec.resource_group, plan_spec.name),
            }),
        ));

        if self.check_mode {
            return Ok(ReconciliationResult {
                changed: true,
                id: None,
                state: None,
                action: Action::Create.name(),
                changes,
                diff,
            });
        }

        let plan = match existing_plan {
            Some(plan) => plan,
            None => self.create_plan(plan_spec).await?,
        };
        let plan_id = plan.id.clone().ok_or_else(|| {
            AzureError::upstream(
                "get_app_service_plan",
                None,
                format!("app service plan '{}' has no id", plan_spec.name),
            )
        })?;

        let envelope = desired.site_envelope(
            &location,
            &plan_id,
            plan.is_linux(),
            desired.tags.clone(),
            true,
        );
        let flags = DnsFlags::from_site_properties(&desired.site_properties);

        info!(name = %desired.name, plan = %plan_id, "Creating web app");
        let site = self
            .client
            .create_or_update_webapp(&desired.resource_group, &desired.name, &envelope, &flags)
            .await?;

        if let Some(binding) = &binding {
            self.client
                .create_or_update_source_control(&desired.resource_group, &desired.name, binding)
                .await?;
        }

        Ok(ReconciliationResult {
            changed: true,
            id: Some(site.id),
            state: Some(site.state),
            action: Action::Create.name(),
            changes,
            diff,
        })
    }

    async fn create_plan(&self, spec: &PlanSpec) -> AzureResult<AppServicePlan> {
        let location = match &spec.location {
            Some(location) => location.clone(),
            None => self.resource_group_location(&spec.resource_group).await?,
        };
        let is_linux = spec.is_linux.ok_or_else(|| AzureError::MissingPlanFields {
            fields: vec!["is_linux".into()],
        })?;
        let definition = AppServicePlan::definition(location, spec.sku_description()?, is_linux);

        info!(resource_group = %spec.resource_group, name = %spec.name, "Creating app service plan");
        self.client
            .create_or_update_app_service_plan(&spec.resource_group, &spec.name, &definition)
            .await
    }

    async fn update(
        &self,
        desired: &WebAppSpec,
        observed: ObservedWebApp,
    ) -> AzureResult<ReconciliationResult> {
        let observed_settings = match desired.app_settings {
            Some(_) => Some(
                self.client
                    .list_app_settings(&desired.resource_group, &desired.name)
                    .await?,
            ),
            None => None,
        };

        let diff = WebAppDiff::compute(desired, &observed, observed_settings.as_ref());
        debug!(
            site = diff.needs_site_update,
            config = diff.needs_config_update,
            settings = diff.needs_settings_update,
            source_control = diff.needs_source_control_update,
            "Computed web app diff"
        );

        let action = Action::Update(Box::new(observed.clone()));
        if !diff.any() {
            return Ok(ReconciliationResult::unchanged(&action, Some(&observed)));
        }

        let mut changes = Vec::new();
        if diff.needs_site_envelope() {
            changes.push(Change::UpdateSite);
        }
        if diff.needs_settings_update {
            changes.push(Change::UpdateAppSettings);
        }
        if diff.needs_source_control_update {
            changes.push(Change::UpdateSourceControl);
        }

        let mut result = ReconciliationResult {
            changed: true,
            id: Some(observed.id.clone()),
            state: Some(observed.state.clone()),
            action: action.name(),
            changes,
            diff: Some(diff.render(desired, &observed)),
        };

        if self.check_mode {
            return Ok(result);
        }

        if diff.needs_site_envelope() {
            let server_farm_id = observed.server_farm_id.as_deref().ok_or_else(|| {
                AzureError::upstream("get_webapp", None, "web app has no serverFarmId")
            })?;
            let envelope = desired.site_envelope(
                &observed.location,
                server_farm_id,
                observed.reserved,
                Some(diff.merged_tags.clone()),
                false,
            );
            let flags = DnsFlags::from_site_properties(&desired.site_properties);
            let site = self
                .client
                .create_or_update_webapp(&desired.resource_group, &desired.name, &envelope, &flags)
                .await?;
            result.id = Some(site.id);
            result.state = Some(site.state);
        }

        if diff.needs_settings_update {
            if let Some(settings) = &desired.app_settings {
                info!(keys = ?diff.changed_setting_keys, "Updating app settings");
                self.client
                    .update_app_settings(&desired.resource_group, &desired.name, settings)
                    .await?;
            }
        }

        if diff.needs_source_control_update {
            let binding = desired
                .deployment_source
                .as_ref()
                .and_then(|source| source.binding(observed.site_source_control.as_ref()));
            if let Some(binding) = &binding {
                self.client
                    .create_or_update_source_control(&desired.resource_group, &desired.name, binding)
                    .await?;
            }
        }

        Ok(result)
    }

    async fn delete(
        &self,
        desired: &WebAppSpec,
        observed: ObservedWebApp,
    ) -> AzureResult<ReconciliationResult> {
        let result = ReconciliationResult {
            changed: true,
            id: Some(observed.id.clone()),
            state: None,
            action: Action::Delete(Box::new(observed.clone())).name(),
            changes: vec![Change::DeleteWebApp],
            diff: Some((json!({"id": observed.id}), json!({}))),
        };

        if self.check_mode {
            return Ok(result);
        }

        info!(resource_group = %desired.resource_group, name = %desired.name, "Deleting web app");
        self.client
            .delete_webapp(&desired.resource_group, &desired.name)
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cloud::azure::client::MockResourceClient;
    use crate::modules::cloud::azure::models::{ResourceGroup, SiteEnvelope};
    use crate::modules::ModuleParams;
    use std::collections::BTreeMap;

    fn spec(value: Value) -> WebAppSpec {
        let params: ModuleParams = serde_json::from_value(value).unwrap();
        WebAppSpec::from_params(&params).unwrap()
    }

    fn running_app() -> ObservedWebApp {
        ObservedWebApp {
            id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/sites/app".into(),
            name: "app".into(),
            location: "westus".into(),
            state: "Running".into(),
            server_farm_id: Some("farm".into()),
            ..Default::default()
        }
    }

    fn plan(reserved: bool) -> AppServicePlan {
        let mut plan = AppServicePlan::definition(
            "westus",
            crate::modules::cloud::azure::models::SkuDescription {
                name: "S1".into(),
                tier: None,
                capacity: None,
            },
            reserved,
        );
        plan.id = Some("farm".into());
        plan
    }

    #[test]
    fn test_decide() {
        assert_eq!(Action::decide(DesiredState::Absent, None), Action::NoAction);
        assert_eq!(Action::decide(DesiredState::Present, None), Action::Create);
        assert_eq!(
            Action::decide(DesiredState::Present, Some(running_app())).name(),
            "update"
        );
        assert_eq!(
            Action::decide(DesiredState::Absent, Some(running_app())).name(),
            "delete"
        );
    }

    #[tokio::test]
    async fn test_absent_and_missing_is_noop() {
        let mut client = MockResourceClient::new();
        client.expect_get_webapp().returning(|_, _| Ok(None));
        client.expect_delete_webapp().never();

        let result = Reconciler::new(&client, false)
            .reconcile(&spec(json!({"resource_group": "rg", "name": "app", "state": "absent"})))
            .await
            .unwrap();
        assert!(!result.changed);
        assert!(result.changes.is_empty());
    }

    #[tokio::test]
    async fn test_create_without_plan_fails_before_mutation() {
        let mut client = MockResourceClient::new();
        client.expect_get_webapp().returning(|_, _| Ok(None));
        client.expect_get_resource_group().returning(|_| {
            Ok(ResourceGroup {
                id: None,
                name: None,
                location: "westus".into(),
            })
        });
        client.expect_create_or_update_webapp().never();
        client.expect_create_or_update_app_service_plan().never();

        let err = Reconciler::new(&client, false)
            .reconcile(&spec(json!({"resource_group": "rg", "name": "app"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AzureError::MissingPlanFields { .. }));
    }

    #[tokio::test]
    async fn test_create_uses_existing_plan() {
        let mut client = MockResourceClient::new();
        client.expect_get_webapp().returning(|_, _| Ok(None));
        client
            .expect_get_app_service_plan()
            .withf(|rg, name| rg == "rg" && name == "shared")
            .returning(|_, _| Ok(Some(plan(true))));
        client.expect_create_or_update_app_service_plan().never();
        client
            .expect_create_or_update_webapp()
            .withf(|_, _, site: &SiteEnvelope, flags: &DnsFlags| {
                site.properties.server_farm_id == "farm"
                    && site.properties.reserved == Some(true)
                    && site.location == "eastus"
                    && flags.skip_dns_registration == Some(true)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(running_app()));

        let result = Reconciler::new(&client, false)
            .reconcile(&spec(json!({
                "resource_group": "rg",
                "name": "app",
                "location": "eastus",
                "plan": "shared",
                "skip_dns_registration": true
            })))
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.changes, vec![Change::CreateWebApp]);
        assert_eq!(result.state.as_deref(), Some("Running"));
    }

    #[tokio::test]
    async fn test_update_check_mode_makes_no_mutations() {
        let mut client = MockResourceClient::new();
        client
            .expect_get_webapp()
            .returning(|_, _| Ok(Some(running_app())));
        client.expect_list_app_settings().returning(|_, _| {
            let mut settings = BTreeMap::new();
            settings.insert("A".to_string(), "1".to_string());
            Ok(settings)
        });
        client.expect_create_or_update_webapp().never();
        client.expect_update_app_settings().never();

        let result = Reconciler::new(&client, true)
            .reconcile(&spec(json!({
                "resource_group": "rg",
                "name": "app",
                "https_only": true,
                "app_settings": {"A": "2"}
            })))
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(
            result.changes,
            vec![Change::UpdateSite, Change::UpdateAppSettings]
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_fatal() {
        let mut client = MockResourceClient::new();
        client.expect_get_webapp().returning(|_, _| {
            Err(AzureError::upstream("get_webapp", Some(500), "boom"))
        });

        let err = Reconciler::new(&client, false)
            .reconcile(&spec(json!({"resource_group": "rg", "name": "app"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AzureError::UpstreamCallFailure {
                status: Some(500),
                ..
            }
        ));
    }
}
