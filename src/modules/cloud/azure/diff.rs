//! Diff engine: desired vs. observed Web App state.
//!
//! Everything here is pure. Null desired values never count as a change.

use super::desired::{DeploymentSource, WebAppSpec};
use super::fields::{values_equal, ConfigProperty, SiteProperty};
use super::models::{ObservedWebApp, SiteSourceControl, Tags};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Which sub-resources of an existing Web App need an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebAppDiff {
    pub needs_site_update: bool,
    pub needs_config_update: bool,
    pub needs_settings_update: bool,
    pub needs_source_control_update: bool,
    /// Tags to send with a site update
    pub merged_tags: Tags,
    pub changed_site_properties: Vec<SiteProperty>,
    pub changed_site_config: Vec<ConfigProperty>,
    /// Keys added, removed or changed; values are never recorded
    pub changed_setting_keys: Vec<String>,
}

impl WebAppDiff {
    /// Compare `desired` with `observed`.
    ///
    /// `observed_settings` is the live app settings map, fetched only when
    /// the desired state manages settings. Site and config changes only
    /// count while the app is running.
    pub fn compute(
        desired: &WebAppSpec,
        observed: &ObservedWebApp,
        observed_settings: Option<&BTreeMap<String, String>>,
    ) -> Self {
        let running = observed.is_running();

        let merged_tags = merge_tags(&observed.tags, desired.tags.as_ref(), desired.append_tags);
        let tags_changed = merged_tags != observed.tags;

        let changed_site_properties =
            changed_site_properties(&desired.site_properties, &observed.site_properties);
        let changed_site_config = changed_site_config(
            &desired.effective_site_config(observed.reserved),
            &observed.site_config,
        );

        let empty = BTreeMap::new();
        let (needs_settings_update, changed_setting_keys) = match &desired.app_settings {
            Some(wanted) => {
                let live = observed_settings.unwrap_or(&empty);
                (
                    app_settings_changed(wanted, live),
                    changed_setting_keys(wanted, live),
                )
            }
            None => (false, Vec::new()),
        };

        Self {
            needs_site_update: running && (tags_changed || !changed_site_properties.is_empty()),
            needs_config_update: running && !changed_site_config.is_empty(),
            needs_settings_update,
            needs_source_control_update: source_control_changed(
                desired.deployment_source.as_ref(),
                observed.site_source_control.as_ref(),
            ),
            merged_tags,
            changed_site_properties,
            changed_site_config,
            changed_setting_keys,
        }
    }

    /// Whether a site create-or-update call is needed.
    pub fn needs_site_envelope(&self) -> bool {
        self.needs_site_update || self.needs_config_update
    }

    pub fn any(&self) -> bool {
        self.needs_site_envelope() || self.needs_settings_update || self.needs_source_control_update
    }

    /// Before/after views of the changed sub-resources, for diff output.
    pub fn render(&self, desired: &WebAppSpec, observed: &ObservedWebApp) -> (Value, Value) {
        let mut before = Map::new();
        let mut after = Map::new();

        if self.needs_site_update {
            if self.merged_tags != observed.tags {
                before.insert("tags".into(), json!(observed.tags));
                after.insert("tags".into(), json!(self.merged_tags));
            }
            for prop in &self.changed_site_properties {
                let key = prop.param_name().to_string();
                before.insert(
                    key.clone(),
                    observed.site_properties.get(prop).cloned().unwrap_or(Value::Null),
                );
                after.insert(
                    key,
                    desired.site_properties.get(prop).cloned().unwrap_or(Value::Null),
                );
            }
        }

        if self.needs_config_update {
            let wanted = desired.effective_site_config(observed.reserved);
            let mut before_config = Map::new();
            let mut after_config = Map::new();
            for prop in &self.changed_site_config {
                let key = prop.param_name().to_string();
                before_config.insert(
                    key.clone(),
                    observed.site_config.get(prop).cloned().unwrap_or(Value::Null),
                );
                after_config.insert(key, wanted.get(prop).cloned().unwrap_or(Value::Null));
            }
            before.insert("site_config".into(), Value::Object(before_config));
            after.insert("site_config".into(), Value::Object(after_config));
        }

        if self.needs_settings_update {
            after.insert("app_settings_changed".into(), json!(self.changed_setting_keys));
        }

        if self.needs_source_control_update {
            before.insert(
                "deployment_source".into(),
                observed
                    .site_source_control
                    .as_ref()
                    .map(|sc| json!({"url": sc.repo_url, "branch": sc.branch}))
                    .unwrap_or(Value::Null),
            );
            after.insert(
                "deployment_source".into(),
                desired
                    .deployment_source
                    .as_ref()
                    .map(|ds| json!({"url": ds.url, "branch": ds.branch}))
                    .unwrap_or(Value::Null),
            );
        }

        (Value::Object(before), Value::Object(after))
    }
}

/// Tags after applying the desired tags to the observed ones.
pub fn merge_tags(observed: &Tags, desired: Option<&Tags>, append: bool) -> Tags {
    match desired {
        None => observed.clone(),
        Some(desired) if append => {
            let mut merged = observed.clone();
            merged.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        }
        Some(desired) => desired.clone(),
    }
}

/// Site properties whose desired value differs from the observed one.
///
/// Request-only flags are compared only when the service reports them.
pub fn changed_site_properties(
    desired: &BTreeMap<SiteProperty, Value>,
    observed: &BTreeMap<SiteProperty, Value>,
) -> Vec<SiteProperty> {
    desired
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter(|(prop, value)| match observed.get(*prop) {
            Some(current) => !values_equal(value, current),
            None => !prop.is_request_flag(),
        })
        .map(|(prop, _)| *prop)
        .collect()
}

/// Site config entries whose desired value differs from the observed one.
pub fn changed_site_config(
    desired: &BTreeMap<ConfigProperty, Value>,
    observed: &BTreeMap<ConfigProperty, Value>,
) -> Vec<ConfigProperty> {
    desired
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter(|(prop, value)| {
            observed
                .get(*prop)
                .map_or(true, |current| !values_equal(value, current))
        })
        .map(|(prop, _)| *prop)
        .collect()
}

/// Keys whose presence or value differs between two settings maps.
pub fn changed_setting_keys(
    desired: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
) -> Vec<String> {
    let keys: BTreeSet<&String> = desired.keys().chain(observed.keys()).collect();
    keys.into_iter()
        .filter(|k| desired.get(*k) != observed.get(*k))
        .cloned()
        .collect()
}

/// Exact-membership comparison of app settings.
pub fn app_settings_changed(
    desired: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
) -> bool {
    desired.len() != observed.len()
        || desired
            .iter()
            .any(|(k, v)| observed.get(k).map_or(true, |current| current != v))
}

/// Whether the deployment source differs from the live binding.
pub fn source_control_changed(
    desired: Option<&DeploymentSource>,
    observed: Option<&SiteSourceControl>,
) -> bool {
    let Some(desired) = desired else {
        return false;
    };
    if desired.binding(observed).is_none() {
        return false;
    }
    let observed_url = observed.and_then(|sc| sc.repo_url.as_deref());
    let observed_branch = observed.and_then(|sc| sc.branch.as_deref());

    let url_changed = desired
        .url
        .as_deref()
        .map_or(false, |url| Some(url) != observed_url);
    let branch_changed = desired
        .branch
        .as_deref()
        .map_or(false, |branch| Some(branch) != observed_branch);

    url_changed || branch_changed
}
