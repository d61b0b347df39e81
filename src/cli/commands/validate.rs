//! Validate command - check a parameters file offline
//!
//! Runs parameter validation and the desired-state builder without making
//! any call to Azure.

use super::apply::MODULE_NAME;
use super::CommandContext;
use anyhow::{Context, Result};
use azure_webapp::modules::cloud::azure::WebAppSpec;
use azure_webapp::modules::{ModuleError, ModuleParams, ModuleResult};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// YAML or JSON file with the module parameters
    #[arg(required = true)]
    pub params: PathBuf,
}

impl ValidateArgs {
    fn build(ctx: &CommandContext, params: &ModuleParams) -> Result<ModuleResult<WebAppSpec>> {
        let registry = ctx.registry();
        let module = registry
            .get(MODULE_NAME)
            .with_context(|| format!("module '{}' is not registered", MODULE_NAME))?;

        let checked = module.validate_params(params).and_then(|()| {
            for param in module.required_params() {
                if !params.contains_key(*param) {
                    return Err(ModuleError::MissingParameter((*param).to_string()));
                }
            }
            WebAppSpec::from_params(params)
        });
        Ok(checked)
    }

    /// Execute the validate command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("PARAMETER VALIDATION");
        ctx.output
            .info(&format!("Validating: {}", self.params.display()));

        let params = match ctx.load_params(&self.params) {
            Ok(params) => params,
            Err(e) => {
                ctx.output.error(&e.to_string());
                return Ok(e.exit_code());
            }
        };

        let spec = match Self::build(ctx, &params)? {
            Ok(spec) => spec,
            Err(e) => {
                ctx.output.error(&e.to_string());
                ctx.output.emit(&json!({"valid": false, "error": e.to_string()}));
                return Ok(1);
            }
        };

        let plan = spec
            .plan
            .as_ref()
            .map(|p| format!("{}/{}", p.resource_group, p.name));
        let summary = json!({
            "valid": true,
            "resource_group": spec.resource_group,
            "name": spec.name,
            "state": format!("{:?}", spec.state).to_lowercase(),
            "plan": plan,
            "site_properties": spec.site_properties.keys().map(|p| p.param_name()).collect::<Vec<_>>(),
            "site_config": spec.site_config.keys().map(|p| p.param_name()).collect::<Vec<_>>(),
            "app_settings": spec.app_settings.as_ref().map(|s| s.keys().cloned().collect::<Vec<_>>()),
        });
        ctx.output.emit(&summary);

        ctx.output.section("Validation Results");
        let rows = vec![
            vec!["resource_group".to_string(), spec.resource_group.clone()],
            vec!["name".to_string(), spec.name.clone()],
            vec![
                "state".to_string(),
                format!("{:?}", spec.state).to_lowercase(),
            ],
            vec!["plan".to_string(), plan.unwrap_or_else(|| "-".to_string())],
        ];
        ctx.output.table(&["FIELD", "VALUE"], &rows);
        ctx.output.info("Parameters are valid.");

        Ok(0)
    }
}
