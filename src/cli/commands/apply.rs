//! Apply command - converge a web app
//!
//! This module implements the `apply` subcommand, which runs the
//! `azure_rm_webapp` module against a parameters file.

use super::CommandContext;
use anyhow::{Context, Result};
use azure_webapp::modules::{ModuleContext, ModuleOutput, ModuleStatus};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the module the CLI drives
pub const MODULE_NAME: &str = "azure_rm_webapp";

/// Arguments for the apply command
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// YAML or JSON file with the module parameters
    #[arg(required = true)]
    pub params: PathBuf,
}

impl ApplyArgs {
    /// Execute the apply command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let params = match ctx.load_params(&self.params) {
            Ok(params) => params,
            Err(e) => {
                ctx.output.error(&e.to_string());
                return Ok(e.exit_code());
            }
        };
        ctx.output
            .debug(&format!("Loaded {} parameters from {}", params.len(), self.params.display()));

        let registry = Arc::new(ctx.registry());
        let context = ModuleContext::new()
            .with_check_mode(ctx.check_mode)
            .with_diff_mode(ctx.diff_mode);

        ctx.output.banner(&format!("WEBAPP [{}]", self.params.display()));

        let result = tokio::task::spawn_blocking(move || {
            registry.execute(MODULE_NAME, &params, &context)
        })
        .await
        .context("Module task failed")?;

        let output = match result {
            Ok(output) => output,
            Err(e) => ModuleOutput::failed(e.to_string()),
        };
        ctx.output.module_result(MODULE_NAME, &output);

        Ok(match output.status {
            ModuleStatus::Failed => 2,
            ModuleStatus::Ok | ModuleStatus::Changed => 0,
        })
    }
}
