//! Check command - Dry-run mode
//!
//! This module implements the `check` subcommand, `apply` forced into
//! check mode.

use super::apply::ApplyArgs;
use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the check command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// YAML or JSON file with the module parameters
    #[arg(required = true)]
    pub params: PathBuf,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        // Force check mode
        ctx.check_mode = true;

        ctx.output.banner("CHECK MODE - DRY RUN");
        ctx.output.warning("No changes will be made in Azure");

        ApplyArgs {
            params: self.params.clone(),
        }
        .execute(ctx)
        .await
    }
}
