//! Subcommands module for the azure-webapp CLI
//!
//! This module contains all the subcommand implementations.

pub mod apply;
pub mod check;
pub mod sku;
pub mod validate;

use crate::cli::output::OutputFormatter;
use azure_webapp::config::Config;
use azure_webapp::error::Result;
use azure_webapp::modules::cloud::AzureWebAppModule;
use azure_webapp::modules::{ModuleParams, ModuleRegistry};
use azure_webapp::params::{load_params_file, parse_extra_vars};
use std::path::Path;
use std::sync::Arc;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Extra variables
    pub extra_vars: Vec<String>,
    /// Verbosity level
    pub verbosity: u8,
    /// Check mode (dry-run)
    pub check_mode: bool,
    /// Diff mode
    pub diff_mode: bool,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.colors.enabled;
        let output = OutputFormatter::new(use_color, cli.output, cli.verbosity());

        Self {
            config,
            output,
            extra_vars: cli.extra_vars.clone(),
            verbosity: cli.verbosity(),
            check_mode: cli.check_mode,
            diff_mode: cli.diff_mode,
        }
    }

    /// Load module parameters from a file, with extra variables on top
    pub fn load_params(&self, path: &Path) -> Result<ModuleParams> {
        let mut params = load_params_file(path)?;
        params.extend(parse_extra_vars(&self.extra_vars)?);
        Ok(params)
    }

    /// Registry whose web app module uses the loaded configuration
    pub fn registry(&self) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(AzureWebAppModule::with_config(
            self.config.azure.clone(),
        )));
        registry
    }
}
