//! # azure-webapp - Declarative Azure Web App management
//!
//! azure-webapp converges an Azure Web App (and, when needed, the App
//! Service Plan hosting it) towards a declared desired state. It reads the
//! live resources through the Azure Resource Manager REST API, computes what
//! differs and issues only the calls needed to close the gap. Running it
//! twice with the same input changes nothing the second time.
//!
//! ## Core Concepts
//!
//! - **Desired state**: the parameters of the `azure_rm_webapp` module,
//!   normalized into a [`WebAppSpec`](modules::cloud::azure::WebAppSpec)
//! - **Observed state**: the live Web App with its site config, app settings
//!   and source control binding
//! - **Reconciler**: decides create, update, delete or nothing and sequences
//!   the calls
//! - **Check mode**: every read happens, no write does
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                             │
//! │                    (clap-based command parsing)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Module Registry (azure_rm_webapp)                   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │ Desired-state   │   │     Diff engine     │   │     Reconciler      │
//! │    builder      │   │                     │   │                     │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Resource client (ARM over reqwest)                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use azure_webapp::prelude::*;
//!
//! let registry = ModuleRegistry::with_builtins();
//! let params: ModuleParams = serde_json::from_value(serde_json::json!({
//!     "resource_group": "my-rg",
//!     "name": "my-webapp",
//!     "plan": {"name": "my-plan", "is_linux": true, "sku": "S1"},
//! }))?;
//! let output = registry.execute(
//!     "azure_rm_webapp",
//!     &params,
//!     &ModuleContext::new().with_check_mode(true),
//! )?;
//! println!("{}", output.msg);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{AzureConfig, Config};

    // Module system
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleResult, ModuleStatus,
    };

    // Azure
    pub use crate::modules::cloud::azure::{
        AzureError, AzureWebAppModule, Reconciler, ResourceClient, WebAppSpec,
    };
}

/// Error types and result aliases.
pub mod error;

/// Layered configuration: defaults, files and environment.
pub mod config;

/// Parameter files and extra variables.
pub mod params;

/// Module trait, registry and the built-in modules.
pub mod modules;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns detailed version information including build metadata.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Detailed version information for the build.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Target architecture
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "azure-webapp {} ({}, {})",
            self.version, self.target, self.profile
        )
    }
}
