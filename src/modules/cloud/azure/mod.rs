//! Azure cloud modules for infrastructure management.
//!
//! This module provides a native Rust implementation for managing Azure
//! Web Apps through the Azure Resource Manager REST API.
//!
//! ## Available Modules
//!
//! - [`AzureWebAppModule`](webapp::AzureWebAppModule): Web App and App Service Plan lifecycle
//!
//! ## Authentication
//!
//! Credentials are resolved in this order:
//!
//! 1. Module parameters (`subscription_id`, `client_id`, `secret`, `tenant`)
//! 2. Environment variables (`AZURE_SUBSCRIPTION_ID`, `AZURE_ACCESS_TOKEN`,
//!    `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`, `AZURE_TENANT_ID`)
//! 3. The `[azure]` section of the configuration file
//!
//! ## Example
//!
//! ```yaml
//! resource_group: my-rg
//! name: my-webapp
//! plan:
//!   resource_group: my-plans
//!   name: linux-plan
//!   is_linux: true
//!   sku: S1
//! container_settings:
//!   name: myimage:latest
//!   registry_server_url: myregistry.azurecr.io
//! app_settings:
//!   FEATURE_FLAG: "on"
//! https_only: true
//! tags:
//!   environment: production
//! ```

pub mod client;
pub mod credential;
pub mod desired;
pub mod diff;
pub mod error;
pub mod fields;
pub mod models;
pub mod reconcile;
pub mod sku;
pub mod webapp;

pub use client::{ArmClient, ResourceClient};
pub use desired::{DesiredState, PlanSpec, WebAppSpec};
pub use error::{AzureError, AzureResult};
pub use reconcile::{Action, Change, Reconciler, ReconciliationResult};
pub use webapp::AzureWebAppModule;
