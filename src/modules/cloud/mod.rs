//! Cloud provider modules for infrastructure provisioning.
//!
//! Currently covers Microsoft Azure App Service (Web Apps and App Service
//! Plans).

pub mod azure;

pub use azure::AzureWebAppModule;
