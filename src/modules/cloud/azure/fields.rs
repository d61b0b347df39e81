//! Static routing table for Web App configuration fields.
//!
//! Each user-facing field is routed either to the top-level site envelope
//! or to the nested `siteConfig` block. The table is the single source of
//! truth for the builder, the diff engine and the ARM adapter.

use serde_json::Value;
use std::fmt;

/// JSON type a field is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Str,
}

/// Direct properties of the site envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteProperty {
    ClientAffinityEnabled,
    HttpsOnly,
    ForceDnsRegistration,
    SkipDnsRegistration,
    SkipCustomDomainVerification,
    TtlInSeconds,
}

impl SiteProperty {
    pub const ALL: [SiteProperty; 6] = [
        SiteProperty::ClientAffinityEnabled,
        SiteProperty::HttpsOnly,
        SiteProperty::ForceDnsRegistration,
        SiteProperty::SkipDnsRegistration,
        SiteProperty::SkipCustomDomainVerification,
        SiteProperty::TtlInSeconds,
    ];

    /// Module parameter name.
    pub fn param_name(self) -> &'static str {
        match self {
            SiteProperty::ClientAffinityEnabled => "client_affinity_enabled",
            SiteProperty::HttpsOnly => "https_only",
            SiteProperty::ForceDnsRegistration => "force_dns_registration",
            SiteProperty::SkipDnsRegistration => "skip_dns_registration",
            SiteProperty::SkipCustomDomainVerification => "skip_custom_domain_verification",
            SiteProperty::TtlInSeconds => "ttl_in_seconds",
        }
    }

    /// Name used by the management API, either as an envelope property or,
    /// for request flags, as a query parameter.
    pub fn arm_name(self) -> &'static str {
        match self {
            SiteProperty::ClientAffinityEnabled => "clientAffinityEnabled",
            SiteProperty::HttpsOnly => "httpsOnly",
            SiteProperty::ForceDnsRegistration => "forceDnsRegistration",
            SiteProperty::SkipDnsRegistration => "skipDnsRegistration",
            SiteProperty::SkipCustomDomainVerification => "skipCustomDomainVerification",
            SiteProperty::TtlInSeconds => "ttlInSeconds",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            SiteProperty::TtlInSeconds => ValueKind::Int,
            _ => ValueKind::Bool,
        }
    }

    /// DNS and TTL flags travel as query parameters of the create-or-update
    /// call; the service never echoes them back in the site document.
    pub fn is_request_flag(self) -> bool {
        !matches!(
            self,
            SiteProperty::ClientAffinityEnabled | SiteProperty::HttpsOnly
        )
    }
}

impl fmt::Display for SiteProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param_name())
    }
}

/// Entries of the nested `siteConfig` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigProperty {
    NetFrameworkVersion,
    JavaVersion,
    PhpVersion,
    PythonVersion,
    LinuxFxVersion,
    JavaContainer,
    JavaContainerVersion,
    AppCommandLine,
    AlwaysOn,
    NumberOfWorkers,
}

impl ConfigProperty {
    pub const ALL: [ConfigProperty; 10] = [
        ConfigProperty::NetFrameworkVersion,
        ConfigProperty::JavaVersion,
        ConfigProperty::PhpVersion,
        ConfigProperty::PythonVersion,
        ConfigProperty::LinuxFxVersion,
        ConfigProperty::JavaContainer,
        ConfigProperty::JavaContainerVersion,
        ConfigProperty::AppCommandLine,
        ConfigProperty::AlwaysOn,
        ConfigProperty::NumberOfWorkers,
    ];

    /// Framework fields settable as top-level module parameters.
    pub const RUNTIME: [ConfigProperty; 5] = [
        ConfigProperty::NetFrameworkVersion,
        ConfigProperty::JavaVersion,
        ConfigProperty::PhpVersion,
        ConfigProperty::PythonVersion,
        ConfigProperty::LinuxFxVersion,
    ];

    /// Fields settable inside the `site_config` module parameter.
    pub const EXTRA: [ConfigProperty; 3] = [
        ConfigProperty::AppCommandLine,
        ConfigProperty::AlwaysOn,
        ConfigProperty::NumberOfWorkers,
    ];

    pub fn param_name(self) -> &'static str {
        match self {
            ConfigProperty::NetFrameworkVersion => "net_framework_version",
            ConfigProperty::JavaVersion => "java_version",
            ConfigProperty::PhpVersion => "php_version",
            ConfigProperty::PythonVersion => "python_version",
            ConfigProperty::LinuxFxVersion => "linux_fx_version",
            ConfigProperty::JavaContainer => "java_container",
            ConfigProperty::JavaContainerVersion => "java_container_version",
            ConfigProperty::AppCommandLine => "app_command_line",
            ConfigProperty::AlwaysOn => "always_on",
            ConfigProperty::NumberOfWorkers => "number_of_workers",
        }
    }

    pub fn arm_name(self) -> &'static str {
        match self {
            ConfigProperty::NetFrameworkVersion => "netFrameworkVersion",
            ConfigProperty::JavaVersion => "javaVersion",
            ConfigProperty::PhpVersion => "phpVersion",
            ConfigProperty::PythonVersion => "pythonVersion",
            ConfigProperty::LinuxFxVersion => "linuxFxVersion",
            ConfigProperty::JavaContainer => "javaContainer",
            ConfigProperty::JavaContainerVersion => "javaContainerVersion",
            ConfigProperty::AppCommandLine => "appCommandLine",
            ConfigProperty::AlwaysOn => "alwaysOn",
            ConfigProperty::NumberOfWorkers => "numberOfWorkers",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            ConfigProperty::AlwaysOn => ValueKind::Bool,
            ConfigProperty::NumberOfWorkers => ValueKind::Int,
            _ => ValueKind::Str,
        }
    }
}

impl fmt::Display for ConfigProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param_name())
    }
}

/// Destination of a top-level module parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Site(SiteProperty),
    Config(ConfigProperty),
}

/// Top-level parameters routed into the site envelope or the site config.
pub const FIELD_ROUTES: [(&str, Bucket); 11] = [
    (
        "client_affinity_enabled",
        Bucket::Site(SiteProperty::ClientAffinityEnabled),
    ),
    ("https_only", Bucket::Site(SiteProperty::HttpsOnly)),
    (
        "force_dns_registration",
        Bucket::Site(SiteProperty::ForceDnsRegistration),
    ),
    (
        "skip_dns_registration",
        Bucket::Site(SiteProperty::SkipDnsRegistration),
    ),
    (
        "skip_custom_domain_verification",
        Bucket::Site(SiteProperty::SkipCustomDomainVerification),
    ),
    ("ttl_in_seconds", Bucket::Site(SiteProperty::TtlInSeconds)),
    (
        "net_framework_version",
        Bucket::Config(ConfigProperty::NetFrameworkVersion),
    ),
    ("java_version", Bucket::Config(ConfigProperty::JavaVersion)),
    ("php_version", Bucket::Config(ConfigProperty::PhpVersion)),
    ("python_version", Bucket::Config(ConfigProperty::PythonVersion)),
    (
        "linux_fx_version",
        Bucket::Config(ConfigProperty::LinuxFxVersion),
    ),
];

/// Look up where a top-level parameter belongs.
pub fn route(param: &str) -> Option<Bucket> {
    FIELD_ROUTES
        .iter()
        .find(|(name, _)| *name == param)
        .map(|(_, bucket)| *bucket)
}

/// Loose equality between a desired and an observed JSON scalar.
///
/// Numbers compare by value, so `2` and `2.0` are the same worker count.
pub fn values_equal(desired: &Value, observed: &Value) -> bool {
    match (desired, observed) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => desired == observed,
    }
}
