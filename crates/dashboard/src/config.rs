//! Dashboard configuration

use anyhow::Result;
use dashboard_lib::CollectorConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Title used when `DASHBOARD_TITLE` is unset or empty
pub const DEFAULT_TITLE: &str = "openshift-dashboard";

/// Dashboard configuration, read once from the process environment
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root of the static files
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Page title override
    #[serde(default)]
    pub dashboard_title: Option<String>,

    /// Deployment environment; `dev` enables dev mode
    #[serde(default)]
    pub go_env: Option<String>,

    /// Skip certificate verification against the cluster API
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Directory holding the `home.html` layout
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

fn default_port() -> u16 {
    8080
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_dir: default_public_dir(),
            dashboard_title: None,
            go_env: None,
            insecure_skip_tls_verify: false,
            template_dir: default_template_dir(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Dev mode disables the resources cache and reloads templates per request
    pub fn is_dev(&self) -> bool {
        self.go_env
            .as_deref()
            .is_some_and(|env| env.eq_ignore_ascii_case("dev"))
    }

    pub fn title(&self) -> &str {
        self.dashboard_title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            resources_cache_enabled: !self.is_dev(),
            ..CollectorConfig::default()
        }
    }
}
