//! Configuration for access models and the package registry.
//!
//! The host builds one [`AccessConfig`] at startup, either with
//! [`ConfigBuilder`] or from JSON, and passes it by reference to the
//! constructors that need it. There is no process-global configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::path::VirtualPath;

/// Default registry base (the public Typst package index).
pub const DEFAULT_REGISTRY_URL: &str = "https://packages.typst.org/";

/// Default fetch target template.
pub const DEFAULT_URL_TEMPLATE: &str = "{base}{namespace}/{name}-{version}.tar.gz";

/// Default mount directory for materialized packages.
pub const DEFAULT_CACHE_ROOT: &str = "packages";

/// Default number of warm+retry cycles after the first compile attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessConfig {
    /// Registry base location, substituted for `{base}` in the template.
    pub registry_url: String,
    /// Fetch target template. Placeholders: `{base}`, `{namespace}`,
    /// `{name}`, `{version}`.
    pub url_template: String,
    /// Mount directory under which packages are materialized.
    pub cache_root: String,
    /// Limit for a single pull or warm, in milliseconds in JSON.
    #[serde(rename = "warmTimeoutMs", with = "millis")]
    pub warm_timeout: Option<Duration>,
    /// Number of warm+retry cycles the bridge may run after a miss.
    pub max_retries: usize,
    /// User-Agent for the HTTP downloader transport.
    pub user_agent: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            cache_root: DEFAULT_CACHE_ROOT.to_string(),
            warm_timeout: None,
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: concat!("typst-access/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AccessConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    ///
    /// ```
    /// use typst_access::config::AccessConfig;
    ///
    /// let config = AccessConfig::from_json(r#"{
    ///     "registryUrl": "https://pkgs.example/",
    ///     "warmTimeoutMs": 5000
    /// }"#).unwrap();
    /// assert_eq!(config.registry_url, "https://pkgs.example/");
    /// ```
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that parsing alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache_root_path()?;
        if !self.url_template.contains("{name}") || !self.url_template.contains("{version}") {
            return Err(ConfigError::Invalid {
                field: "url_template",
                reason: "must contain `{name}` and `{version}`".into(),
            });
        }
        if self.warm_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid {
                field: "warm_timeout",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// The packages root as a directory path.
    pub fn cache_root_path(&self) -> Result<VirtualPath, ConfigError> {
        VirtualPath::new(&self.cache_root)
            .map(VirtualPath::into_dir)
            .map_err(|err| ConfigError::Invalid {
                field: "cache_root",
                reason: err.to_string(),
            })
    }
}

/// Configuration builder for fluent API.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    registry_url: Option<String>,
    url_template: Option<String>,
    cache_root: Option<String>,
    warm_timeout: Option<Duration>,
    max_retries: Option<usize>,
    user_agent: Option<String>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry base location.
    ///
    /// Default: `https://packages.typst.org/`
    pub fn registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self
    }

    /// Set the fetch target template.
    pub fn url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    /// Set the mount directory for materialized packages.
    ///
    /// Default: `packages`
    pub fn cache_root(mut self, root: impl Into<String>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Bound every pull and warm by `timeout`.
    pub fn warm_timeout(mut self, timeout: Duration) -> Self {
        self.warm_timeout = Some(timeout);
        self
    }

    /// Set the number of warm+retry cycles after a miss.
    ///
    /// Default: 3
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the User-Agent string for package downloads.
    ///
    /// Default: "typst-access/{version}"
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<AccessConfig, ConfigError> {
        let defaults = AccessConfig::default();
        let config = AccessConfig {
            registry_url: self.registry_url.unwrap_or(defaults.registry_url),
            url_template: self.url_template.unwrap_or(defaults.url_template),
            cache_root: self.cache_root.unwrap_or(defaults.cache_root),
            warm_timeout: self.warm_timeout.or(defaults.warm_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        };
        config.validate()?;
        Ok(config)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
