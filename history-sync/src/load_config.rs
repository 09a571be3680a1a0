/// `load_config` module: loads the static YAML config and injects the provider secret from the
/// environment.
///
/// This is the only place where untrusted YAML is parsed into typed configuration.
///
/// # Responsibilities
/// - Parse the config file into [`AppConfig`] (`provider`, `store`, `sync`, `server`,
///   `account_groups` sections)
/// - Inject `PROVIDER_API_KEY` from the environment; the file never holds secrets
/// - Fail fast with a clear message on anything the CLI or server could not run with
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use history_sync_core::config::{AccountGroup, SyncConfig};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const API_KEY_ENV: &str = "PROVIDER_API_KEY";

#[derive(Debug)]
pub struct AppConfig {
    pub provider: ProviderSection,
    pub store: StoreSection,
    pub sync: SyncConfig,
    pub server: ServerSection,
    pub account_groups: Vec<AccountGroup>,
}

#[derive(Clone, Deserialize)]
pub struct ProviderSection {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Filled from the environment, never from the file.
    #[serde(skip)]
    pub api_key: String,
}

impl fmt::Debug for ProviderSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSection")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl AppConfig {
    pub fn group(&self, id: &str) -> Option<&AccountGroup> {
        self.account_groups.iter().find(|g| g.id == id)
    }

    pub fn trace_loaded(&self) {
        info!(
            provider_base_url = %self.provider.base_url,
            data_dir = ?self.store.data_dir,
            bind = %self.server.bind,
            account_groups = self.account_groups.len(),
            "Loaded AppConfig"
        );
        self.sync.trace_loaded();
        debug!(?self, "AppConfig loaded (full debug)");
    }
}

/// Loads the YAML config at `path` and injects `PROVIDER_API_KEY` from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        provider: ProviderSection,
        store: StoreSection,
        #[serde(default)]
        sync: SyncConfig,
        #[serde(default)]
        server: ServerSection,
        #[serde(default)]
        account_groups: Vec<AccountGroup>,
    }

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut provider = raw.provider;
    validate_base_url(&provider.base_url)?;
    provider.base_url = provider.base_url.trim_end_matches('/').to_string();

    provider.api_key = match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!(env = API_KEY_ENV, "Provider API key missing in environment");
            return Err(anyhow::anyhow!(
                "{API_KEY_ENV} must be set in the environment"
            ));
        }
    };

    let mut seen = HashSet::new();
    for group in &raw.account_groups {
        if !seen.insert(group.id.as_str()) {
            return Err(anyhow::anyhow!("Duplicate account group id '{}'", group.id));
        }
        if group.profile_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Account group '{}' has an empty profile_key",
                group.id
            ));
        }
    }

    Ok(AppConfig {
        provider,
        store: raw.store,
        sync: raw.sync,
        server: raw.server,
        account_groups: raw.account_groups,
    })
}

fn validate_base_url(base_url: &str) -> Result<()> {
    match Url::parse(base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(anyhow::anyhow!(
            "provider.base_url must be http(s), got scheme '{}'",
            url.scheme()
        )),
        Err(e) => {
            error!(error = %e, base_url, "Invalid provider base URL");
            Err(anyhow::anyhow!("Invalid provider.base_url '{base_url}': {e}"))
        }
    }
}
