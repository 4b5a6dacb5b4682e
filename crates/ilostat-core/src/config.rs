//! Runtime configuration resolved from the process environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://sdmx.ilo.org/rest";
pub const DEFAULT_AGENCY: &str = "ILO";
pub const DEFAULT_RUN_ID: &str = "local-run";

/// Settings for the SDMX client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST root, without a trailing slash.
    pub base_url: String,
    /// Agency id used in every endpoint path.
    pub agency: String,
    pub request_timeout: Duration,
    /// Requests allowed per `rate_window`.
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            agency: String::from(DEFAULT_AGENCY),
            request_timeout: Duration::from_secs(120),
            rate_limit: 10,
            rate_window: Duration::from_secs(1),
        }
    }
}

/// Top-level connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Root directory for connector state.
    pub home: PathBuf,
    /// Directory holding raw artifacts.
    pub raw_dir: PathBuf,
    /// Path to the `DuckDB` database file datasets are published into.
    pub warehouse_path: PathBuf,
    pub run_id: String,
    pub client: ClientConfig,
}

impl ConnectorConfig {
    /// Builds the configuration rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            raw_dir: home.join("raw"),
            warehouse_path: home.join("warehouse.duckdb"),
            home,
            run_id: String::from(DEFAULT_RUN_ID),
            client: ClientConfig::default(),
        }
    }

    /// Reads `ILOSTAT_HOME`, `ILOSTAT_BASE_URL`, `ILOSTAT_AGENCY` and `RUN_ID`.
    pub fn from_env() -> Self {
        let mut config = Self::with_home(resolve_home());

        if let Some(base_url) = non_empty_var("ILOSTAT_BASE_URL") {
            config.client.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(agency) = non_empty_var("ILOSTAT_AGENCY") {
            config.client.agency = agency;
        }
        if let Some(run_id) = non_empty_var("RUN_ID") {
            config.run_id = run_id;
        }

        config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os("ILOSTAT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".ilostat");
    }

    PathBuf::from(".ilostat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults_match_api_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://sdmx.ilo.org/rest");
        assert_eq!(config.agency, "ILO");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.rate_window, Duration::from_secs(1));
    }

    #[test]
    fn paths_are_derived_from_home() {
        let config = ConnectorConfig::with_home("/tmp/ilostat-home");
        assert_eq!(config.raw_dir, PathBuf::from("/tmp/ilostat-home/raw"));
        assert_eq!(
            config.warehouse_path,
            PathBuf::from("/tmp/ilostat-home/warehouse.duckdb")
        );
        assert_eq!(config.run_id, "local-run");
    }
}
