//! `sitelens.toml` configuration.
//!
//! Values are layered file → environment → CLI flags. Every section has
//! defaults, so an empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::EngineSettings;
use crate::web::ServerConfig;

pub const DEFAULT_CONFIG_PATH: &str = ".sitelens/sitelens.toml";

// ── Sections ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("data/results")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapSection {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("sitelens/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for SitemapSection {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_chrome_cmd")]
    pub chrome_cmd: String,
    #[serde(default = "default_lighthouse_cmd")]
    pub lighthouse_cmd: String,
    /// Upper bound on waiting for network idle, per page.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,
    #[serde(default = "default_chrome_flags")]
    pub chrome_flags: Vec<String>,
}

fn default_chrome_cmd() -> String {
    EngineSettings::default().chrome_cmd
}

fn default_lighthouse_cmd() -> String {
    EngineSettings::default().lighthouse_cmd
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_launch_timeout_secs() -> u64 {
    30
}

fn default_chrome_flags() -> Vec<String> {
    EngineSettings::default().chrome_flags
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            chrome_cmd: default_chrome_cmd(),
            lighthouse_cmd: default_lighthouse_cmd(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            launch_timeout_secs: default_launch_timeout_secs(),
            chrome_flags: default_chrome_flags(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// When set, logs are also written to a daily-rotated file here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// The complete sitelens.toml configuration structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SitelensToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub sitemap: SitemapSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl SitelensToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse sitelens.toml")
    }

    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating its directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize sitelens.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `SITELENS_PORT`, `SITELENS_RESULTS_DIR`, `CHROME_PATH` and
    /// `LIGHTHOUSE_CMD` from the process environment.
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Environment layering against an arbitrary lookup. Returns a warning
    /// for each variable that was set but unusable.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(port) = lookup("SITELENS_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warnings.push(format!("Ignoring SITELENS_PORT='{}': not a port", port)),
            }
        }
        if let Some(dir) = lookup("SITELENS_RESULTS_DIR").filter(|d| !d.is_empty()) {
            self.storage.results_dir = PathBuf::from(dir);
        }
        if let Some(chrome) = lookup("CHROME_PATH").filter(|c| !c.is_empty()) {
            self.engine.chrome_cmd = chrome;
        }
        if let Some(lighthouse) = lookup("LIGHTHOUSE_CMD").filter(|c| !c.is_empty()) {
            self.engine.lighthouse_cmd = lighthouse;
        }
        warnings
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.host.trim().is_empty() {
            warnings.push("server.host is empty".to_string());
        }
        if self.server.port == 0 {
            warnings.push("server.port is 0: an ephemeral port will be chosen".to_string());
        }
        if self.storage.results_dir.as_os_str().is_empty() {
            warnings.push("storage.results_dir is empty".to_string());
        }
        if self.sitemap.fetch_timeout_secs == 0 {
            warnings.push("sitemap.fetch_timeout_secs is 0: every fetch will time out".to_string());
        }
        if self.engine.chrome_cmd.trim().is_empty() {
            warnings.push("engine.chrome_cmd is empty".to_string());
        }
        if self.engine.lighthouse_cmd.trim().is_empty() {
            warnings.push("engine.lighthouse_cmd is empty".to_string());
        }
        if self.engine.navigation_timeout_secs == 0 {
            warnings.push(
                "engine.navigation_timeout_secs is 0: every page will fail navigation".to_string(),
            );
        }
        if self.engine.launch_timeout_secs == 0 {
            warnings.push("engine.launch_timeout_secs is 0: the browser can never start".to_string());
        }
        if !self
            .engine
            .chrome_flags
            .iter()
            .any(|f| f.starts_with("--headless"))
        {
            warnings.push("engine.chrome_flags has no --headless flag".to_string());
        }

        warnings
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.sitemap.fetch_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.navigation_timeout_secs)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chrome_cmd: self.engine.chrome_cmd.clone(),
            lighthouse_cmd: self.engine.lighthouse_cmd.clone(),
            chrome_flags: self.engine.chrome_flags.clone(),
            launch_timeout: Duration::from_secs(self.engine.launch_timeout_secs),
        }
    }

    pub fn server_config(&self, dev_mode: bool) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            dev_mode,
        }
    }
}

/// Command-line values that win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub results_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Resolved configuration: the merged TOML plus where it came from.
#[derive(Debug, Clone)]
pub struct SitelensConfig {
    pub path: PathBuf,
    /// Whether `path` existed when the configuration was loaded.
    pub from_file: bool,
    pub toml: SitelensToml,
    /// Problems found while layering the environment.
    pub env_warnings: Vec<String>,
}

impl SitelensConfig {
    /// File → environment → CLI.
    pub fn load(path: Option<&Path>, overrides: &CliOverrides) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let from_file = path.exists();
        let mut toml = SitelensToml::load_or_default(&path)?;
        let env_warnings = toml.apply_env();
        apply_overrides(&mut toml, overrides);
        Ok(Self {
            path,
            from_file,
            toml,
            env_warnings,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.env_warnings.clone();
        warnings.extend(self.toml.validate());
        warnings
    }
}

fn apply_overrides(toml: &mut SitelensToml, overrides: &CliOverrides) {
    if let Some(dir) = &overrides.results_dir {
        toml.storage.results_dir = dir.clone();
    }
    if let Some(host) = &overrides.host {
        toml.server.host = host.clone();
    }
    if let Some(port) = overrides.port {
        toml.server.port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SitelensToml::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.results_dir, PathBuf::from("data/results"));
        assert_eq!(config.sitemap.fetch_timeout_secs, 30);
        assert_eq!(config.engine.navigation_timeout_secs, 60);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let content = r#"
[server]
port = 8080

[engine]
chrome_cmd = "google-chrome"

[logging]
format = "json"
directory = "logs"
"#;
        let config = SitelensToml::parse(content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.engine.chrome_cmd, "google-chrome");
        assert_eq!(config.engine.lighthouse_cmd, "lighthouse");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.directory, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = SitelensToml::parse("").unwrap();
        assert_eq!(config, SitelensToml::default());
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        let err = SitelensToml::parse("[server]\nport = \"eighty\"").unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse sitelens.toml"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sitelens.toml");
        let mut config = SitelensToml::default();
        config.server.port = 4000;
        config.logging.directory = Some(PathBuf::from("logs"));
        config.save(&path).unwrap();

        let loaded = SitelensToml::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SITELENS_PORT", "9000"),
            ("SITELENS_RESULTS_DIR", "/var/sitelens"),
            ("CHROME_PATH", "/opt/chrome"),
            ("LIGHTHOUSE_CMD", "/usr/local/bin/lighthouse"),
        ]);
        let mut config = SitelensToml::default();
        let warnings = config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert!(warnings.is_empty());
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.results_dir, PathBuf::from("/var/sitelens"));
        assert_eq!(config.engine.chrome_cmd, "/opt/chrome");
        assert_eq!(config.engine.lighthouse_cmd, "/usr/local/bin/lighthouse");
    }

    #[test]
    fn test_env_bad_port_warns_and_keeps_file_value() {
        let mut config = SitelensToml::default();
        let warnings =
            config.apply_env_with(|k| (k == "SITELENS_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_cli_overrides_win() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sitelens.toml");
        std::fs::write(&path, "[storage]\nresults_dir = \"from-file\"\n").unwrap();

        let overrides = CliOverrides {
            results_dir: Some(PathBuf::from("from-cli")),
            port: Some(1234),
            ..CliOverrides::default()
        };
        let config = SitelensConfig::load(Some(&path), &overrides).unwrap();
        assert!(config.from_file);
        assert_eq!(config.toml.storage.results_dir, PathBuf::from("from-cli"));
        assert_eq!(config.toml.server.port, 1234);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let config = SitelensConfig::load(Some(&path), &CliOverrides::default()).unwrap();
        assert!(!config.from_file);
        assert_eq!(config.toml.server.host, "127.0.0.1");
    }

    #[test]
    fn test_validate_flags_zero_timeouts_and_empty_commands() {
        let mut config = SitelensToml::default();
        config.engine.navigation_timeout_secs = 0;
        config.engine.lighthouse_cmd = String::new();
        config.sitemap.fetch_timeout_secs = 0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("navigation_timeout_secs")));
        assert!(warnings.iter().any(|w| w.contains("lighthouse_cmd")));
    }

    #[test]
    fn test_engine_settings_from_config() {
        let mut config = SitelensToml::default();
        config.engine.launch_timeout_secs = 5;
        let settings = config.engine_settings();
        assert_eq!(settings.launch_timeout, Duration::from_secs(5));
        assert_eq!(settings.chrome_cmd, config.engine.chrome_cmd);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(60));
    }
}
