//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG configuration directory.
//! Missing fields take their defaults.

use crate::discovery::DiscoveryOptions;
use crate::error::{ConfigError, ConfigResult};
use crate::output::OutputFormat;
use crate::scanner::ScanOptions;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory layout.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/netprobe)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the configuration directory for this user.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("org", "netprobe", "netprobe")
            .ok_or(ConfigError::DirectoryNotFound)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Echo requests sent to each target.
    pub ping_count: u16,
    /// Total ICMP budget per target in milliseconds.
    pub ping_timeout_ms: u64,
    /// ARP read deadline in milliseconds.
    pub arp_timeout_ms: u64,
    /// Use raw ICMP sockets.
    pub privileged: bool,
    /// Governor capacity when the descriptor limit is unknown.
    pub fallback_descriptor_limit: u32,
    /// Back-off rounds for a port hitting descriptor exhaustion.
    pub max_retries: u32,
    /// Connect attempts per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Largest CIDR block accepted, in addresses. Unset means no limit.
    pub max_cidr_hosts: Option<u64>,
    /// Default output format.
    pub output_format: OutputFormat,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            ping_count: 3,
            ping_timeout_ms: 3000,
            arp_timeout_ms: 500,
            privileged: false,
            fallback_descriptor_limit: 1024,
            max_retries: 5,
            rate_limit: 0,
            max_cidr_hosts: None,
            output_format: OutputFormat::Plain,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if the file
    /// does not exist.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::discover()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = Paths::discover()?;
        fs::create_dir_all(&paths.config_dir)?;
        self.save_to(&paths.settings_file())
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.fallback_descriptor_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fallback_descriptor_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            ping_count: self.ping_count,
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            arp_timeout: Duration::from_millis(self.arp_timeout_ms),
            privileged: self.privileged,
            max_cidr_hosts: self.max_cidr_hosts.map(u128::from),
            ..DiscoveryOptions::default()
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_retries: self.max_retries,
            rate_limit: self.rate_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.connect_timeout_ms, 3000);
        assert_eq!(settings.ping_count, 3);
        assert_eq!(settings.fallback_descriptor_limit, 1024);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let settings = AppSettings {
            rate_limit: 200,
            privileged: true,
            output_format: OutputFormat::Json,
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "ping_count": 1 }"#).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded.ping_count, 1);
        assert_eq!(loaded.connect_timeout_ms, 3000);
        assert_eq!(loaded.output_format, OutputFormat::Plain);
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "connect_timeout_ms": 0 }"#).unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidValue { field: "connect_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            AppSettings::load_from(&dir.path().join("absent.json")),
            Err(ConfigError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_conversion_to_options() {
        let settings = AppSettings {
            connect_timeout_ms: 750,
            ping_timeout_ms: 1200,
            arp_timeout_ms: 80,
            max_retries: 2,
            ..AppSettings::default()
        };
        let scan = settings.scan_options();
        assert_eq!(scan.connect_timeout, Duration::from_millis(750));
        assert_eq!(scan.max_retries, 2);

        let discovery = settings.discovery_options();
        assert_eq!(discovery.ping_timeout, Duration::from_millis(1200));
        assert_eq!(discovery.arp_timeout, Duration::from_millis(80));
        assert_eq!(discovery.ping_count, 3);
        assert_eq!(discovery.max_cidr_hosts, None);
    }

    #[test]
    fn test_cidr_limit_is_opt_in() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "max_cidr_hosts": 65536 }"#).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded.discovery_options().max_cidr_hosts, Some(65536));
        assert_eq!(AppSettings::default().discovery_options().max_cidr_hosts, None);
    }
}
