use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PROJECT, VERSION};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("failed to write config: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DashConfig {
    pub http: HttpConfig,
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub product: String,
    pub version: String,
    pub timeout_secs: u64,
    /// Dashboard checks target arbitrary hosts, so certificates are not verified by default
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            product: PROJECT.into(),
            version: VERSION.into(),
            timeout_secs: 30,
            accept_invalid_certs: true,
        }
    }
}

impl HttpConfig {
    /// `product/version`, sent with every outbound request
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.product, self.version)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { enabled: false, url: "redis://127.0.0.1:6379".into() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

impl LoggingConfig {
    /// Install the tracing subscriber described by this section
    pub fn install(&self) -> Result<(), logger::TryInitError> {
        logger::try_init(
            logger::parse_level(&self.level),
            Some(logger::LogFormat::from_name(&self.format)),
        )
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pulseboard/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("pulseboard/config.toml"))
}

impl fmt::Display for DashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_1 = |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
            writeln!(f, "    {}: {}", label, value)
        };

        writeln!(f, "Current Internal Configuration State:")?;
        writeln!(f, "  HTTP")?;
        write_1(f, "User Agent", &self.http.user_agent())?;
        write_1(f, "Timeout (s)", &self.http.timeout_secs)?;
        write_1(f, "Accept Invalid Certs", &self.http.accept_invalid_certs)?;
        writeln!(f, "  Feed")?;
        write_1(f, "Timeout (s)", &self.feed.timeout_secs)?;
        writeln!(f, "  Store")?;
        write_1(f, "Enabled", &self.store.enabled)?;
        write_1(f, "URL", &self.store.url)?;
        writeln!(f, "  Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl DashConfig {
    /// Load the config from `optional_path` or the default location.
    ///
    /// Writes and returns the default config when no file exists yet.
    ///
    /// ```no_run
    /// let cfg = pulseboard_tasks::DashConfig::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), pulseboard_tasks::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }
}
