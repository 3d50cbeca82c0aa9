use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};

use iidj_keys::{KeyManagerConfig, KeyType};

/// Optional TOML configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Port to listen to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the key file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Key file name, relative to `data_dir` unless absolute.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
    /// Lifetime of each key pair, e.g. "720h".
    #[serde(default = "default_rotation_period")]
    pub key_rotation_period: String,
    /// How often key expiry is checked, e.g. "5s".
    #[serde(default = "default_interval")]
    pub interval: String,
    /// EC_P256, EC_P384, RSA_2048 or RSA_4096.
    #[serde(default = "default_key_type")]
    pub key_type: String,
}

fn default_port() -> u16 {
    8080
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_key_path() -> PathBuf {
    PathBuf::from("keys.json")
}
fn default_rotation_period() -> String {
    "720h".to_string()
}
fn default_interval() -> String {
    "5s".to_string()
}
fn default_key_type() -> String {
    KeyType::EcP384.to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
            key_path: default_key_path(),
            key_rotation_period: default_rotation_period(),
            interval: default_interval(),
            key_type: default_key_type(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ServerOverrides {
    /// Port to listen to [default: 8080]
    #[arg(long, env = "IIDJ_PORT")]
    pub port: Option<u16>,

    /// Directory name for saving data [default: .]
    #[arg(long, env = "IIDJ_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Name of the key-pair file [default: keys.json]
    #[arg(long, env = "IIDJ_KEY_PATH")]
    pub key_path: Option<PathBuf>,

    /// Period for key-pair rotation, e.g. 720h [default: 720h]
    #[arg(long, env = "IIDJ_KEY_ROTATION_PERIOD")]
    pub key_rotation_period: Option<String>,

    /// Check key expiration with given interval, e.g. 5s [default: 5s]
    #[arg(long, env = "IIDJ_INTERVAL")]
    pub interval: Option<String>,

    /// Signing key type [default: EC_P384]
    #[arg(long, env = "IIDJ_KEY_TYPE")]
    pub key_type: Option<String>,
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

impl ServerSettings {
    pub fn apply(&mut self, overrides: ServerOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = overrides.data_dir {
            self.data_dir = dir;
        }
        if let Some(path) = overrides.key_path {
            self.key_path = path;
        }
        if let Some(period) = overrides.key_rotation_period {
            self.key_rotation_period = period;
        }
        if let Some(interval) = overrides.interval {
            self.interval = interval;
        }
        if let Some(key_type) = overrides.key_type {
            self.key_type = key_type;
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn key_file(&self) -> PathBuf {
        self.data_dir.join(&self.key_path)
    }

    pub fn key_manager_config(&self) -> anyhow::Result<KeyManagerConfig> {
        let key_type: KeyType = self.key_type.parse()?;
        let rotation_period = parse_duration(&self.key_rotation_period).context(
            "Invalid format for 'key-rotation-period', use a duration such as 24h or 90m",
        )?;
        let interval = parse_duration(&self.interval)
            .context("Invalid format for 'interval', use a duration such as 5s or 1m")?;

        let config = KeyManagerConfig::new(key_type, self.key_file(), rotation_period, interval);
        config.validate()?;
        Ok(config)
    }
}

/// Parse a duration such as `720h`, `1h30m`, `1.5h`, `5s` or `250ms`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `0` is zero.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        anyhow::bail!("empty duration");
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            anyhow::bail!("invalid duration {s:?}: expected a number");
        }
        let value: f64 = rest[..num_len]
            .parse()
            .with_context(|| format!("invalid duration {s:?}"))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ns" => Duration::from_nanos(1),
            "us" | "µs" => Duration::from_micros(1),
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(3600),
            "" => anyhow::bail!("invalid duration {s:?}: missing unit"),
            other => anyhow::bail!("invalid duration {s:?}: unknown unit {other:?}"),
        };
        rest = &rest[unit_len..];

        let part = Duration::try_from_secs_f64(unit.as_secs_f64() * value)
            .map_err(|_| anyhow::anyhow!("invalid duration {s:?}: out of range"))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| anyhow::anyhow!("invalid duration {s:?}: out of range"))?;
    }
    Ok(total)
}
