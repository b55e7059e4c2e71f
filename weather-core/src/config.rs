use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_DISTRICTS_URL: &str =
    "https://raw.githubusercontent.com/strativ-dev/technical-screening-test/main/bd-districts.json";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Where the district list comes from and how long it is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub url: String,
    pub cache_ttl_seconds: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DISTRICTS_URL.to_string(),
            cache_ttl_seconds: 2 * 60 * 60,
        }
    }
}

impl DirectoryConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// Weather provider endpoint and request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    /// IANA name sent to the provider so hourly rows come back in local time.
    pub timezone: String,
    /// Offset of `timezone` from UTC, used to work out "today".
    pub utc_offset_seconds: i32,
    pub timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WEATHER_URL.to_string(),
            timezone: "Asia/Dhaka".to_string(),
            utc_offset_seconds: 6 * 60 * 60,
            timeout_seconds: 10,
        }
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Knobs of the aggregation and travel engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Number of forecasts in flight at once.
    pub chunk_size: usize,
    pub top_n: usize,
    /// Local hour whose temperature is compared.
    pub target_hour: u32,
    /// Number of daily samples averaged.
    pub window_days: usize,
    /// Rank the districts that succeeded instead of failing the whole batch.
    pub tolerate_failures: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4,
            top_n: 10,
            target_hour: 14,
            window_days: 7,
            tolerate_failures: false,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [directory]
/// url = "https://example.com/districts.json"
///
/// [ranking]
/// top_n = 5
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub directory: DirectoryConfig,
    pub weather: WeatherConfig,
    pub ranking: RankingConfig,
}

impl Config {
    /// Load config from the platform location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Load config from an explicit path, or return defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "district-weather", "district-weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        check_url("directory.url", &self.directory.url)?;
        check_url("weather.base_url", &self.weather.base_url)?;

        if self.server.bind.trim().is_empty() {
            bail!("server.bind cannot be empty");
        }
        if self.directory.cache_ttl_seconds == 0 {
            bail!("directory.cache_ttl_seconds must be greater than zero");
        }
        if self.weather.timezone.trim().is_empty() {
            bail!("weather.timezone cannot be empty");
        }
        if self.weather.utc_offset_seconds.abs() > 18 * 60 * 60 {
            bail!("weather.utc_offset_seconds must be within ±18 hours");
        }
        if self.weather.timeout_seconds == 0 || self.weather.timeout_seconds > 300 {
            bail!("weather.timeout_seconds must be between 1 and 300");
        }
        if self.ranking.chunk_size == 0 {
            bail!("ranking.chunk_size must be greater than zero");
        }
        if self.ranking.top_n == 0 {
            bail!("ranking.top_n must be greater than zero");
        }
        if self.ranking.target_hour > 23 {
            bail!("ranking.target_hour must be between 0 and 23");
        }
        if self.ranking.window_days == 0 {
            bail!("ranking.window_days must be greater than zero");
        }

        Ok(())
    }
}

fn check_url(field: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!("{field} must be an http or https URL, got '{url}'");
    }
    Ok(())
}
