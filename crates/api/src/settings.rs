//! Service settings
//!
//! Layered with the `config` crate: the selected threshold preset, an optional TOML
//! file, then `DMS__`-prefixed environment variables (`DMS__SERVER__BIND=0.0.0.0:9090`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use monitor::MonitorConfig;
use serde::{Deserialize, Serialize};

/// Default settings file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base for `[monitor.dms]`; keys set in the file or environment still win
    pub preset: Preset,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub model: ModelSettings,
    pub source: SourceSettings,
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub monitor: MonitorConfig,
}

/// Frame-level threshold preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Standard,
    Strict,
    Lenient,
}

impl Preset {
    pub fn dms_config(self) -> DmsConfig {
        match self {
            Preset::Standard => DmsConfig::default(),
            Preset::Strict => DmsConfig::strict(),
            Preset::Lenient => DmsConfig::lenient(),
        }
    }
}

#[derive(Serialize)]
struct PresetLayer {
    monitor: PresetMonitor,
}

#[derive(Serialize)]
struct PresetMonitor {
    dms: DmsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// ONNX export of the frame classifier; missing file means degraded mode
    pub path: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/drowsiness_model.onnx"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// JSON-lines frame recording to replay; no source means the monitor only
    /// answers commands
    pub replay_path: Option<PathBuf>,
    pub frame_interval_ms: u64,
    pub loop_replay: bool,
    /// Trust labels stored in the recording instead of running the classifier
    pub use_recorded_labels: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            replay_path: None,
            frame_interval_ms: 30,
            loop_replay: false,
            use_recorded_labels: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://drowsiness.db".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Start a session as soon as the service is up
    pub autostart: bool,
}

impl Settings {
    /// Load settings from `path` (or the default file) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let settings = Self::build(&path, Preset::Standard)?;
        match settings.preset {
            Preset::Standard => Ok(settings),
            preset => Self::build(&path, preset),
        }
    }

    fn build(path: &Path, preset: Preset) -> Result<Self, ConfigError> {
        let base = PresetLayer {
            monitor: PresetMonitor { dms: preset.dms_config() },
        };

        Config::builder()
            .add_source(Config::try_from(&base)?)
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("DMS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
