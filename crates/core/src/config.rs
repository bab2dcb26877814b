use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::osc::{QueryTimeouts, ServerAddress};

/// Settings shared by both console sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Network settings
    pub qlab_address: ServerAddress,
    pub qlab_passcode: Option<String>,
    pub eos_address: ServerAddress,

    // Timecode settings
    pub timecode_fps: u32,

    // Timing settings
    pub query_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    pub busy_poll_interval_ms: u64,
    pub connect_settle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qlab_address: ServerAddress::new("127.0.0.1", 53000),
            qlab_passcode: None,
            eos_address: ServerAddress::new("127.0.0.1", 54000),

            timecode_fps: 30,

            query_timeout_ms: 2000,
            busy_timeout_ms: 5000,
            busy_poll_interval_ms: 10,
            connect_settle_ms: 1000,
        }
    }
}

impl Settings {
    pub fn timeouts(&self) -> QueryTimeouts {
        QueryTimeouts {
            busy_ceiling: Duration::from_millis(self.busy_timeout_ms),
            busy_poll_interval: Duration::from_millis(self.busy_poll_interval_ms),
            reply: Duration::from_millis(self.query_timeout_ms),
        }
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }
}

/// Configuration manager for cuesync settings.
/// Settings are stored as JSON, in `cuesync.json` in the working directory by default.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
    created_at: Option<String>,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub timecode: TimecodeConfigSchema,
    pub timing: TimingConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimecodeConfigSchema {
    pub timecode_fps: ConfigOption<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfigSchema {
    pub query_timeout_ms: ConfigOption<u64>,
    pub busy_timeout_ms: ConfigOption<u64>,
    pub busy_poll_interval_ms: ConfigOption<u64>,
    pub connect_settle_ms: ConfigOption<u64>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager.
    /// If no path is provided, defaults to `cuesync.json` in the current working directory.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from("cuesync.json")),
            settings: Settings::default(),
            created_at: None,
        }
    }

    /// Load settings from the configuration file, writing defaults first if
    /// it does not exist yet.
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "{} not found, creating it with default settings",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        self.created_at = Some(config_file.created_at);
        Ok(self.settings.clone())
    }

    /// Save current settings to the configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: self.created_at.clone().unwrap_or_else(|| now.clone()),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, update and save settings
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            timecode: TimecodeConfigSchema {
                timecode_fps: ConfigOption {
                    default: 30,
                    valid_range: Some((1, 120)),
                    valid_choices: None,
                    description: "Frame rate used to read and write HH:MM:SS:FF timecode"
                        .to_string(),
                },
            },
            timing: TimingConfigSchema {
                query_timeout_ms: ConfigOption {
                    default: 2000,
                    valid_range: Some((1, 60_000)),
                    valid_choices: None,
                    description: "How long a query waits for its reply".to_string(),
                },
                busy_timeout_ms: ConfigOption {
                    default: 5000,
                    valid_range: Some((1, 60_000)),
                    valid_choices: None,
                    description: "How long a query waits for its reply address to be free"
                        .to_string(),
                },
                busy_poll_interval_ms: ConfigOption {
                    default: 10,
                    valid_range: Some((1, 1000)),
                    valid_choices: None,
                    description: "Poll interval while a reply address is held elsewhere"
                        .to_string(),
                },
                connect_settle_ms: ConfigOption {
                    default: 1000,
                    valid_range: Some((1, 30_000)),
                    valid_choices: None,
                    description: "Delay between starting a transport and checking it is connected"
                        .to_string(),
                },
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if !settings.qlab_address.is_valid() {
            errors.push(format!("qlab_address {} is not valid", settings.qlab_address));
        }
        if !settings.eos_address.is_valid() {
            errors.push(format!("eos_address {} is not valid", settings.eos_address));
        }

        if let Some((min, max)) = schema.timecode.timecode_fps.valid_range {
            if settings.timecode_fps < min || settings.timecode_fps > max {
                errors.push(format!("timecode_fps must be between {} and {}", min, max));
            }
        }

        let timing = [
            ("query_timeout_ms", settings.query_timeout_ms, &schema.timing.query_timeout_ms),
            ("busy_timeout_ms", settings.busy_timeout_ms, &schema.timing.busy_timeout_ms),
            (
                "busy_poll_interval_ms",
                settings.busy_poll_interval_ms,
                &schema.timing.busy_poll_interval_ms,
            ),
            ("connect_settle_ms", settings.connect_settle_ms, &schema.timing.connect_settle_ms),
        ];
        for (name, value, option) in timing {
            if let Some((min, max)) = option.valid_range {
                if value < min || value > max {
                    errors.push(format!("{} must be between {} and {}", name, min, max));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_config_manager_new() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("cuesync.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        let settings = manager.load().unwrap();

        assert_eq!(settings, Settings::default());
        assert!(config_path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        let mut settings = Settings::default();
        settings.timecode_fps = 25;
        settings.eos_address = ServerAddress::new("10.0.0.20", 3032);
        settings.qlab_passcode = Some("1234".to_string());
        manager.update_settings(settings.clone()).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();

        assert_eq!(loaded_settings, settings);
        assert_eq!(loaded_settings.timeouts().reply, Duration::from_millis(2000));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.json");
        fs::write(
            &config_path,
            r#"{"version":"0.0.0","settings":{"timecode_fps":24},"created_at":"","modified_at":""}"#,
        )
        .unwrap();

        let mut manager = ConfigManager::new(Some(config_path));
        let settings = manager.load().unwrap();

        assert_eq!(settings.timecode_fps, 24);
        assert_eq!(settings.qlab_address, ServerAddress::new("127.0.0.1", 53000));
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.timecode_fps = 0;
        assert!(ConfigManager::validate_settings(&settings).is_err());

        settings.timecode_fps = 30;
        settings.qlab_address = ServerAddress::new("999.1.1.1", 53000);
        assert!(ConfigManager::validate_settings(&settings).is_err());

        settings.qlab_address = ServerAddress::new("127.0.0.1", 53000);
        settings.query_timeout_ms = 0;
        let errors = ConfigManager::validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_update_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::new(Some(temp_dir.path().join("c.json")));

        let mut settings = Settings::default();
        settings.timecode_fps = 500;
        assert!(matches!(
            manager.update_settings(settings),
            Err(ConfigError::ValidationError(_))
        ));
        assert_eq!(manager.settings(), &Settings::default());
    }
}
