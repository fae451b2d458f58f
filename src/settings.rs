use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use crate::HcSr04Error;

/// Startup wiring for the sensor. Read once before [`HcSr04::open`](crate::HcSr04::open).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// GPIO character device the sensor is wired to.
    pub chip: PathBuf,
    /// Line offset of TRIG on `chip`.
    pub trigger_offset: u32,
    /// Line offset of ECHO on `chip`.
    pub echo_offset: u32,
    /// Consumer label shown by `gpioinfo` for both lines.
    pub consumer: String,
    /// How often the echo listener checks for shutdown.
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chip: PathBuf::from("/dev/gpiochip4"),
            trigger_offset: 4,
            echo_offset: 3,
            consumer: "hcsr04".to_string(),
            poll_interval_ms: 100,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with the TOML file at `path` (if given) and then
    /// with `HCSR04_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, HcSr04Error> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading sensor configuration from {}", path.display());
            builder = builder
                .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true));
        }
        builder = builder.add_source(Environment::with_prefix("HCSR04").try_parsing(true));

        let settings: Settings = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| {
                error!("Failed to load sensor configuration: {}", e);
                HcSr04Error::Config {
                    what: "settings".into(),
                    reason: e.to_string(),
                }
            })?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), HcSr04Error> {
        if self.trigger_offset == self.echo_offset {
            return Err(HcSr04Error::Config {
                what: "settings".into(),
                reason: format!("trigger and echo share line {}", self.echo_offset),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(HcSr04Error::Config {
                what: "settings".into(),
                reason: "poll_interval_ms must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_match_reference_wiring() {
        let settings = Settings::default();
        assert_eq!(settings.chip, PathBuf::from("/dev/gpiochip4"));
        assert_eq!((settings.trigger_offset, settings.echo_offset), (4, 3));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn file_overrides_only_given_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hcsr04.toml");
        fs::write(&path, "chip = \"/dev/gpiochip0\"\ntrigger_offset = 23\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.chip, PathBuf::from("/dev/gpiochip0"));
        assert_eq!(settings.trigger_offset, 23);
        assert_eq!(settings.echo_offset, 3);
        assert_eq!(settings.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, HcSr04Error::Config { .. }));
    }

    #[test]
    fn shared_line_is_rejected() {
        let settings = Settings {
            echo_offset: 4,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(HcSr04Error::Config { .. })));
    }
}
