use std::path::PathBuf;
use std::time::Duration;

use dubflow_core::error::CoreError;
use dubflow_core::voice::{VoiceSettings, DEFAULT_LANGUAGE_CODE, DEFAULT_SPEED, DEFAULT_VOICE};
use dubflow_engine::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Invalid voice settings: {0}")]
    Voice(#[from] CoreError),
}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Base URL of the dubbing service.
    pub api_url: String,
    pub poll_interval: Duration,
    /// Source language hint; `None` lets the service detect it.
    pub source_language: Option<String>,
    pub voice: VoiceSettings,
    /// Directory dubbed videos and subtitles are written to.
    pub output_dir: PathBuf,
    /// Timeout for short JSON requests. Uploads and downloads are unbounded.
    pub request_timeout: Duration,
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `DUBFLOW_API_URL`              | `http://localhost:8000` |
    /// | `DUBFLOW_POLL_INTERVAL_MS`     | `1000`                  |
    /// | `DUBFLOW_SOURCE_LANGUAGE`      | auto-detect             |
    /// | `DUBFLOW_VOICE_LANGUAGE`       | `a`                     |
    /// | `DUBFLOW_VOICE`                | `af_heart`              |
    /// | `DUBFLOW_VOICE_SPEED`          | `1.0`                   |
    /// | `DUBFLOW_OUTPUT_DIR`           | `.`                     |
    /// | `DUBFLOW_REQUEST_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = var("DUBFLOW_API_URL").unwrap_or_else(|| "http://localhost:8000".into());

        let poll_interval_ms: u64 = parse(
            "DUBFLOW_POLL_INTERVAL_MS",
            var("DUBFLOW_POLL_INTERVAL_MS"),
            1000,
            "a positive integer",
        )?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "DUBFLOW_POLL_INTERVAL_MS",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let source_language = var("DUBFLOW_SOURCE_LANGUAGE");

        let voice = VoiceSettings {
            language_code: var("DUBFLOW_VOICE_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_LANGUAGE_CODE.into()),
            voice: var("DUBFLOW_VOICE").unwrap_or_else(|| DEFAULT_VOICE.into()),
            speed: parse(
                "DUBFLOW_VOICE_SPEED",
                var("DUBFLOW_VOICE_SPEED"),
                DEFAULT_SPEED,
                "a number",
            )?,
        };
        voice.validate()?;

        let output_dir = var("DUBFLOW_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let request_timeout_secs: u64 = parse(
            "DUBFLOW_REQUEST_TIMEOUT_SECS",
            var("DUBFLOW_REQUEST_TIMEOUT_SECS"),
            30,
            "a whole number of seconds",
        )?;

        Ok(Self {
            api_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            source_language,
            voice,
            output_dir,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: self.poll_interval,
            ..EngineConfig::default()
        }
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.source_language, None);
        assert_eq!(config.voice, VoiceSettings::default());
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("DUBFLOW_API_URL", "http://dubber:9000"),
            ("DUBFLOW_POLL_INTERVAL_MS", "250"),
            ("DUBFLOW_SOURCE_LANGUAGE", "es"),
            ("DUBFLOW_VOICE_LANGUAGE", "f"),
            ("DUBFLOW_VOICE", "ff_siwis"),
            ("DUBFLOW_VOICE_SPEED", "1.25"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "http://dubber:9000");
        assert_eq!(config.engine().poll_interval, Duration::from_millis(250));
        assert_eq!(config.source_language.as_deref(), Some("es"));
        assert_eq!(config.voice.voice, "ff_siwis");
        assert_eq!(config.voice.speed, 1.25);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("DUBFLOW_SOURCE_LANGUAGE", "  ")]).unwrap();
        assert_eq!(config.source_language, None);
    }

    #[test]
    fn unparseable_values_are_errors() {
        assert_matches!(
            load(&[("DUBFLOW_POLL_INTERVAL_MS", "fast")]),
            Err(ConfigError::Invalid { var: "DUBFLOW_POLL_INTERVAL_MS", .. })
        );
        assert_matches!(
            load(&[("DUBFLOW_POLL_INTERVAL_MS", "0")]),
            Err(ConfigError::Invalid { .. })
        );
    }

    #[test]
    fn out_of_range_speed_is_rejected() {
        assert_matches!(
            load(&[("DUBFLOW_VOICE_SPEED", "2.5")]),
            Err(ConfigError::Voice(CoreError::Validation(_)))
        );
    }
}
