//! Turn-taking tuning.
//!
//! Thresholds are on the mean-absolute level scale of f32 samples in
//! [-1.0, 1.0]. The interrupt threshold is normally well above the speaking
//! threshold so speaker bleed and room noise do not cut the AI off.

use std::time::Duration;

pub const DEFAULT_USER_SPEAKING_THRESHOLD: f32 = 0.02;
pub const DEFAULT_USER_INTERRUPT_THRESHOLD: f32 = 0.1;
pub const DEFAULT_SILENCE_MS: u64 = 1000;

pub const SPEAKING_THRESHOLD_VAR: &str = "VOICE_DUPLEX_SPEAKING_THRESHOLD";
pub const INTERRUPT_THRESHOLD_VAR: &str = "VOICE_DUPLEX_INTERRUPT_THRESHOLD";
pub const SILENCE_MS_VAR: &str = "VOICE_DUPLEX_SILENCE_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    user_speaking_threshold: f32,
    user_interrupt_threshold: f32,
    silence: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_speaking_threshold: DEFAULT_USER_SPEAKING_THRESHOLD,
            user_interrupt_threshold: DEFAULT_USER_INTERRUPT_THRESHOLD,
            silence: Duration::from_millis(DEFAULT_SILENCE_MS),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment, falling back to defaults for
    /// unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(SPEAKING_THRESHOLD_VAR) {
            config.user_speaking_threshold = parse_level(SPEAKING_THRESHOLD_VAR, value)?;
        }
        if let Some(value) = lookup(INTERRUPT_THRESHOLD_VAR) {
            config.user_interrupt_threshold = parse_level(INTERRUPT_THRESHOLD_VAR, value)?;
        }
        if let Some(value) = lookup(SILENCE_MS_VAR) {
            let ms = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: SILENCE_MS_VAR,
                value,
            })?;
            config.silence = Duration::from_millis(ms);
        }
        Ok(config)
    }

    pub fn with_user_speaking_threshold(mut self, threshold: f32) -> Self {
        self.user_speaking_threshold = threshold;
        self
    }

    pub fn with_user_interrupt_threshold(mut self, threshold: f32) -> Self {
        self.user_interrupt_threshold = threshold;
        self
    }

    pub fn with_silence(mut self, silence: Duration) -> Self {
        self.silence = silence;
        self
    }

    pub fn user_speaking_threshold(&self) -> f32 {
        self.user_speaking_threshold
    }

    pub fn user_interrupt_threshold(&self) -> f32 {
        self.user_interrupt_threshold
    }

    pub fn silence(&self) -> Duration {
        self.silence
    }

    pub fn thresholds(&self) -> super::Thresholds {
        super::Thresholds {
            speaking: self.user_speaking_threshold,
            interrupt: self.user_interrupt_threshold,
        }
    }
}

fn parse_level(name: &'static str, value: String) -> Result<f32, ConfigError> {
    match value.trim().parse::<f32>() {
        Ok(level) if level.is_finite() && level >= 0.0 => Ok(level),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.silence(), Duration::from_millis(1000));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (SPEAKING_THRESHOLD_VAR, "0.05"),
            (INTERRUPT_THRESHOLD_VAR, " 0.3 "),
            (SILENCE_MS_VAR, "600"),
        ]))
        .unwrap();
        assert_eq!(config.user_speaking_threshold(), 0.05);
        assert_eq!(config.user_interrupt_threshold(), 0.3);
        assert_eq!(config.silence(), Duration::from_millis(600));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(EngineConfig::from_lookup(lookup(&[(SPEAKING_THRESHOLD_VAR, "loud")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(INTERRUPT_THRESHOLD_VAR, "-0.2")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(INTERRUPT_THRESHOLD_VAR, "NaN")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(SILENCE_MS_VAR, "1.5s")])).is_err());
    }
}
