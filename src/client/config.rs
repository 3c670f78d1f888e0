use std::time::Duration;
use secrecy::SecretString;
use voice_duplex_types::AudioParams;
use crate::client::consts::{
    CLIENT_ID_VAR, DEFAULT_CAPACITY, DEFAULT_URL, DEVICE_ID_VAR, RECONNECT_DELAY_MS, TOKEN_ENABLE_VAR, TOKEN_VAR,
    URL_VAR,
};

pub struct Config {
    url: String,
    token: SecretString,
    token_enable: bool,
    device_id: String,
    client_id: String,
    reconnect_delay: Duration,
    capacity: usize,
    audio_params: AudioParams,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let token = lookup(TOKEN_VAR).unwrap_or_default();
        let token_enable = lookup(TOKEN_ENABLE_VAR)
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        Self {
            url: lookup(URL_VAR).unwrap_or_else(|| DEFAULT_URL.to_string()),
            token: SecretString::from(token),
            token_enable,
            device_id: lookup(DEVICE_ID_VAR).unwrap_or_else(default_device_id),
            client_id: lookup(CLIENT_ID_VAR).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            capacity: DEFAULT_CAPACITY,
            audio_params: AudioParams::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn token_enable(&self) -> bool {
        self.token_enable
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn audio_params(&self) -> &AudioParams {
        &self.audio_params
    }
}

/// MAC-style identifier, stable for the lifetime of the config.
fn default_device_id() -> String {
    let id = uuid::Uuid::new_v4();
    id.as_bytes()[10..]
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self { config: Config::new() }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.config.url = url.to_string();
        self
    }

    /// Setting a token also enables the `Authorization` header.
    pub fn with_token(mut self, token: &str) -> Self {
        self.config.token = SecretString::from(token.to_string());
        self.config.token_enable = true;
        self
    }

    pub fn with_token_enable(mut self, enable: bool) -> Self {
        self.config.token_enable = enable;
        self
    }

    pub fn with_device_id(mut self, device_id: &str) -> Self {
        self.config.device_id = device_id.to_string();
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.config.client_id = client_id.to_string();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn with_audio_params(mut self, audio_params: AudioParams) -> Self {
        self.config.audio_params = audio_params;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
