//! Bridge configuration.
//!
//! Loaded from YAML with `#[serde(default)]` per field, then overridden by
//! the environment variables from §6, in that order. The server binary layers
//! CLI flags on top of this (CLI > env > file > built-in default).

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Input audio format accepted from the telephony side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    G711Alaw,
    Pcm16,
}

/// Output audio format written back to the telephony side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Alaw,
    Pcm16,
}

/// Bridge-wide configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ARI REST + events
    pub ari_host: String,
    pub ari_user: String,
    pub ari_pass: String,
    pub ari_timeout_secs: u64,
    pub stasis_app_name: String,

    // Telephony addressing
    pub external_host: String,
    pub sip_host: String,
    pub audiosocket_host: String,
    pub audiosocket_port: u16,

    // Realtime
    pub realtime_url: String,
    pub realtime_model: String,
    pub openai_api_key: String,
    pub voice: String,
    pub instructions: String,
    pub temperature: f32,
    pub transcription_model: String,
    pub vad_threshold: f32,
    pub vad_silence_ms: u64,
    pub vad_prefix_ms: u64,

    // Audio pipeline
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    pub default_sample_rate: u32,
    pub openai_output_rate: u32,
    pub drain_chunk_size: usize,
    pub reader_bytes_limit: usize,
    pub interrupt_pause_ms: u64,

    // Ambient
    pub health_bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ari_host: String::new(),
            ari_user: String::new(),
            ari_pass: String::new(),
            ari_timeout_secs: 60,
            stasis_app_name: "stasis_bridge".to_string(),

            external_host: String::new(),
            sip_host: String::new(),
            audiosocket_host: "0.0.0.0".to_string(),
            audiosocket_port: 7575,

            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            openai_api_key: String::new(),
            voice: "shimmer".to_string(),
            instructions: "You are a helpful phone assistant. Keep responses brief.".to_string(),
            temperature: 0.7,
            transcription_model: "whisper-1".to_string(),
            vad_threshold: 0.5,
            vad_silence_ms: 500,
            vad_prefix_ms: 300,

            input_format: InputFormat::G711Alaw,
            output_format: OutputFormat::Alaw,
            default_sample_rate: 8000,
            openai_output_rate: 24000,
            drain_chunk_size: 1024,
            reader_bytes_limit: 1024,
            interrupt_pause_ms: 500,

            health_bind_addr: "0.0.0.0:8088".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from an optional YAML file, then applies the §6
    /// environment variable overrides.
    pub fn load(yaml_path: Option<&std::path::Path>) -> BridgeResult<Self> {
        let mut config = if let Some(path) = yaml_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                BridgeError::Configuration(format!(
                    "reading config file {}: {e}",
                    path.display()
                ))
            })?;
            serde_yaml::from_str(&content).map_err(|e| {
                BridgeError::Configuration(format!(
                    "parsing config file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies the §6 environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        macro_rules! str_override {
            ($field:expr, $var:literal) => {
                if let Ok(val) = std::env::var($var) {
                    $field = val;
                }
            };
        }
        macro_rules! parsed_override {
            ($field:expr, $var:literal) => {
                if let Ok(val) = std::env::var($var) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                    }
                }
            };
        }

        str_override!(self.ari_host, "ARI_HOST");
        str_override!(self.ari_user, "ARI_USER");
        str_override!(self.ari_pass, "ARI_PASS");
        parsed_override!(self.ari_timeout_secs, "ARI_TIMEOUT");
        str_override!(self.stasis_app_name, "STASIS_APP_NAME");

        str_override!(self.external_host, "EXTERNAL_HOST");
        str_override!(self.sip_host, "SIP_HOST");
        str_override!(self.audiosocket_host, "AUDIOSOCKET_HOST");
        parsed_override!(self.audiosocket_port, "AUDIOSOCKET_PORT");

        str_override!(self.realtime_url, "REALTIME_URL");
        str_override!(self.realtime_model, "REALTIME_MODEL");
        str_override!(self.openai_api_key, "OPENAI_API_KEY");
        str_override!(self.voice, "VOICE");
        str_override!(self.instructions, "AGENT_INSTRUCTIONS");
        parsed_override!(self.temperature, "REALTIME_TEMPERATURE");
        str_override!(self.transcription_model, "TRANSCRIPTION_MODEL");
        parsed_override!(self.vad_threshold, "VAD_THRESHOLD");
        parsed_override!(self.vad_silence_ms, "VAD_SILENCE_MS");
        parsed_override!(self.vad_prefix_ms, "VAD_PREFIX_MS");

        if let Ok(val) = std::env::var("INPUT_FORMAT") {
            self.input_format = match val.as_str() {
                "pcm16" => InputFormat::Pcm16,
                _ => InputFormat::G711Alaw,
            };
        }
        if let Ok(val) = std::env::var("OUTPUT_FORMAT") {
            self.output_format = match val.as_str() {
                "g711_alaw" => OutputFormat::Alaw,
                _ => OutputFormat::Pcm16,
            };
        }
        parsed_override!(self.default_sample_rate, "DEFAULT_SAMPLE_RATE");
        parsed_override!(self.openai_output_rate, "OPENAI_OUTPUT_RATE");
        parsed_override!(self.drain_chunk_size, "DRAIN_CHUNK_SIZE");
        parsed_override!(self.reader_bytes_limit, "READER_BYTES_LIMIT");
        parsed_override!(self.interrupt_pause_ms, "INTERRUPT_PAUSE_MS");
    }

    /// Fails fast on missing required configuration (§7 ConfigError).
    pub fn validate(&self) -> BridgeResult<()> {
        if self.ari_host.is_empty() {
            return Err(BridgeError::Configuration("ARI_HOST is required".into()));
        }
        if self.ari_user.is_empty() || self.ari_pass.is_empty() {
            return Err(BridgeError::Configuration(
                "ARI_USER and ARI_PASS are required".into(),
            ));
        }
        if self.openai_api_key.is_empty() {
            return Err(BridgeError::Configuration(
                "OPENAI_API_KEY is required".into(),
            ));
        }
        if self.external_host.is_empty() {
            return Err(BridgeError::Configuration(
                "EXTERNAL_HOST is required".into(),
            ));
        }
        Ok(())
    }

    /// Base URL for ARI REST calls, e.g. `http://host:port/ari`.
    pub fn ari_base_url(&self) -> String {
        format!("http://{}/ari", self.ari_host)
    }

    /// WebSocket URL for the ARI events subscription.
    pub fn ari_events_url(&self) -> String {
        format!(
            "ws://{}/ari/events?app={}",
            self.ari_host, self.stasis_app_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_without_required_fields() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_passes_with_required_fields_set() {
        let config = Config {
            ari_host: "10.0.0.1:8088".into(),
            ari_user: "asterisk".into(),
            ari_pass: "secret".into(),
            openai_api_key: "sk-test".into(),
            external_host: "10.0.0.2:7575".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_take_precedence_over_defaults() {
        std::env::set_var("ARI_HOST", "example.test:8088");
        std::env::set_var("INTERRUPT_PAUSE_MS", "750");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.ari_host, "example.test:8088");
        assert_eq!(config.interrupt_pause_ms, 750);
        std::env::remove_var("ARI_HOST");
        std::env::remove_var("INTERRUPT_PAUSE_MS");
    }

    #[test]
    fn ari_base_url_formats_host() {
        let config = Config {
            ari_host: "10.0.0.1:8088".into(),
            ..Default::default()
        };
        assert_eq!(config.ari_base_url(), "http://10.0.0.1:8088/ari");
    }
}
