//! Configuration for a live call.

use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Puck";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a friendly, encouraging English tutor. Speak clearly and simply.";
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Sample rate of the audio the model sends back. Fixed by the service.
pub const INBOUND_SAMPLE_RATE: u32 = 24_000;
/// Sample rate the model expects from us.
pub const OUTBOUND_SAMPLE_RATE: u32 = 16_000;

#[derive(Clone)]
pub struct LiveConfig {
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
    pub endpoint: String,
    /// Samples per captured frame.
    pub frame_size: usize,
    /// Rate to request from the microphone; the device default is used when
    /// unsupported or `None`.
    pub capture_rate_hint: Option<u32>,
    pub outbound_sample_rate: u32,
    pub inbound_sample_rate: u32,
    /// `None` waits for the remote side indefinitely.
    pub connect_timeout: Option<Duration>,
    pub event_queue_capacity: usize,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            frame_size: 4096,
            capture_rate_hint: Some(OUTBOUND_SAMPLE_RATE),
            outbound_sample_rate: OUTBOUND_SAMPLE_RATE,
            inbound_sample_rate: INBOUND_SAMPLE_RATE,
            connect_timeout: Some(Duration::from_secs(15)),
            event_queue_capacity: 256,
            input_device: None,
            output_device: None,
        }
    }
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("system_instruction", &self.system_instruction)
            .field("endpoint", &self.endpoint)
            .field("frame_size", &self.frame_size)
            .field("capture_rate_hint", &self.capture_rate_hint)
            .field("outbound_sample_rate", &self.outbound_sample_rate)
            .field("inbound_sample_rate", &self.inbound_sample_rate)
            .field("connect_timeout", &self.connect_timeout)
            .field("event_queue_capacity", &self.event_queue_capacity)
            .field("input_device", &self.input_device)
            .field("output_device", &self.output_device)
            .finish()
    }
}

impl LiveConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .context("GEMINI_API_KEY (or API_KEY) must be set")?;

        if let Some(model) = get("LIVE_MODEL") {
            config.model = model;
        }
        if let Some(voice) = get("LIVE_VOICE") {
            config.voice = voice;
        }
        if let Some(instruction) = get("LIVE_SYSTEM_INSTRUCTION") {
            config.system_instruction = instruction;
        }
        if let Some(endpoint) = get("LIVE_ENDPOINT") {
            Url::parse(&endpoint).with_context(|| format!("Invalid LIVE_ENDPOINT: {endpoint}"))?;
            config.endpoint = endpoint;
        }
        if let Some(secs) = get("LIVE_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid LIVE_CONNECT_TIMEOUT_SECS: {secs}"))?;
            config.connect_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.input_device = get("LIVE_INPUT_DEVICE");
        config.output_device = get("LIVE_OUTPUT_DEVICE");

        Ok(config)
    }

    /// Websocket URL with the API key attached.
    pub fn endpoint_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid endpoint: {}", self.endpoint))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Model name as the setup message expects it.
    pub fn qualified_model(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LiveConfig::default();

        assert_eq!(config.frame_size, 4096);
        assert_eq!(config.capture_rate_hint, Some(16_000));
        assert_eq!(config.inbound_sample_rate, 24_000);
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.voice, "Puck");
    }

    #[test]
    fn test_api_key_is_required() {
        assert!(LiveConfig::from_lookup(lookup(&[])).is_err());
        assert!(LiveConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_api_key_fallback_and_overrides() {
        let config = LiveConfig::from_lookup(lookup(&[
            ("API_KEY", "fallback"),
            ("LIVE_VOICE", "Kore"),
            ("LIVE_CONNECT_TIMEOUT_SECS", "0"),
            ("LIVE_INPUT_DEVICE", "USB Mic"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "fallback");
        assert_eq!(config.voice, "Kore");
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.input_device.as_deref(), Some("USB Mic"));
        assert_eq!(config.output_device, None);
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let result = LiveConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("LIVE_CONNECT_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_url_carries_key() {
        let config = LiveConfig {
            api_key: "secret key".to_string(),
            ..Default::default()
        };
        let url = config.endpoint_url().unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("generativelanguage.googleapis.com"));
        assert_eq!(url.query(), Some("key=secret+key"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LiveConfig {
            api_key: "super-secret".to_string(),
            ..Default::default()
        };
        let text = format!("{config:?}");

        assert!(!text.contains("super-secret"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn test_qualified_model() {
        let mut config = LiveConfig::default();
        assert_eq!(
            config.qualified_model(),
            format!("models/{DEFAULT_MODEL}")
        );

        config.model = "models/custom".to_string();
        assert_eq!(config.qualified_model(), "models/custom");
    }
}
