use anyhow::{anyhow, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    /// Externally reachable URL the telephony provider calls back on.
    pub public_base_url: String,
    pub turn_budget: u32,
    pub max_silent_turns: u32,
    /// Human destination dialled before the dialogue starts.
    pub transfer_number: Option<String>,
    pub transfer_timeout_secs: u64,
    pub sms_confirmation: bool,
    pub voice: Option<String>,
    pub language: String,
    pub twilio: TwilioConfig,
    pub llm: LlmConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_sessions: usize,
    pub idle_timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: "https://api.twilio.com/2010-04-01".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            base_url: None,
            temperature: Some(0.2),
            max_tokens: Some(256),
            timeout_secs: 8,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            idle_timeout_secs: 3600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            log_level: Some("info".to_string()),
            log_file: None,
            public_base_url: String::new(),
            turn_budget: 6,
            max_silent_turns: 3,
            transfer_number: None,
            transfer_timeout_secs: 20,
            sms_confirmation: false,
            voice: None,
            language: "en-US".to_string(),
            twilio: TwilioConfig::default(),
            llm: LlmConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }

    /// Environment (and `.env`) values take precedence over the file.
    pub fn apply_env(mut self) -> Self {
        let _ = dotenv::dotenv();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(v) = var("PUBLIC_BASE_URL") {
            self.public_base_url = v;
        }
        if let Some(v) = var("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = v;
        }
        if let Some(v) = var("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = v;
        }
        if let Some(v) = var("TWILIO_FROM_NUMBER") {
            self.twilio.from_number = v;
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = var("TRANSFER_NUMBER") {
            self.transfer_number = Some(v);
        }
        if let Some(v) = var("TURN_BUDGET").and_then(|v| v.parse::<u32>().ok()) {
            self.turn_budget = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.public_base_url.trim().is_empty() {
            missing.push("public_base_url");
        }
        if self.twilio.account_sid.trim().is_empty() {
            missing.push("twilio.account_sid");
        }
        if self.twilio.auth_token.trim().is_empty() {
            missing.push("twilio.auth_token");
        }
        if self.twilio.from_number.trim().is_empty() {
            missing.push("twilio.from_number");
        }
        if self.llm.api_key.trim().is_empty() {
            missing.push("llm.api_key");
        }
        if !missing.is_empty() {
            return Err(anyhow!("missing required configuration: {}", missing.join(", ")));
        }
        if !self.public_base_url.starts_with("http://")
            && !self.public_base_url.starts_with("https://")
        {
            return Err(anyhow!(
                "public_base_url must be an http(s) URL: {}",
                self.public_base_url
            ));
        }
        if self.turn_budget == 0 {
            return Err(anyhow!("turn_budget must be greater than zero"));
        }
        if self.max_silent_turns == 0 {
            return Err(anyhow!("max_silent_turns must be greater than zero"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    /// Transfer target, ignoring blank values.
    pub fn transfer_target(&self) -> Option<&str> {
        self.transfer_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}
