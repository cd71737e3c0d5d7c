//! TOML config file loading and validation: board kit selection, web port,
//! monitor cadence, and the optional SMS transport block.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Board kits selectable via `[board] kit`.
const KNOWN_KITS: &[&str] = &["sim", "grove"];

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub board: BoardSection,
    #[serde(default)]
    pub web: WebSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    pub sms: Option<SmsSection>,
}

#[derive(Debug, Deserialize)]
pub struct BoardSection {
    #[serde(default = "default_kit")]
    pub kit: String,
}

#[derive(Debug, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_moisture_interval")]
    pub moisture_interval_min: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmsSection {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender phone number.
    pub from: String,
    /// Recipient phone number.
    pub to: String,
    #[serde(default = "default_sms_api")]
    pub api_url: String,
}

fn default_kit() -> String {
    "sim".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_moisture_interval() -> u64 {
    15
}

fn default_sms_api() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

impl Default for BoardSection {
    fn default() -> Self {
        Self { kit: default_kit() }
    }
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            moisture_interval_min: default_moisture_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !KNOWN_KITS.contains(&self.board.kit.as_str()) {
            errors.push(format!(
                "board: unknown kit '{}' (allowed: {})",
                self.board.kit,
                KNOWN_KITS.join(", ")
            ));
        }

        if self.web.port == 0 {
            errors.push("web: port must be nonzero".to_string());
        }

        if self.monitor.moisture_interval_min == 0 {
            errors.push("monitor: moisture_interval_min must be positive".to_string());
        } else if self.monitor.moisture_interval_min > 24 * 60 {
            errors.push(format!(
                "monitor: moisture_interval_min {} exceeds one day",
                self.monitor.moisture_interval_min
            ));
        }

        if let Some(sms) = &self.sms {
            for (field, value) in [
                ("account_sid", &sms.account_sid),
                ("auth_token", &sms.auth_token),
                ("from", &sms.from),
                ("to", &sms.to),
            ] {
                if value.trim().is_empty() {
                    errors.push(format!("sms: {field} is empty"));
                }
            }
            if !sms.api_url.starts_with("http://") && !sms.api_url.starts_with("https://") {
                errors.push(format!("sms: api_url '{}' is not an http(s) URL", sms.api_url));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file. A missing file yields the
/// defaults (sim board, port 3000, SMS disabled); a present-but-invalid
/// file is an error.
pub fn load(path: &str) -> Result<Config> {
    if !std::path::Path::new(path).exists() {
        tracing::info!(path, "no config file — using defaults");
        return Ok(Config::default());
    }
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
