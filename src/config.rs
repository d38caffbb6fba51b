use std::fs;
use std::path::Path;

use crate::error::Error;
use crate::recipients::DEFAULT_DELIMITERS;

/// Authentication mechanisms offered to the SMTP smarthost
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AuthMechanism {
    Plain,
    Login,
}

/// Authentication settings for an SMTP smarthost
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmtpAuth {
    pub mechanism: AuthMechanism,
    pub username: String,
    pub password: String,
}

/// Settings for the relay endpoint side: where accepted emails are handed off
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// The smarthost which performs the actual delivery
    pub domain_name: String,
    pub port: u16,
    pub use_tls: bool,
    pub require_tls: bool,
    pub auth: Option<SmtpAuth>,
    pub helo_name: String,
    pub smtp_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            domain_name: "localhost".to_string(),
            port: 25,
            use_tls: false,
            require_tls: false,
            auth: None,
            helo_name: "localhost".to_string(),
            smtp_timeout_secs: 60,
        }
    }
}

/// Dispatcher configuration settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL the send requests are POSTed to
    pub relay_url: String,

    /// Upper bound on a single send request
    pub send_timeout_secs: u64,

    /// Pause between recipients when the caller does not choose one
    pub default_delay_secs: u64,

    /// Characters that separate pasted addresses
    pub delimiters: String,

    /// Where the default sender identity is kept. Not persisted if None.
    pub identity_path: Option<String>,

    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            relay_url: "http://localhost/send-email".to_string(),
            send_timeout_secs: 30,
            default_delay_secs: 1,
            delimiters: DEFAULT_DELIMITERS.to_string(),
            identity_path: None,
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let text = fs::read_to_string(path)?;
        Config::from_toml(&text)
    }

    pub fn is_valid(&self) -> bool {
        !self.relay_url.is_empty() && self.send_timeout_secs > 0 && !self.relay.domain_name.is_empty()
    }
}
