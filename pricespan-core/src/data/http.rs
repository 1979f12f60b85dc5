//! Shared HTTP plumbing for the blocking providers.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use super::provider::DataError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Network settings applied to every provider client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpSettings {
    /// Per-request timeout; bounds how long one hung symbol holds a worker.
    pub timeout: Duration,
    /// Cooldown after the circuit breaker opens.
    pub breaker_cooldown: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            breaker_cooldown: Duration::from_secs(30 * 60),
        }
    }
}

/// Blocking client with the configured timeout and a browser user agent.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::blocking::Client, DataError> {
    reqwest::blocking::Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DataError::ClientSetup(e.to_string()))
}

/// Map a transport-level failure onto the error taxonomy.
pub fn transport_error(e: reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::Timeout(e.to_string())
    } else if e.is_decode() {
        DataError::ResponseFormatChanged(e.to_string())
    } else {
        DataError::NetworkUnreachable(e.to_string())
    }
}

/// Accepts a JSON number, a numeric string, or a placeholder such as `"-"`
/// (mapped to `None`).
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(v) => Some(v),
        Raw::Text(s) => s.trim().parse::<f64>().ok(),
        Raw::Null => None,
    }
    .filter(|v| v.is_finite()))
}
