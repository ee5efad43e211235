//! Validation of command-line values

use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use std::time::Duration;

const MAX_TIMEOUT: Duration = Duration::from_secs(86_400);

/// Parse a human-readable run timeout such as `30s` or `1h 30m`
pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let deserializer: StrDeserializer<'_, ValueError> = value.into_deserializer();
    let timeout: Duration =
        humantime_serde::deserialize(deserializer).map_err(|e| e.to_string())?;

    if timeout.is_zero() {
        Err("Timeout must be greater than 0".to_string())
    } else if timeout > MAX_TIMEOUT {
        Err(format!(
            "Timeout of {} seconds is unreasonably large (max: {})",
            timeout.as_secs(),
            MAX_TIMEOUT.as_secs()
        ))
    } else {
        Ok(timeout)
    }
}
