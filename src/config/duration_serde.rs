//! Common serde utilities for human-readable durations across configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};
use tracing::warn;

use super::defaults::MAX_TIMEOUT_MS;

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or a humantime string like '1m30s'",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// Timeout knobs: `Option<Duration>` with lenient input.
///
/// Accepted forms:
/// - integers are milliseconds (`4000`)
/// - fractional numbers are seconds (`2.5`)
/// - strings are either of the above or humantime (`"4s"`, `"1m"`)
///
/// Values outside `(0, 5 minutes]` are ignored so the built-in default applies.
pub mod option_timeout {
    use super::*;

    pub fn serialize<S>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match timeout {
            Some(d) => {
                let duration_str = humantime::format_duration(*d).to_string();
                serializer.serialize_some(&duration_str)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeoutVisitor;

        impl<'de> Visitor<'de> for TimeoutVisitor {
            type Value = Option<Duration>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "null, milliseconds (integer), seconds (float) or a human-readable duration",
                )
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(TimeoutVisitor)
            }

            fn visit_u64<E>(self, millis: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(from_millis(millis))
            }

            fn visit_i64<E>(self, millis: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(u64::try_from(millis).ok().and_then(from_millis))
            }

            fn visit_f64<E>(self, seconds: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(from_seconds(seconds))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(parse_timeout(value))
            }
        }

        deserializer.deserialize_option(TimeoutVisitor)
    }
}

/// Parse a timeout string the same way the numeric visitors do.
pub fn parse_timeout(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(millis) = trimmed.parse::<u64>() {
        return from_millis(millis);
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return from_seconds(seconds);
    }
    match humantime::parse_duration(trimmed) {
        Ok(d) if !d.is_zero() && d.as_millis() <= u128::from(MAX_TIMEOUT_MS) => Some(d),
        _ => {
            warn!(value = trimmed, "Ignoring out-of-range or unparsable timeout");
            None
        }
    }
}

fn from_millis(millis: u64) -> Option<Duration> {
    if millis > 0 && millis <= MAX_TIMEOUT_MS {
        Some(Duration::from_millis(millis))
    } else {
        warn!(millis, "Ignoring out-of-range timeout");
        None
    }
}

fn from_seconds(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 && seconds * 1000.0 <= MAX_TIMEOUT_MS as f64 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        warn!(seconds, "Ignoring out-of-range timeout");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(default, with = "option_timeout")]
        value: Option<Duration>,
        #[serde(with = "duration")]
        connect: Duration,
    }

    #[test]
    fn test_parse_timeout_forms() {
        assert_eq!(parse_timeout("4000"), Some(Duration::from_millis(4000)));
        assert_eq!(parse_timeout("2.5"), Some(Duration::from_millis(2500)));
        assert_eq!(parse_timeout("4s"), Some(Duration::from_secs(4)));
        assert_eq!(parse_timeout("1m"), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_timeout_rejects_out_of_range() {
        assert_eq!(parse_timeout(""), None);
        assert_eq!(parse_timeout("0"), None);
        assert_eq!(parse_timeout("300001"), None);
        assert_eq!(parse_timeout("301.0"), None);
        assert_eq!(parse_timeout("10m"), None);
        assert_eq!(parse_timeout("soon"), None);
    }

    #[test]
    fn test_toml_round_trip_uses_humantime() {
        let parsed: Timeouts = toml::from_str("value = 1500\nconnect = \"10s\"").unwrap();
        assert_eq!(parsed.value, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.connect, Duration::from_secs(10));

        let rendered = toml::to_string(&parsed).unwrap();
        assert!(rendered.contains("value = \"1s 500ms\""));

        let reparsed: Timeouts = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.value, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_missing_timeout_is_none() {
        let parsed: Timeouts = toml::from_str("connect = 3").unwrap();
        assert_eq!(parsed.value, None);
        assert_eq!(parsed.connect, Duration::from_secs(3));
    }
}
