/// Serde support for `Duration` fields written as humantime strings.
///
/// Accepts `"30s"`, `"5m"`, `"1h 30m"` and also bare integers, which are read
/// as milliseconds. Always serializes back to a humantime string.
pub mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DurationRepr {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match DurationRepr::deserialize(deserializer)? {
            DurationRepr::Millis(millis) => Ok(Duration::from_millis(millis)),
            DurationRepr::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| serde::de::Error::custom(format!("invalid duration '{}': {}", text, e))),
        }
    }
}
