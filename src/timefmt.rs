// Time formatting helpers
// Catalog and course documents store times of day as "HH:MM" strings

use chrono::NaiveTime;

/// Parse a time of day written as "HH:MM" (seconds are tolerated)
pub fn parse_time(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
}

/// Render a time of day as "HH:MM"
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Compact "HHMM" form used inside tee-time identifiers
pub fn time_code(time: NaiveTime) -> String {
    time.format("%H%M").to_string()
}

/// serde adapter for `NaiveTime` fields stored as "HH:MM"
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(|e| {
            serde::de::Error::custom(format!("invalid time '{}', expected HH:MM: {}", raw, e))
        })
    }
}

/// serde adapter for `Option<NaiveTime>` fields stored as "HH:MM"
pub mod option_hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&super::format_time(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(raw) if !raw.trim().is_empty() => super::parse_time(&raw)
                .map(Some)
                .map_err(|e| {
                    serde::de::Error::custom(format!("invalid time '{}', expected HH:MM: {}", raw, e))
                }),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Window {
        #[serde(with = "hhmm")]
        start: NaiveTime,
        #[serde(default, with = "option_hhmm")]
        end: Option<NaiveTime>,
    }

    #[test]
    fn test_parse_time_accepts_minutes_and_seconds() {
        assert_eq!(parse_time("07:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(parse_time("07:30:00").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!(parse_time("7h30").is_err());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn test_time_code() {
        assert_eq!(time_code(NaiveTime::from_hms_opt(6, 5, 0).unwrap()), "0605");
    }

    #[test]
    fn test_hhmm_serde() {
        let window: Window = serde_json::from_str(r#"{"start":"06:00","end":null}"#).unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert_eq!(window.end, None);

        let json = serde_json::to_string(&Window {
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(11, 45, 0),
        })
        .unwrap();
        assert_eq!(json, r#"{"start":"06:00","end":"11:45"}"#);
    }

    #[test]
    fn test_hhmm_rejects_garbage() {
        let result: Result<Window, _> = serde_json::from_str(r#"{"start":"noon"}"#);
        assert!(result.is_err());
    }
}
