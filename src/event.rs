use serde::{Deserialize, Serialize};

/// Anything ordered by an epoch-millisecond key.
pub trait Timestamped {
    fn epoch_ms(&self) -> i64;
}

impl Timestamped for i64 {
    fn epoch_ms(&self) -> i64 {
        *self
    }
}

/// One captured log line, as returned by the remote `/getData` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub epoch_ms: i64,
    /// Only set by the remote when the line could not be parsed
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub parsed_event: Option<ParsedEvent>,
}

impl Timestamped for Event {
    fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedEvent {
    pub program_id: String,
    pub program_version: String,
    pub device_config: String,
    pub time_delta: i64,
    pub log_message: String,
    /// parallel to `reading_values`
    pub reading_ids: Vec<String>,
    pub reading_values: Vec<f64>,
}

impl ParsedEvent {
    /// True when the program identity or device config differs from `prev`.
    pub fn config_differs(&self, prev: &ParsedEvent) -> bool {
        self.program_id != prev.program_id
            || self.program_version != prev.program_version
            || self.device_config != prev.device_config
    }

    /// (reading_id, value) pairs, truncated to the shorter of the two lists
    pub fn readings(&self) -> impl Iterator<Item = (&str, f64)> {
        self.reading_ids
            .iter()
            .map(String::as_str)
            .zip(self.reading_values.iter().copied())
    }

    pub fn reading(&self, reading_id: &str) -> Option<f64> {
        self.readings()
            .find(|(id, _)| *id == reading_id)
            .map(|(_, value)| value)
    }
}

impl Event {
    pub fn raw(epoch_ms: i64, raw_text: impl Into<String>) -> Self {
        Self {
            epoch_ms,
            raw_text: Some(raw_text.into()),
            parsed_event: None,
        }
    }

    pub fn parsed(epoch_ms: i64, parsed_event: ParsedEvent) -> Self {
        Self {
            epoch_ms,
            raw_text: None,
            parsed_event: Some(parsed_event),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_wire_event() {
        let json = r#"[
            {"epochMs": 100, "rawText": "garbled,,line"},
            {"epochMs": 200, "parsedEvent": {
                "programId": "cup", "programVersion": "3", "deviceConfig": "a",
                "timeDelta": 12, "logMessage": "ok",
                "readingIds": ["temp", "hum"], "readingValues": [21.5, 40.0]
            }},
            {"epochMs": 300, "rawText": null, "parsedEvent": null}
        ]"#;

        let events: Vec<Event> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].raw_text.as_deref(), Some("garbled,,line"));
        assert!(events[0].parsed_event.is_none());

        let parsed = events[1].parsed_event.as_ref().unwrap();
        assert_eq!(parsed.program_id, "cup");
        assert_eq!(parsed.time_delta, 12);
        assert_eq!(parsed.reading("hum"), Some(40.0));
        assert_eq!(parsed.reading("missing"), None);

        assert!(events[2].raw_text.is_none() && events[2].parsed_event.is_none());
    }

    #[test]
    fn missing_parsed_fields_default() {
        let e: Event =
            serde_json::from_str(r#"{"epochMs": 5, "parsedEvent": {"programId": "x"}}"#).unwrap();
        let parsed = e.parsed_event.unwrap();
        assert_eq!(parsed.program_id, "x");
        assert!(parsed.reading_ids.is_empty());
    }

    #[test]
    fn mismatched_reading_lists_pair_up_to_shorter() {
        let parsed = ParsedEvent {
            reading_ids: vec!["a".into(), "b".into()],
            reading_values: vec![1.0],
            ..Default::default()
        };
        assert_eq!(parsed.readings().count(), 1);
        assert_eq!(parsed.reading("b"), None);
    }

    #[test]
    fn config_difference() {
        let a = ParsedEvent {
            program_version: "1".into(),
            ..Default::default()
        };
        let mut b = a.clone();
        assert!(!b.config_differs(&a));
        b.device_config = "baud=9600".into();
        assert!(b.config_differs(&a));
    }
}
