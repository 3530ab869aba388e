//! Serialized layout of the two persisted records
//!
//! Progress is stored as a JSON list of `[flowId, record]` pairs, analytics
//! as a JSON list of events. There is no version field: changing either
//! shape is a breaking change for existing stored data.

use std::collections::BTreeMap;

use crate::analytics::AnalyticsEvent;
use crate::flow::ProgressRecord;

pub fn encode_progress(progress: &BTreeMap<String, ProgressRecord>) -> serde_json::Result<String> {
    let pairs: Vec<(&String, &ProgressRecord)> = progress.iter().collect();
    serde_json::to_string(&pairs)
}

pub fn decode_progress(json: &str) -> serde_json::Result<BTreeMap<String, ProgressRecord>> {
    let pairs: Vec<(String, ProgressRecord)> = serde_json::from_str(json)?;
    Ok(pairs.into_iter().collect())
}

pub fn encode_analytics(events: &[AnalyticsEvent]) -> serde_json::Result<String> {
    serde_json::to_string(events)
}

pub fn decode_analytics(json: &str) -> serde_json::Result<Vec<AnalyticsEvent>> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::EventKind;
    use crate::clock;
    use crate::variant::Variant;

    #[test]
    fn test_progress_round_trip() {
        let mut tour = ProgressRecord::new("tour", Some(Variant::A), clock::now());
        tour.current_step_index = 2;
        tour.completed_steps.insert("a".to_string());
        tour.completed_steps.insert("b".to_string());
        tour.skipped = true;
        tour.completed_at = Some(clock::now());

        let mut map = BTreeMap::new();
        map.insert("tour".to_string(), tour);
        map.insert("setup".to_string(), ProgressRecord::new("setup", None, clock::now()));

        let json = encode_progress(&map).unwrap();
        assert_eq!(decode_progress(&json).unwrap(), map);
    }

    #[test]
    fn test_progress_is_list_of_pairs() {
        let mut map = BTreeMap::new();
        map.insert("tour".to_string(), ProgressRecord::new("tour", None, clock::now()));

        let value: serde_json::Value = serde_json::from_str(&encode_progress(&map).unwrap()).unwrap();
        assert_eq!(value[0][0], "tour");
        assert_eq!(value[0][1]["flowId"], "tour");
    }

    #[test]
    fn test_decode_corrupt_data() {
        assert!(decode_progress("{not json").is_err());
        assert!(decode_progress(r#"{"tour": {}}"#).is_err());
        assert!(decode_analytics("[{\"flowId\": 3}]").is_err());
    }

    #[test]
    fn test_analytics_keeps_order() {
        let events = vec![
            AnalyticsEvent::new("tour", "a", EventKind::Start),
            AnalyticsEvent::new("tour", "a", EventKind::Complete),
            AnalyticsEvent::new("tour", "b", EventKind::Next),
        ];
        let decoded = decode_analytics(&encode_analytics(&events).unwrap()).unwrap();
        assert_eq!(decoded, events);
    }
}
