use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Declined,
    NoResponse,
    Maybe,
}

impl ResponseStatus {
    /// Maps the many spellings found in response sheets; unknown values are dropped.
    pub fn parse(raw: &str) -> Option<ResponseStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "decline" | "declined" | "absage" | "cancel" | "cancelled" | "canceled" | "no" => {
                Some(ResponseStatus::Declined)
            }
            "no_response" | "none" | "unanswered" | "missing" | "unknown" => {
                Some(ResponseStatus::NoResponse)
            }
            "maybe" => Some(ResponseStatus::Maybe),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResponseStatus::Declined => "cancelled",
            ResponseStatus::NoResponse => "no_response",
            ResponseStatus::Maybe => "maybe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResponse {
    pub player_key: String,
    pub display_name: String,
    pub status: ResponseStatus,
    pub response_time: Option<DateTime<Utc>>,
    pub source: String,
    pub note: String,
}

/// Latest response per player. Timed rows beat untimed ones; among equals
/// the later row wins.
pub fn latest_by_player(responses: &[EventResponse]) -> BTreeMap<String, &EventResponse> {
    let mut latest: BTreeMap<String, &EventResponse> = BTreeMap::new();
    for resp in responses {
        match latest.get(&resp.player_key) {
            Some(prev) if prev.response_time > resp.response_time => {}
            _ => {
                latest.insert(resp.player_key.clone(), resp);
            }
        }
    }
    latest
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseSummary {
    pub declined: BTreeSet<String>,
    pub no_response: BTreeSet<String>,
    pub maybe: BTreeSet<String>,
    pub raw_rows: usize,
}

pub fn summarize(responses: &[EventResponse]) -> ResponseSummary {
    let mut out = ResponseSummary {
        raw_rows: responses.len(),
        ..ResponseSummary::default()
    };
    for (key, resp) in latest_by_player(responses) {
        match resp.status {
            ResponseStatus::Declined => out.declined.insert(key),
            ResponseStatus::NoResponse => out.no_response.insert(key),
            ResponseStatus::Maybe => out.maybe.insert(key),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resp(key: &str, status: ResponseStatus, hour: Option<u32>) -> EventResponse {
        EventResponse {
            player_key: key.to_string(),
            display_name: key.to_string(),
            status,
            response_time: hour.map(|h| Utc.with_ymd_and_hms(2025, 5, 1, h, 0, 0).unwrap()),
            source: "manual".to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn status_aliases() {
        assert_eq!(ResponseStatus::parse("Absage"), Some(ResponseStatus::Declined));
        assert_eq!(ResponseStatus::parse(" canceled "), Some(ResponseStatus::Declined));
        assert_eq!(ResponseStatus::parse("unanswered"), Some(ResponseStatus::NoResponse));
        assert_eq!(ResponseStatus::parse("MAYBE"), Some(ResponseStatus::Maybe));
        assert_eq!(ResponseStatus::parse("yes"), None);
    }

    #[test]
    fn latest_timed_response_wins() {
        let rows = vec![
            resp("p", ResponseStatus::Declined, Some(12)),
            resp("p", ResponseStatus::Maybe, Some(9)),
            resp("p", ResponseStatus::NoResponse, None),
            resp("q", ResponseStatus::NoResponse, None),
            resp("q", ResponseStatus::Declined, None),
        ];
        let summary = summarize(&rows);
        assert!(summary.declined.contains("p"));
        assert!(summary.declined.contains("q"));
        assert!(summary.no_response.is_empty());
        assert_eq!(summary.raw_rows, 5);
    }
}
