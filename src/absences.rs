use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::model::AttendanceRecord;

const DEFAULT_EVENT_INTERVAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceScope {
    NextEvent,
    OpenRange,
    DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbsenceEntry {
    pub player_key: String,
    pub display_name: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub explicit_next_event: bool,
    pub reason: String,
}

impl AbsenceEntry {
    pub fn scope(&self) -> AbsenceScope {
        if self.explicit_next_event {
            AbsenceScope::NextEvent
        } else if self.from.is_none() && self.to.is_none() {
            AbsenceScope::OpenRange
        } else {
            AbsenceScope::DateRange
        }
    }

    /// Bounds are inclusive; a missing bound is unbounded.
    pub fn applies_to(&self, event_date: NaiveDate) -> bool {
        match self.scope() {
            AbsenceScope::NextEvent | AbsenceScope::OpenRange => true,
            AbsenceScope::DateRange => {
                self.from.is_none_or(|from| event_date >= from)
                    && self.to.is_none_or(|to| event_date <= to)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextEventSource {
    HistoryPlusInterval,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextEvent {
    pub date: NaiveDate,
    pub source: NextEventSource,
    pub last_event_id: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub interval_days: i64,
}

/// Last historical event plus the most common gap between event dates.
/// Without history the reference date is used.
pub fn infer_next_event(records: &[AttendanceRecord], reference: DateTime<Utc>) -> NextEvent {
    let Some(last) = records.iter().max_by(|a, b| {
        a.event_at
            .cmp(&b.event_at)
            .then_with(|| a.event_id.cmp(&b.event_id))
    }) else {
        return NextEvent {
            date: reference.date_naive(),
            source: NextEventSource::Reference,
            last_event_id: None,
            last_event_at: None,
            interval_days: DEFAULT_EVENT_INTERVAL_DAYS,
        };
    };

    let dates: BTreeSet<NaiveDate> = records.iter().map(|r| r.event_at.date_naive()).collect();
    let mut gap_counts: BTreeMap<i64, u32> = BTreeMap::new();
    let ordered: Vec<NaiveDate> = dates.into_iter().collect();
    for pair in ordered.windows(2) {
        let gap = (pair[1] - pair[0]).num_days();
        if gap > 0 {
            *gap_counts.entry(gap).or_default() += 1;
        }
    }
    // Most frequent gap; ties go to the shorter one.
    let interval_days = gap_counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(gap, _)| *gap)
        .unwrap_or(DEFAULT_EVENT_INTERVAL_DAYS);

    NextEvent {
        date: last.event_at.date_naive() + Duration::days(interval_days),
        source: NextEventSource::HistoryPlusInterval,
        last_event_id: Some(last.event_id.clone()),
        last_event_at: Some(last.event_at),
        interval_days,
    }
}

/// Keys of players absent on `event_date`.
pub fn absent_for(entries: &[AbsenceEntry], event_date: NaiveDate) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|e| e.applies_to(event_date))
        .map(|e| e.player_key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(from: Option<NaiveDate>, to: Option<NaiveDate>, next: bool) -> AbsenceEntry {
        AbsenceEntry {
            player_key: "p".into(),
            display_name: "P".into(),
            from,
            to,
            explicit_next_event: next,
            reason: String::new(),
        }
    }

    fn record(day: u32) -> AttendanceRecord {
        AttendanceRecord {
            event_id: format!("DS-2025-03-{day:02}-A"),
            player_key: "p".into(),
            role: Role::Start,
            attended: true,
            event_at: Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn scopes_and_ranges() {
        let event = date(2025, 4, 10);
        assert!(entry(None, None, false).applies_to(event));
        assert!(entry(Some(date(2025, 5, 1)), None, true).applies_to(event));
        assert!(entry(Some(date(2025, 4, 10)), Some(date(2025, 4, 10)), false).applies_to(event));
        assert!(!entry(Some(date(2025, 4, 11)), None, false).applies_to(event));
        assert!(!entry(None, Some(date(2025, 4, 9)), false).applies_to(event));
        assert_eq!(entry(None, None, false).scope(), AbsenceScope::OpenRange);
    }

    #[test]
    fn next_event_uses_modal_gap() {
        let records = vec![record(1), record(8), record(15), record(18)];
        let next = infer_next_event(&records, Utc::now());
        assert_eq!(next.interval_days, 7);
        assert_eq!(next.date, date(2025, 3, 25));
        assert_eq!(next.last_event_id.as_deref(), Some("DS-2025-03-18-A"));
    }

    #[test]
    fn single_event_defaults_to_a_week() {
        let next = infer_next_event(&[record(3)], Utc::now());
        assert_eq!(next.interval_days, 7);
        assert_eq!(next.date, date(2025, 3, 10));
        let reference = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let empty = infer_next_event(&[], reference);
        assert_eq!(empty.source, NextEventSource::Reference);
        assert_eq!(empty.date, date(2025, 1, 2));
    }
}
