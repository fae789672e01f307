use std::collections::BTreeMap;
use std::f64::consts::LN_2;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{Diagnostics, Recovered};
use crate::model::{AttendanceRecord, Role};

/// Events with at least this many assignees and zero attendance are treated
/// as broken exports.
const CORRUPT_EVENT_MIN_ASSIGNEES: u32 = 3;

/// `0.5^(age/half_life)`; a non-positive half-life disables decay.
pub fn decay_weight(age_days: f64, half_life_days: f64) -> f64 {
    if !half_life_days.is_finite() || half_life_days <= 0.0 {
        return 1.0;
    }
    let age_days = if age_days.is_finite() { age_days.max(0.0) } else { 0.0 };
    (-(LN_2 * age_days / half_life_days)).exp()
}

/// Fractional days between the event and the reference, floored at zero.
pub fn age_days(reference: DateTime<Utc>, event_at: DateTime<Utc>) -> f64 {
    let secs = (reference - event_at).num_seconds() as f64;
    (secs / 86_400.0).max(0.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateBucket {
    pub assignments: u32,
    pub shows: u32,
    pub weighted_assignments: f64,
    pub weighted_shows: f64,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub last_noshow_at: Option<DateTime<Utc>>,
}

impl RateBucket {
    fn record(&mut self, attended: bool, weight: f64, at: DateTime<Utc>) {
        self.assignments += 1;
        self.weighted_assignments += weight;
        if attended {
            self.shows += 1;
            self.weighted_shows += weight;
            self.last_shown_at = self.last_shown_at.max(Some(at));
        } else {
            self.last_noshow_at = self.last_noshow_at.max(Some(at));
        }
    }

    pub fn noshows(&self) -> u32 {
        self.assignments - self.shows
    }

    pub fn show_rate(&self) -> f64 {
        if self.assignments == 0 {
            return 0.0;
        }
        self.shows as f64 / self.assignments as f64
    }

    pub fn noshow_rate(&self) -> f64 {
        1.0 - self.show_rate()
    }

    pub fn weighted_show_rate(&self) -> f64 {
        if self.weighted_assignments <= 0.0 {
            return 0.0;
        }
        (self.weighted_shows / self.weighted_assignments).clamp(0.0, 1.0)
    }

    pub fn weighted_noshow_rate(&self) -> f64 {
        1.0 - self.weighted_show_rate()
    }

    /// The rate fed to the prior: weighted when any weight survived decay.
    pub fn observed_noshow_rate(&self) -> Option<f64> {
        if self.assignments == 0 {
            return None;
        }
        if self.weighted_assignments > 0.0 {
            Some(self.weighted_noshow_rate())
        } else {
            Some(self.noshow_rate())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerRateProfile {
    pub player_key: String,
    pub start: RateBucket,
    pub sub: RateBucket,
    pub combined: RateBucket,
}

impl PlayerRateProfile {
    pub fn bucket(&self, role: Role) -> &RateBucket {
        match role {
            Role::Start => &self.start,
            Role::Sub => &self.sub,
        }
    }

    pub fn events_seen(&self) -> u32 {
        self.combined.assignments
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub profiles: BTreeMap<String, PlayerRateProfile>,
    pub dropped_events: Vec<String>,
    pub records_used: usize,
    pub records_before_start: usize,
}

/// Folds attendance rows into per-player profiles relative to `reference`.
pub fn aggregate(
    records: &[AttendanceRecord],
    reference: DateTime<Utc>,
    half_life_days: f64,
    since: Option<NaiveDate>,
    diagnostics: &mut Diagnostics,
) -> Aggregation {
    let mut records_before_start = 0;
    let kept: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|rec| match since {
            Some(date) if rec.event_at.date_naive() < date => {
                records_before_start += 1;
                false
            }
            _ => true,
        })
        .collect();

    let mut per_event: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for rec in &kept {
        let entry = per_event.entry(rec.event_id.as_str()).or_default();
        entry.0 += 1;
        entry.1 += u32::from(rec.attended);
    }
    let dropped_events: Vec<String> = per_event
        .iter()
        .filter(|(_, (assignees, shows))| *assignees >= CORRUPT_EVENT_MIN_ASSIGNEES && *shows == 0)
        .map(|(id, (assignees, _))| {
            diagnostics.push(Recovered::DroppedEvent {
                event_id: id.to_string(),
                assignees: *assignees,
            });
            id.to_string()
        })
        .collect();

    let mut profiles: BTreeMap<String, PlayerRateProfile> = BTreeMap::new();
    let mut records_used = 0;
    for rec in kept {
        if dropped_events.binary_search(&rec.event_id).is_ok() {
            continue;
        }
        let weight = decay_weight(age_days(reference, rec.event_at), half_life_days);
        let profile = profiles
            .entry(rec.player_key.clone())
            .or_insert_with(|| PlayerRateProfile {
                player_key: rec.player_key.clone(),
                ..PlayerRateProfile::default()
            });
        match rec.role {
            Role::Start => profile.start.record(rec.attended, weight, rec.event_at),
            Role::Sub => profile.sub.record(rec.attended, weight, rec.event_at),
        }
        profile.combined.record(rec.attended, weight, rec.event_at);
        records_used += 1;
    }

    tracing::info!(
        players = profiles.len(),
        records = records_used,
        dropped = dropped_events.len(),
        "aggregated attendance history"
    );

    Aggregation {
        profiles,
        dropped_events,
        records_used,
        records_before_start,
    }
}

/// Worst attendance first: no-show rate desc, weighted no-show rate desc, key asc.
pub fn history_order(profiles: &BTreeMap<String, PlayerRateProfile>) -> Vec<&PlayerRateProfile> {
    let mut rows: Vec<&PlayerRateProfile> = profiles.values().collect();
    rows.sort_by(|a, b| {
        b.combined
            .noshow_rate()
            .total_cmp(&a.combined.noshow_rate())
            .then(
                b.combined
                    .weighted_noshow_rate()
                    .total_cmp(&a.combined.weighted_noshow_rate()),
            )
            .then_with(|| a.player_key.cmp(&b.player_key))
    });
    rows
}
