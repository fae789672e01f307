use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{PlayerRateProfile, RateBucket};
use crate::config::RosterConfig;
use crate::model::{Candidate, Preference, Role};
use crate::prior::TeamPrior;
use crate::reliability::{ReliabilityEstimate, eb_rate};

/// An eligible member before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMember {
    pub player_key: String,
    pub display_name: String,
    pub preference: Preference,
}

/// Per-event adjustments keyed by canonical player key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub declined: BTreeSet<String>,
    pub no_response: BTreeSet<String>,
    pub hard_committed: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeSettings {
    pub eb_enable: bool,
    pub eb_n0: f64,
    pub eb_lambda: f64,
    pub no_response_multiplier: f64,
    pub hard_commit_floor: f64,
}

impl ComposeSettings {
    pub fn from_config(cfg: &RosterConfig) -> Self {
        Self {
            eb_enable: cfg.eb_enable,
            eb_n0: cfg.eb_n0,
            eb_lambda: cfg.eb_lambda,
            no_response_multiplier: cfg.no_response_multiplier,
            hard_commit_floor: cfg.hard_commit_floor,
        }
    }
}

/// Everything the report needs to explain one player's probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerScore {
    pub player_key: String,
    pub display_name: String,
    pub events_seen: u32,
    pub noshow_count: u32,
    pub noshow_overall: Option<f64>,
    pub noshow_rolling: Option<f64>,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub last_noshow_at: Option<DateTime<Utc>>,
    pub estimate: ReliabilityEstimate,
    pub risk_penalty: f64,
    pub attend_prob_raw: f64,
    pub attend_prob: f64,
    pub declined: bool,
    pub no_response: bool,
    pub hard_committed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    /// Sorted by player key; declined players are absent.
    pub candidates: Vec<Candidate>,
    pub scores: BTreeMap<String, PlayerScore>,
    pub declined: Vec<String>,
}

impl Composition {
    pub fn candidate(&self, key: &str) -> Option<&Candidate> {
        self.candidates
            .binary_search_by(|c| c.player_key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.candidates[idx])
    }
}

fn estimate_for(
    profile: Option<&PlayerRateProfile>,
    prior: &TeamPrior,
    settings: &ComposeSettings,
) -> ReliabilityEstimate {
    let combined = profile.map(|p| &p.combined);
    if !settings.eb_enable {
        let p_hat = combined
            .and_then(RateBucket::observed_noshow_rate)
            .unwrap_or(prior.p0);
        return ReliabilityEstimate { p_hat, sigma: 0.0 };
    }
    let (s, n) = combined
        .map(|b| (b.noshows() as f64, b.assignments as f64))
        .unwrap_or((0.0, 0.0));
    eb_rate(s, n, prior.p0, settings.eb_n0)
}

fn role_prob(profile: Option<&PlayerRateProfile>, role: Role, fallback: f64) -> f64 {
    match profile.map(|p| p.bucket(role)) {
        Some(bucket) if bucket.weighted_assignments > 0.0 => bucket.weighted_show_rate(),
        Some(bucket) if bucket.assignments > 0 => bucket.show_rate(),
        _ => fallback,
    }
}

/// Turns reliability estimates and event overlays into allocator candidates.
pub fn compose(
    members: &[PoolMember],
    profiles: &BTreeMap<String, PlayerRateProfile>,
    prior: &TeamPrior,
    overlay: &Overlay,
    settings: &ComposeSettings,
) -> Composition {
    let mut out = Composition::default();
    let mut seen = BTreeSet::new();

    for member in members {
        if !seen.insert(member.player_key.as_str()) {
            continue;
        }
        let key = &member.player_key;
        let profile = profiles.get(key);
        let estimate = estimate_for(profile, prior, settings);
        let risk_penalty = estimate.risk_penalty(settings.eb_lambda);

        let attend_prob_raw = (1.0 - estimate.p_hat).clamp(0.0, 1.0);
        let mut attend_prob = (attend_prob_raw - risk_penalty).clamp(0.0, 1.0);
        let declined = overlay.declined.contains(key);
        let no_response = overlay.no_response.contains(key);
        let hard_committed = overlay.hard_committed.contains(key);
        if no_response {
            attend_prob = (attend_prob * settings.no_response_multiplier).clamp(0.0, 1.0);
        }
        if hard_committed {
            attend_prob = attend_prob.max(settings.hard_commit_floor);
        }

        let combined = profile.map(|p| &p.combined);
        let has_history = combined.is_some_and(|b| b.assignments > 0);
        out.scores.insert(
            key.clone(),
            PlayerScore {
                player_key: key.clone(),
                display_name: member.display_name.clone(),
                events_seen: profile.map(PlayerRateProfile::events_seen).unwrap_or(0),
                noshow_count: combined.map(RateBucket::noshows).unwrap_or(0),
                noshow_overall: has_history.then(|| combined.map(RateBucket::noshow_rate)).flatten(),
                noshow_rolling: has_history
                    .then(|| combined.map(RateBucket::weighted_noshow_rate))
                    .flatten(),
                last_shown_at: combined.and_then(|b| b.last_shown_at),
                last_noshow_at: combined.and_then(|b| b.last_noshow_at),
                estimate,
                risk_penalty,
                attend_prob_raw,
                attend_prob,
                declined,
                no_response,
                hard_committed,
            },
        );

        if declined {
            out.declined.push(key.clone());
            continue;
        }
        out.candidates.push(Candidate {
            player_key: key.clone(),
            display_name: member.display_name.clone(),
            attend_prob,
            start_prob: role_prob(profile, Role::Start, attend_prob_raw),
            sub_prob: role_prob(profile, Role::Sub, attend_prob_raw),
            preference: member.preference,
            events_seen: profile.map(PlayerRateProfile::events_seen).unwrap_or(0),
            risk_penalty,
        });
    }

    out.candidates.sort_by(|a, b| a.player_key.cmp(&b.player_key));
    out.declined.sort();
    tracing::info!(
        candidates = out.candidates.len(),
        declined = out.declined.len(),
        "composed attendance probabilities"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::error::Diagnostics;
    use crate::model::AttendanceRecord;
    use crate::prior::PriorSource;
    use chrono::{Duration, TimeZone};

    fn settings() -> ComposeSettings {
        ComposeSettings::from_config(&RosterConfig::default())
    }

    fn prior() -> TeamPrior {
        TeamPrior {
            p0: 0.2,
            samples: 10,
            source: PriorSource::Mean,
        }
    }

    fn member(key: &str) -> PoolMember {
        PoolMember {
            player_key: key.to_string(),
            display_name: key.to_uppercase(),
            preference: Preference::default(),
        }
    }

    fn profiles() -> BTreeMap<String, PlayerRateProfile> {
        let reference = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let records: Vec<AttendanceRecord> = (0..5)
            .map(|i| AttendanceRecord {
                event_id: format!("e{i}"),
                player_key: "flaky".to_string(),
                role: Role::Start,
                attended: i < 2,
                event_at: reference - Duration::days(7 * i),
            })
            .collect();
        aggregate(&records, reference, 1e9, None, &mut Diagnostics::new()).profiles
    }

    #[test]
    fn attend_prob_subtracts_risk_penalty() {
        let out = compose(&[member("flaky")], &profiles(), &prior(), &Overlay::default(), &settings());
        let score = &out.scores["flaky"];
        assert!((score.estimate.p_hat - 0.4222).abs() < 1e-3);
        assert!((score.attend_prob_raw - (1.0 - score.estimate.p_hat)).abs() < 1e-12);
        assert!((score.attend_prob - (score.attend_prob_raw - 0.2 * score.estimate.sigma)).abs() < 1e-12);
        assert_eq!(score.events_seen, 5);
        assert_eq!(score.noshow_count, 3);
    }

    #[test]
    fn newcomers_get_the_prior() {
        let out = compose(&[member("fresh")], &profiles(), &prior(), &Overlay::default(), &settings());
        let cand = out.candidate("fresh").unwrap();
        assert_eq!(cand.events_seen, 0);
        assert!((out.scores["fresh"].estimate.p_hat - 0.2).abs() < 1e-12);
        assert_eq!(cand.start_prob, out.scores["fresh"].attend_prob_raw);
        assert_eq!(out.scores["fresh"].noshow_overall, None);
    }

    #[test]
    fn overlays_apply_in_order() {
        let overlay = Overlay {
            declined: BTreeSet::from(["gone".to_string()]),
            no_response: BTreeSet::from(["quiet".to_string(), "sure".to_string()]),
            hard_committed: BTreeSet::from(["sure".to_string()]),
        };
        let members = [member("gone"), member("quiet"), member("sure"), member("plain")];
        let out = compose(&members, &BTreeMap::new(), &prior(), &overlay, &settings());
        assert!(out.candidate("gone").is_none());
        assert_eq!(out.declined, vec!["gone".to_string()]);
        let plain = out.candidate("plain").unwrap().attend_prob;
        let quiet = out.candidate("quiet").unwrap().attend_prob;
        assert!((quiet - plain * 0.65).abs() < 1e-12);
        assert_eq!(out.candidate("sure").unwrap().attend_prob, 0.92);
    }

    #[test]
    fn disabled_eb_uses_observed_rate() {
        let mut s = settings();
        s.eb_enable = false;
        let out = compose(&[member("flaky")], &profiles(), &prior(), &Overlay::default(), &s);
        let score = &out.scores["flaky"];
        assert!((score.estimate.p_hat - 0.6).abs() < 1e-6);
        assert_eq!(score.risk_penalty, 0.0);
    }
}
