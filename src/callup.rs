use serde::Serialize;

use crate::compose::Composition;
use crate::config::CallupThresholds;
use crate::model::{Candidate, PerTeam, Team};

const SUGGESTIONS_PER_TEAM: usize = 5;
const DEFAULT_SUGGESTION_FLOOR: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallupReason {
    LowN,
    HighOverall,
    HighRolling,
    RollingUptick,
}

impl CallupReason {
    pub fn code(self) -> &'static str {
        match self {
            CallupReason::LowN => "low_n",
            CallupReason::HighOverall => "high_overall",
            CallupReason::HighRolling => "high_rolling",
            CallupReason::RollingUptick => "rolling_uptick",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallupFlag {
    pub recommended: bool,
    pub reasons: Vec<CallupReason>,
}

/// Flags rostered players whose record suggests asking for explicit confirmation.
pub fn recommend(
    events_seen: u32,
    noshow_overall: Option<f64>,
    noshow_rolling: Option<f64>,
    thresholds: &CallupThresholds,
) -> CallupFlag {
    let mut reasons = Vec::new();
    if events_seen <= thresholds.low_n_max_events {
        reasons.push(CallupReason::LowN);
    }
    let enough = events_seen >= thresholds.min_events;
    if enough && noshow_overall.is_some_and(|v| v >= thresholds.high_overall) {
        reasons.push(CallupReason::HighOverall);
    }
    if enough && noshow_rolling.is_some_and(|v| v >= thresholds.high_rolling) {
        reasons.push(CallupReason::HighRolling);
    }
    if enough
        && let (Some(overall), Some(rolling)) = (noshow_overall, noshow_rolling)
        && rolling >= thresholds.rolling_uptick_min
        && rolling >= overall + thresholds.rolling_uptick_delta
    {
        reasons.push(CallupReason::RollingUptick);
    }
    CallupFlag {
        recommended: !reasons.is_empty(),
        reasons,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallupSuggestion {
    pub player_key: String,
    pub display_name: String,
    pub attend_prob: f64,
    pub events_seen: u32,
    pub reason: String,
}

/// Best unrostered candidates per team, for filling late gaps by hand.
///
/// `is_available` excludes rostered, absent and unresponsive players.
pub fn suggestions(
    pool: &Composition,
    floors: &PerTeam<Option<f64>>,
    is_available: impl Fn(&Candidate) -> bool,
) -> PerTeam<Vec<CallupSuggestion>> {
    PerTeam::from_fn(|team: Team| {
        let floor = floors.get(team).unwrap_or(DEFAULT_SUGGESTION_FLOOR);
        let mut picks: Vec<&Candidate> = pool
            .candidates
            .iter()
            .filter(|c| is_available(*c) && c.attend_prob >= floor)
            .collect();
        picks.sort_by(|a, b| {
            b.attend_prob
                .total_cmp(&a.attend_prob)
                .then(b.events_seen.cmp(&a.events_seen))
                .then_with(|| a.player_key.cmp(&b.player_key))
        });
        picks
            .into_iter()
            .take(SUGGESTIONS_PER_TEAM)
            .map(|c| CallupSuggestion {
                player_key: c.player_key.clone(),
                display_name: c.display_name.clone(),
                attend_prob: c.attend_prob,
                events_seen: c.events_seen,
                reason: format!("AttendProb {:.0}%", c.attend_prob * 100.0),
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Preference;

    #[test]
    fn low_n_players_are_flagged() {
        let flag = recommend(1, Some(0.0), Some(0.0), &CallupThresholds::default());
        assert_eq!(flag.reasons, vec![CallupReason::LowN]);
        assert!(flag.recommended);
    }

    #[test]
    fn high_rates_need_enough_events() {
        let t = CallupThresholds::default();
        let flag = recommend(5, Some(0.45), Some(0.6), &t);
        assert_eq!(
            flag.reasons,
            vec![
                CallupReason::HighOverall,
                CallupReason::HighRolling,
                CallupReason::RollingUptick
            ]
        );
        let steady = recommend(5, Some(0.1), Some(0.15), &t);
        assert!(!steady.recommended);
        let too_few = CallupThresholds {
            low_n_max_events: 0,
            ..t
        };
        assert!(!recommend(2, Some(0.9), Some(0.9), &too_few).recommended);
    }

    #[test]
    fn suggestions_are_ranked_and_capped() {
        let candidates: Vec<Candidate> = (0..8)
            .map(|i| Candidate {
                player_key: format!("p{i}"),
                display_name: format!("P{i}"),
                attend_prob: 0.42 + 0.05 * i as f64,
                start_prob: 0.5,
                sub_prob: 0.5,
                preference: Preference::default(),
                events_seen: i,
                risk_penalty: 0.0,
            })
            .collect();
        let pool = Composition {
            candidates,
            ..Composition::default()
        };
        let floors = PerTeam {
            a: None,
            b: Some(0.7),
        };
        let out = suggestions(&pool, &floors, |c| c.player_key != "p7");
        let a: Vec<&str> = out.a.iter().map(|s| s.player_key.as_str()).collect();
        assert_eq!(a, vec!["p6", "p5", "p4", "p3", "p2"]);
        let b: Vec<&str> = out.b.iter().map(|s| s.player_key.as_str()).collect();
        assert_eq!(b, vec!["p6"]);
        assert_eq!(out.a[0].reason, "AttendProb 72%");
    }
}
