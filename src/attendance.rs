use serde::Serialize;

use crate::config::TargetBand;
use crate::model::{PerTeam, Role, SlotMap, Team};

/// Distribution of the number of successes among independent trials with
/// individual probabilities `ps`. Index `k` holds `P(X = k)`.
pub fn poisson_binomial_pmf(ps: &[f64]) -> Vec<f64> {
    let mut pmf = vec![0.0; ps.len() + 1];
    pmf[0] = 1.0;
    for (i, &p) in ps.iter().enumerate() {
        let p = p.clamp(0.0, 1.0);
        for k in (1..=i + 1).rev() {
            pmf[k] = pmf[k] * (1.0 - p) + pmf[k - 1] * p;
        }
        pmf[0] *= 1.0 - p;
    }
    pmf
}

pub fn prob_at_least(ps: &[f64], threshold: usize) -> f64 {
    poisson_binomial_pmf(ps).iter().skip(threshold).sum()
}

/// Expected number of missing attendees below `target`.
pub fn expected_shortfall(ps: &[f64], target: usize) -> f64 {
    poisson_binomial_pmf(ps)
        .iter()
        .enumerate()
        .map(|(k, prob)| target.saturating_sub(k) as f64 * prob)
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandStatus {
    Below,
    Within,
    Above,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOutlook {
    pub team: Team,
    pub max_slots: u32,
    pub rostered: usize,
    pub expected_starters: f64,
    pub expected_subs: f64,
    pub expected_total: f64,
    pub target: TargetBand,
    pub target_diff: f64,
    pub prob_reaching_target: f64,
    pub expected_shortfall: f64,
    pub status: BandStatus,
}

/// `rostered` holds `(team, role, attend_prob)` for every placed player.
pub fn team_outlook(
    rostered: &[(Team, Role, f64)],
    capacity: &SlotMap<u32>,
    targets: &PerTeam<TargetBand>,
) -> PerTeam<TeamOutlook> {
    PerTeam::from_fn(|team| {
        let max_slots = capacity.get(team, Role::Start) + capacity.get(team, Role::Sub);
        let band = targets.get(team);
        let target = TargetBand {
            low: band.low.min(max_slots as f64),
            high: band.high.min(max_slots as f64),
        };
        let sum_for = |role: Role| -> f64 {
            rostered
                .iter()
                .filter(|(t, r, _)| *t == team && *r == role)
                .map(|(_, _, p)| p.clamp(0.0, 1.0))
                .sum()
        };
        let probs: Vec<f64> = rostered
            .iter()
            .filter(|(t, _, _)| *t == team)
            .map(|(_, _, p)| *p)
            .collect();
        let expected_starters = sum_for(Role::Start);
        let expected_subs = sum_for(Role::Sub);
        let expected_total = expected_starters + expected_subs;
        let needed = target.low.ceil().max(0.0) as usize;
        let status = if expected_total < target.low {
            BandStatus::Below
        } else if expected_total > target.high {
            BandStatus::Above
        } else {
            BandStatus::Within
        };
        TeamOutlook {
            team,
            max_slots,
            rostered: probs.len(),
            expected_starters,
            expected_subs,
            expected_total,
            target,
            target_diff: expected_total - target.low,
            prob_reaching_target: prob_at_least(&probs, needed),
            expected_shortfall: expected_shortfall(&probs, needed),
            status,
        }
    })
}
