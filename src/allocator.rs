use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::RosterConfig;
use crate::error::{Diagnostics, InvalidForcedReason, Recovered, RosterError};
use crate::model::{
    Candidate, Category, CutoffReason, ForcedAssignment, PerTeam, Preference, Role,
    RosterAssignment, SLOT_ORDER, SelectionStage, SelectionTrace, SlotMap, Team,
};

/// Boost used when a player prefers the slot's team without a positive boost.
pub const DEFAULT_PREF_BOOST: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct AllocatorSettings {
    pub capacity: SlotMap<u32>,
    pub min_attend: SlotMap<Option<f64>>,
    /// Starter count the fallback pass tops up to when a threshold rejects too many.
    pub min_starters: PerTeam<Option<u32>>,
    pub start_no_data_cap: Option<u32>,
    pub allow_unfilled: bool,
}

impl AllocatorSettings {
    pub fn from_config(cfg: &RosterConfig) -> Self {
        Self {
            capacity: cfg.capacity,
            min_attend: cfg.min_attend,
            min_starters: PerTeam {
                a: None,
                b: Some(cfg.min_b_starters),
            },
            start_no_data_cap: cfg.start_no_data_cap,
            allow_unfilled: cfg.allow_unfilled,
        }
    }
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self::from_config(&RosterConfig::default())
    }
}

pub fn preference_boost(pref: &Preference, team: Team) -> f64 {
    if pref.team != Some(team) {
        return 0.0;
    }
    match pref.boost {
        Some(boost) if boost.is_finite() && boost > 0.0 => boost,
        _ => DEFAULT_PREF_BOOST,
    }
}

pub fn slot_score(candidate: &Candidate, team: Team) -> f64 {
    (candidate.attend_prob + preference_boost(&candidate.preference, team) - candidate.risk_penalty)
        .clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotFill {
    pub capacity: u32,
    pub forced: u32,
    pub main: u32,
    pub fallback: u32,
}

impl SlotFill {
    pub fn filled(&self) -> u32 {
        self.forced + self.main + self.fallback
    }

    pub fn scored(&self) -> u32 {
        self.main + self.fallback
    }

    /// Slots left for scored candidates after forced placements.
    pub fn open_after_forced(&self) -> u32 {
        self.capacity.saturating_sub(self.forced)
    }

    pub fn open(&self) -> u32 {
        self.capacity.saturating_sub(self.filled())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overbooked {
    pub team: Team,
    pub role: Role,
    pub capacity: u32,
    pub forced: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidForced {
    pub player_key: String,
    pub reason: InvalidForcedReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    /// In placement order: forced first, then slot by slot.
    pub assignments: Vec<RosterAssignment>,
    /// One entry per candidate or forced player, sorted by key.
    pub trace: Vec<SelectionTrace>,
    pub fill: SlotMap<SlotFill>,
    pub overbooked: Vec<Overbooked>,
    pub invalid_forced: Vec<InvalidForced>,
}

impl Allocation {
    pub fn slot_members(&self, team: Team, role: Role) -> impl Iterator<Item = &RosterAssignment> {
        self.assignments
            .iter()
            .filter(move |a| a.team == team && a.role == role)
    }

    pub fn assignment_for(&self, key: &str) -> Option<&RosterAssignment> {
        self.assignments.iter().find(|a| a.player_key == key)
    }
}

struct Ranked<'a> {
    cand: &'a Candidate,
    category: Category,
    score: f64,
}

fn main_order(role: Role) -> impl Fn(&Ranked<'_>, &Ranked<'_>) -> Ordering {
    move |a, b| {
        a.category
            .cmp(&b.category)
            .then(b.score.total_cmp(&a.score))
            .then(b.cand.role_prob(role).total_cmp(&a.cand.role_prob(role)))
            .then_with(|| a.cand.player_key.cmp(&b.cand.player_key))
    }
}

fn fallback_order(a: &Ranked<'_>, b: &Ranked<'_>) -> Ordering {
    a.category
        .cmp(&b.category)
        .then(b.score.total_cmp(&a.score))
        .then(a.cand.events_seen.cmp(&b.cand.events_seen))
        .then_with(|| a.cand.player_key.cmp(&b.cand.player_key))
}

struct Allocator<'a> {
    settings: &'a AllocatorSettings,
    used: BTreeSet<String>,
    traces: BTreeMap<String, SelectionTrace>,
    no_data_starters: PerTeam<u32>,
    out: Allocation,
}

impl Allocator<'_> {
    fn note(
        &mut self,
        r: &Ranked<'_>,
        (team, role): (Team, Role),
        stage: SelectionStage,
        cutoff_reason: Option<CutoffReason>,
    ) {
        let selected = cutoff_reason.is_none();
        self.traces.insert(
            r.cand.player_key.clone(),
            SelectionTrace {
                player_key: r.cand.player_key.clone(),
                team: Some(team),
                role: Some(role),
                stage: Some(stage),
                category: Some(r.category),
                slot_score: Some(r.score),
                attend_prob: r.cand.attend_prob,
                events_seen: r.cand.events_seen,
                selected,
                cutoff_reason,
            },
        );
    }

    fn low_data_blocked(&self, cand: &Candidate, team: Team, role: Role) -> bool {
        match self.settings.start_no_data_cap {
            Some(cap) if role == Role::Start && cand.events_seen == 0 => {
                *self.no_data_starters.get(team) >= cap
            }
            _ => false,
        }
    }

    fn place(&mut self, r: &Ranked<'_>, team: Team, role: Role, stage: SelectionStage) {
        if role == Role::Start && r.cand.events_seen == 0 {
            *self.no_data_starters.get_mut(team) += 1;
        }
        let fill = self.out.fill.get_mut(team, role);
        match stage {
            SelectionStage::Fallback => fill.fallback += 1,
            _ => fill.main += 1,
        }
        self.used.insert(r.cand.player_key.clone());
        self.out.assignments.push(RosterAssignment {
            player_key: r.cand.player_key.clone(),
            team,
            role,
            stage,
        });
        self.note(r, (team, role), stage, None);
    }

    fn place_forced(
        &mut self,
        forced: &[ForcedAssignment],
        lookup: &BTreeMap<&str, &Candidate>,
        diagnostics: &mut Diagnostics,
    ) {
        for f in forced {
            if self.used.contains(&f.player_key) {
                diagnostics.push(Recovered::InvalidForced {
                    player: f.player_key.clone(),
                    reason: InvalidForcedReason::Duplicate,
                });
                self.out.invalid_forced.push(InvalidForced {
                    player_key: f.player_key.clone(),
                    reason: InvalidForcedReason::Duplicate,
                });
                continue;
            }
            self.used.insert(f.player_key.clone());
            self.out.fill.get_mut(f.team, f.role).forced += 1;
            self.out.assignments.push(RosterAssignment {
                player_key: f.player_key.clone(),
                team: f.team,
                role: f.role,
                stage: SelectionStage::Forced,
            });
            let cand = lookup.get(f.player_key.as_str());
            self.traces.insert(
                f.player_key.clone(),
                SelectionTrace {
                    player_key: f.player_key.clone(),
                    team: Some(f.team),
                    role: Some(f.role),
                    stage: Some(SelectionStage::Forced),
                    category: None,
                    slot_score: None,
                    attend_prob: cand.map(|c| c.attend_prob).unwrap_or(0.0),
                    events_seen: cand.map(|c| c.events_seen).unwrap_or(0),
                    selected: true,
                    cutoff_reason: None,
                },
            );
        }

        for (team, role) in SLOT_ORDER {
            let fill = *self.out.fill.get(team, role);
            if fill.forced > fill.capacity {
                diagnostics.push(Recovered::Overbooked {
                    team,
                    role,
                    capacity: fill.capacity,
                    forced: fill.forced,
                });
                self.out.overbooked.push(Overbooked {
                    team,
                    role,
                    capacity: fill.capacity,
                    forced: fill.forced,
                });
            }
        }
    }

    fn fill_slot<'c>(
        &mut self,
        pool: &[&'c Candidate],
        team: Team,
        role: Role,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), RosterError> {
        let mut remaining = self.out.fill.get(team, role).open();
        if remaining == 0 {
            return Ok(());
        }
        let threshold = (*self.settings.min_attend.get(team, role)).filter(|t| t.is_finite());

        let mut ranked: Vec<Ranked<'c>> = pool
            .iter()
            .copied()
            .filter(|c| !self.used.contains(&c.player_key))
            .map(|c| Ranked {
                cand: c,
                category: Category::of(&c.preference, team),
                score: slot_score(c, team),
            })
            .collect();
        ranked.sort_by(main_order(role));

        let slot = (team, role);
        let mut deferred = Vec::new();
        for r in ranked {
            if remaining == 0 {
                self.note(&r, slot, SelectionStage::Main, Some(CutoffReason::NoSlotsLeft));
                continue;
            }
            if let Some(t) = threshold
                && r.cand.attend_prob < t
            {
                self.note(
                    &r,
                    slot,
                    SelectionStage::Main,
                    Some(CutoffReason::BelowThreshold { threshold: t }),
                );
                deferred.push(r);
                continue;
            }
            if self.low_data_blocked(r.cand, team, role) {
                self.note(&r, slot, SelectionStage::Main, Some(CutoffReason::LowDataCapReached));
                continue;
            }
            self.place(&r, team, role, SelectionStage::Main);
            remaining -= 1;
        }

        if role == Role::Start
            && threshold.is_some()
            && remaining > 0
            && let Some(minimum) = *self.settings.min_starters.get(team)
        {
            let fill = *self.out.fill.get(team, role);
            let target = minimum.min(fill.capacity);
            let mut need = target.saturating_sub(fill.forced + fill.main).min(remaining);
            deferred.sort_by(fallback_order);
            for r in deferred {
                if need == 0 {
                    self.note(&r, slot, SelectionStage::Fallback, Some(CutoffReason::MinimumReached));
                    continue;
                }
                if self.low_data_blocked(r.cand, team, role) {
                    self.note(
                        &r,
                        slot,
                        SelectionStage::Fallback,
                        Some(CutoffReason::LowDataCapReached),
                    );
                    continue;
                }
                self.place(&r, team, role, SelectionStage::Fallback);
                need -= 1;
                remaining -= 1;
            }
        }

        let fill = self.out.fill.get(team, role);
        tracing::debug!(
            team = team.label(),
            role = role.label(),
            forced = fill.forced,
            main = fill.main,
            fallback = fill.fallback,
            capacity = fill.capacity,
            "slot filled"
        );
        if remaining > 0 {
            if !self.settings.allow_unfilled {
                return Err(RosterError::CapacityShortfall {
                    team,
                    role,
                    missing: remaining,
                });
            }
            diagnostics.push(Recovered::Unfilled {
                team,
                role,
                missing: remaining,
            });
        }
        Ok(())
    }

    fn verify(&self) -> Result<(), RosterError> {
        let mut keys = BTreeSet::new();
        for a in &self.out.assignments {
            if !keys.insert(a.player_key.as_str()) {
                return Err(RosterError::DuplicateAssignment {
                    player: a.player_key.clone(),
                });
            }
        }
        for (team, role) in SLOT_ORDER {
            let fill = self.out.fill.get(team, role);
            let actual = self.out.slot_members(team, role).count() as u32;
            let expected_max = fill.open_after_forced();
            let exact = !self.settings.allow_unfilled;
            if actual != fill.filled()
                || fill.scored() > expected_max
                || (exact && fill.scored() != expected_max)
            {
                return Err(RosterError::FillMismatch {
                    team,
                    role,
                    expected: fill.forced + expected_max,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Fills the four slots from `candidates` after placing `forced` players.
///
/// Candidate keys are expected to be unique; later duplicates are ignored.
pub fn allocate(
    candidates: &[Candidate],
    forced: &[ForcedAssignment],
    settings: &AllocatorSettings,
    diagnostics: &mut Diagnostics,
) -> Result<Allocation, RosterError> {
    let mut lookup: BTreeMap<&str, &Candidate> = BTreeMap::new();
    for cand in candidates {
        lookup.entry(cand.player_key.as_str()).or_insert(cand);
    }

    let mut alloc = Allocator {
        settings,
        used: BTreeSet::new(),
        traces: BTreeMap::new(),
        no_data_starters: PerTeam::default(),
        out: Allocation {
            fill: SlotMap::from_fn(|team, role| SlotFill {
                capacity: *settings.capacity.get(team, role),
                ..SlotFill::default()
            }),
            ..Allocation::default()
        },
    };

    alloc.place_forced(forced, &lookup, diagnostics);

    let pool: Vec<&Candidate> = lookup
        .values()
        .copied()
        .filter(|c| !alloc.used.contains(&c.player_key))
        .collect();
    for cand in &pool {
        alloc.traces.insert(
            cand.player_key.clone(),
            SelectionTrace {
                player_key: cand.player_key.clone(),
                team: None,
                role: None,
                stage: None,
                category: None,
                slot_score: None,
                attend_prob: cand.attend_prob,
                events_seen: cand.events_seen,
                selected: false,
                cutoff_reason: None,
            },
        );
    }

    for (team, role) in SLOT_ORDER {
        alloc.fill_slot(&pool, team, role, diagnostics)?;
    }
    alloc.verify()?;

    let Allocator {
        traces, mut out, ..
    } = alloc;
    out.trace = traces.into_values().collect();
    tracing::info!(
        assigned = out.assignments.len(),
        forced = out.assignments.iter().filter(|a| a.stage == SelectionStage::Forced).count(),
        overbooked = out.overbooked.len(),
        "allocation complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrefMode;

    fn cand(key: &str, attend: f64, team: Option<Team>, mode: PrefMode, events: u32) -> Candidate {
        Candidate {
            player_key: key.to_string(),
            display_name: key.to_string(),
            attend_prob: attend,
            start_prob: attend,
            sub_prob: attend,
            preference: Preference {
                team,
                mode,
                boost: Some(0.0),
            },
            events_seen: events,
            risk_penalty: 0.0,
        }
    }

    fn settings(
        caps: [u32; 4],
        min_attend: [Option<f64>; 4],
        min_b_starters: Option<u32>,
    ) -> AllocatorSettings {
        AllocatorSettings {
            capacity: SlotMap {
                a_start: caps[0],
                a_sub: caps[1],
                b_start: caps[2],
                b_sub: caps[3],
            },
            min_attend: SlotMap {
                a_start: min_attend[0],
                a_sub: min_attend[1],
                b_start: min_attend[2],
                b_sub: min_attend[3],
            },
            min_starters: PerTeam {
                a: None,
                b: min_b_starters,
            },
            start_no_data_cap: None,
            allow_unfilled: true,
        }
    }

    fn names(alloc: &Allocation, team: Team, role: Role) -> Vec<&str> {
        alloc
            .slot_members(team, role)
            .map(|a| a.player_key.as_str())
            .collect()
    }

    fn trace<'a>(alloc: &'a Allocation, key: &str) -> &'a SelectionTrace {
        alloc.trace.iter().find(|t| t.player_key == key).unwrap()
    }

    #[test]
    fn boost_defaults_when_team_matches() {
        let c = cand("x", 0.5, Some(Team::B), PrefMode::Soft, 3);
        assert_eq!(preference_boost(&c.preference, Team::A), 0.0);
        assert_eq!(preference_boost(&c.preference, Team::B), DEFAULT_PREF_BOOST);
        let mut boosted = c.clone();
        boosted.preference.boost = Some(0.2);
        assert!((slot_score(&boosted, Team::B) - 0.7).abs() < 1e-12);
        boosted.attend_prob = 0.95;
        assert_eq!(slot_score(&boosted, Team::B), 1.0);
    }

    #[test]
    fn b_starters_use_threshold_when_supply_is_high() {
        let pool = vec![
            cand("b_good_one", 0.9, Some(Team::B), PrefMode::Soft, 5),
            cand("b_good_two", 0.8, Some(Team::B), PrefMode::Soft, 5),
            cand("b_low", 0.4, Some(Team::B), PrefMode::Soft, 5),
        ];
        let s = settings([0, 0, 2, 0], [None, Some(0.0), Some(0.6), Some(0.0)], Some(2));
        let alloc = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap();
        assert_eq!(names(&alloc, Team::B, Role::Start), vec!["b_good_one", "b_good_two"]);
        assert!(
            alloc
                .assignments
                .iter()
                .all(|a| a.stage_label() == "B-start-main")
        );
        assert_eq!(trace(&alloc, "b_low").cutoff_reason, Some(CutoffReason::NoSlotsLeft));
    }

    #[test]
    fn b_starters_fill_with_fallbacks_when_needed() {
        let pool = vec![
            cand("b_anchor", 0.75, Some(Team::B), PrefMode::Soft, 5),
            cand("b_fallback_one", 0.3, Some(Team::B), PrefMode::Soft, 5),
            cand("b_fallback_two", 0.2, Some(Team::B), PrefMode::Soft, 5),
        ];
        let s = settings([0, 0, 3, 0], [None, Some(0.0), Some(0.6), Some(0.0)], Some(3));
        let alloc = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap();
        let starters = names(&alloc, Team::B, Role::Start);
        assert_eq!(starters.len(), 3);
        assert!(starters.contains(&"b_anchor"));
        let fallback: BTreeSet<&str> = alloc
            .assignments
            .iter()
            .filter(|a| a.stage_label() == "B-start-fallback")
            .map(|a| a.player_key.as_str())
            .collect();
        assert_eq!(fallback, BTreeSet::from(["b_fallback_one", "b_fallback_two"]));
    }

    #[test]
    fn fallback_prefers_fewer_events_on_ties() {
        let pool = vec![
            cand("veteran", 0.5, Some(Team::B), PrefMode::Soft, 10),
            cand("newbie", 0.5, Some(Team::B), PrefMode::Soft, 2),
        ];
        let s = settings([0, 0, 1, 0], [None, Some(0.8), Some(0.8), Some(0.8)], Some(1));
        let alloc = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap();
        assert_eq!(names(&alloc, Team::B, Role::Start), vec!["newbie"]);
        assert_eq!(trace(&alloc, "newbie").stage_label(), "B-start-fallback");
        let veteran = trace(&alloc, "veteran");
        assert_eq!(veteran.stage_label(), "B-start-fallback");
        assert!(matches!(
            veteran.cutoff_reason,
            Some(CutoffReason::MinimumReached | CutoffReason::NoSlotsLeft)
        ));
    }

    #[test]
    fn hard_match_beats_neutral_at_equal_score() {
        let pool = vec![
            cand("neutral", 0.65, None, PrefMode::None, 5),
            cand("hardy", 0.60, Some(Team::A), PrefMode::Hard, 5),
        ];
        let s = settings([1, 0, 0, 0], [None; 4], None);
        let alloc = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap();
        assert_eq!(names(&alloc, Team::A, Role::Start), vec!["hardy"]);
        assert_eq!(trace(&alloc, "neutral").category, Some(Category::Neutral));
    }

    #[test]
    fn team_specific_thresholds_and_cross_preferences() {
        let pool = vec![
            cand("a_low", 0.58, Some(Team::A), PrefMode::Soft, 5),
            cand("b_low", 0.58, Some(Team::B), PrefMode::Soft, 5),
        ];
        let s = settings([1, 0, 1, 0], [Some(0.7), None, Some(0.3), None], None);
        let alloc = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap();
        assert!(names(&alloc, Team::A, Role::Start).is_empty());
        assert_eq!(names(&alloc, Team::B, Role::Start), vec!["b_low"]);
        assert_eq!(trace(&alloc, "a_low").cutoff_reason, Some(CutoffReason::NoSlotsLeft));
    }

    #[test]
    fn forced_players_bypass_scoring() {
        let pool = vec![
            cand("committed", 0.05, None, PrefMode::None, 4),
            cand("solid", 0.9, None, PrefMode::None, 4),
        ];
        let forced = vec![ForcedAssignment {
            player_key: "committed".into(),
            team: Team::A,
            role: Role::Start,
        }];
        let s = settings([1, 1, 0, 0], [None, Some(0.5), None, None], None);
        let alloc = allocate(&pool, &forced, &s, &mut Diagnostics::new()).unwrap();
        assert_eq!(names(&alloc, Team::A, Role::Start), vec!["committed"]);
        assert_eq!(alloc.assignment_for("committed").unwrap().stage_label(), "forced");
        assert_eq!(names(&alloc, Team::A, Role::Sub), vec!["solid"]);
    }

    #[test]
    fn overbooked_and_duplicate_forced_are_reported() {
        let forced: Vec<ForcedAssignment> = ["x", "y", "x"]
            .iter()
            .map(|k| ForcedAssignment {
                player_key: k.to_string(),
                team: Team::B,
                role: Role::Sub,
            })
            .collect();
        let s = settings([0, 0, 0, 1], [None; 4], None);
        let mut diag = Diagnostics::new();
        let alloc = allocate(&[], &forced, &s, &mut diag).unwrap();
        assert_eq!(names(&alloc, Team::B, Role::Sub), vec!["x", "y"]);
        assert_eq!(alloc.overbooked.len(), 1);
        assert_eq!(alloc.invalid_forced[0].reason, InvalidForcedReason::Duplicate);
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn low_data_guard_caps_new_starters() {
        let pool = vec![
            cand("new1", 0.9, None, PrefMode::None, 0),
            cand("new2", 0.9, None, PrefMode::None, 0),
            cand("old", 0.5, None, PrefMode::None, 8),
        ];
        let mut s = settings([2, 1, 0, 0], [None; 4], None);
        s.start_no_data_cap = Some(1);
        let alloc = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap();
        assert_eq!(names(&alloc, Team::A, Role::Start), vec!["new1", "old"]);
        assert_eq!(names(&alloc, Team::A, Role::Sub), vec!["new2"]);
    }

    #[test]
    fn shortfall_is_fatal_when_unfilled_is_disallowed() {
        let pool = vec![cand("only", 0.9, None, PrefMode::None, 3)];
        let mut s = settings([1, 0, 2, 0], [None; 4], None);
        s.allow_unfilled = false;
        let err = allocate(&pool, &[], &s, &mut Diagnostics::new()).unwrap_err();
        assert_eq!(
            err,
            RosterError::CapacityShortfall {
                team: Team::B,
                role: Role::Start,
                missing: 2
            }
        );
    }

    #[test]
    fn default_settings_reject_a_thin_pool() {
        let pool: Vec<Candidate> = (0..3)
            .map(|i| cand(&format!("p{i}"), 0.9, None, PrefMode::None, 3))
            .collect();
        let settings = AllocatorSettings::default();
        assert!(!settings.allow_unfilled);
        let err = allocate(&pool, &[], &settings, &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err, RosterError::CapacityShortfall { .. }));
    }

    #[test]
    fn permitted_shortfall_is_reported_per_slot() {
        let pool = vec![
            cand("one", 0.9, None, PrefMode::None, 3),
            cand("two", 0.9, None, PrefMode::None, 3),
        ];
        let s = settings([2, 1, 0, 3], [None; 4], None);
        let mut diag = Diagnostics::new();
        let alloc = allocate(&pool, &[], &s, &mut diag).unwrap();
        assert_eq!(names(&alloc, Team::A, Role::Start).len(), 2);
        assert_eq!(alloc.fill.get(Team::B, Role::Sub).open(), 3);
        assert_eq!(
            diag.warnings(),
            &[
                Recovered::Unfilled {
                    team: Team::A,
                    role: Role::Sub,
                    missing: 1
                },
                Recovered::Unfilled {
                    team: Team::B,
                    role: Role::Sub,
                    missing: 3
                },
            ]
        );
    }

    #[test]
    fn full_slots_raise_no_unfilled_warning() {
        let pool = vec![
            cand("one", 0.9, None, PrefMode::None, 3),
            cand("two", 0.8, None, PrefMode::None, 3),
        ];
        let mut s = settings([1, 1, 0, 0], [None; 4], None);
        s.allow_unfilled = false;
        let mut diag = Diagnostics::new();
        let alloc = allocate(&pool, &[], &s, &mut diag).unwrap();
        assert_eq!(alloc.assignments.len(), 2);
        assert!(diag.is_empty());
    }
}
