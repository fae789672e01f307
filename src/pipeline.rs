use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::absences::{AbsenceEntry, NextEvent, absent_for, infer_next_event};
use crate::aggregate::{Aggregation, aggregate};
use crate::allocator::{Allocation, AllocatorSettings, allocate};
use crate::attendance::{TeamOutlook, team_outlook};
use crate::callup::{CallupFlag, CallupSuggestion, recommend, suggestions};
use crate::canonical::{AliasSuggestion, alias_suggestions};
use crate::compose::{ComposeSettings, Composition, Overlay, PoolMember, compose};
use crate::config::RosterConfig;
use crate::error::{Diagnostics, RosterError};
use crate::model::{AttendanceRecord, PerTeam, Preference, Role, SelectionStage, Team};
use crate::prior::{TeamPrior, compute_team_prior};
use crate::responses::{EventResponse, ResponseSummary, summarize};
use crate::signups::{Commitment, ForcedResolution, SignupEntry, hard_committed, resolve_forced};
use crate::tables::MemberRow;

/// Everything a run reads, already normalized to canonical keys.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub records: Vec<AttendanceRecord>,
    pub members: Vec<MemberRow>,
    /// Overrides the preference columns of the member sheet.
    pub preferences: BTreeMap<String, Preference>,
    pub absences: Vec<AbsenceEntry>,
    pub signups: Vec<SignupEntry>,
    pub responses: Vec<EventResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub team: Team,
    pub role: Role,
    pub player_key: String,
    pub display_name: String,
    pub stage: String,
    pub attend_prob: f64,
    pub events_seen: u32,
    pub noshow_count: u32,
    pub noshow_overall: Option<f64>,
    pub noshow_rolling: Option<f64>,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub last_noshow_at: Option<DateTime<Utc>>,
    pub risk_penalty: f64,
    pub eb_p_hat: f64,
    pub eb_sigma: f64,
    pub callup: CallupFlag,
    pub hard_commit: bool,
    pub signup_source: Option<String>,
    pub signup_note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub reference: DateTime<Utc>,
    pub aggregation: Aggregation,
    pub prior: TeamPrior,
    pub next_event: NextEvent,
    pub absent: BTreeSet<String>,
    pub responses: ResponseSummary,
    pub pool_size: usize,
    pub composition: Composition,
    pub forced: ForcedResolution,
    pub allocation: Allocation,
    /// Ordered by team, role, display name.
    pub roster: Vec<RosterRow>,
    pub outlook: PerTeam<TeamOutlook>,
    pub suggestions: PerTeam<Vec<CallupSuggestion>>,
    pub alias_suggestions: Vec<AliasSuggestion>,
    /// Non-hard signups for players that did not make the roster.
    pub extra_signups: PerTeam<Vec<SignupEntry>>,
    pub diagnostics: Diagnostics,
}

fn observed_rates(aggregation: &Aggregation) -> Vec<f64> {
    aggregation
        .profiles
        .values()
        .filter_map(|p| p.combined.observed_noshow_rate())
        .collect()
}

/// Current members keyed once each; the first row per key wins.
fn current_members(inputs: &RunInputs) -> Vec<&MemberRow> {
    let mut seen = BTreeSet::new();
    inputs
        .members
        .iter()
        .filter(|m| m.in_alliance && seen.insert(m.player_key.as_str()))
        .collect()
}

/// Runs aggregation, scoring and allocation for the next event.
///
/// `reference` anchors decay ages; nothing here reads the wall clock.
pub fn run(inputs: &RunInputs, cfg: &RosterConfig, reference: DateTime<Utc>) -> Result<RunOutput, RosterError> {
    let mut diagnostics = Diagnostics::new();

    let aggregation = aggregate(
        &inputs.records,
        reference,
        cfg.half_life_days,
        cfg.reliability_start_date,
        &mut diagnostics,
    );
    let prior = compute_team_prior(&observed_rates(&aggregation), cfg.winsorize, cfg.prior_fallback);
    tracing::info!(
        p0 = prior.p0,
        samples = prior.samples,
        source = ?prior.source,
        "team prior"
    );

    let next_event = infer_next_event(&inputs.records, reference);
    let absent = absent_for(&inputs.absences, next_event.date);
    tracing::info!(date = %next_event.date, absent = absent.len(), "next event");

    let members = current_members(inputs);
    let member_keys: BTreeSet<String> = members.iter().map(|m| m.player_key.clone()).collect();
    let signed_up: BTreeSet<&str> = inputs
        .signups
        .iter()
        .filter_map(|s| s.player_key.as_deref())
        .collect();
    let pool: Vec<PoolMember> = members
        .iter()
        .filter(|m| !absent.contains(&m.player_key))
        .filter(|m| !cfg.callups_only_mode || signed_up.contains(m.player_key.as_str()))
        .map(|m| PoolMember {
            player_key: m.player_key.clone(),
            display_name: m.display_name.clone(),
            preference: inputs
                .preferences
                .get(&m.player_key)
                .copied()
                .unwrap_or(m.preference),
        })
        .collect();
    if cfg.callups_only_mode {
        tracing::info!(pool = pool.len(), "call-ups only: pool limited to signups");
    }

    let responses = summarize(&inputs.responses);
    let overlay = Overlay {
        declined: responses.declined.clone(),
        no_response: responses.no_response.clone(),
        hard_committed: hard_committed(&inputs.signups),
    };
    let composition = compose(
        &pool,
        &aggregation.profiles,
        &prior,
        &overlay,
        &ComposeSettings::from_config(cfg),
    );

    let forced = resolve_forced(
        &inputs.signups,
        &member_keys,
        &absent,
        &composition,
        &cfg.capacity,
        &mut diagnostics,
    );
    let allocation = allocate(
        &composition.candidates,
        &forced.assignments(),
        &AllocatorSettings::from_config(cfg),
        &mut diagnostics,
    )?;

    let roster = roster_rows(&allocation, &composition, &forced, cfg);
    let placed: Vec<(Team, Role, f64)> = roster.iter().map(|r| (r.team, r.role, r.attend_prob)).collect();
    let outlook = team_outlook(&placed, &cfg.capacity, &cfg.attendance_targets);

    let rostered: BTreeSet<&str> = roster.iter().map(|r| r.player_key.as_str()).collect();
    let floors = PerTeam::from_fn(|team| *cfg.min_attend.get(team, Role::Start));
    let suggestions = suggestions(&composition, &floors, |c| {
        let key = c.player_key.as_str();
        !rostered.contains(key) && !absent.contains(key) && !overlay.no_response.contains(key)
    });

    let history_keys: BTreeSet<String> = aggregation.profiles.keys().cloned().collect();
    let alias_suggestions = alias_suggestions(
        members
            .iter()
            .map(|m| (m.player_key.as_str(), m.display_name.as_str())),
        &history_keys,
    );

    let extra_signups = PerTeam::from_fn(|team| {
        inputs
            .signups
            .iter()
            .filter(|s| s.commitment == Commitment::None && s.team == Some(team))
            .filter(|s| s.player_key.as_deref().is_none_or(|k| !rostered.contains(k)))
            .cloned()
            .collect()
    });

    Ok(RunOutput {
        reference,
        prior,
        next_event,
        absent,
        responses,
        pool_size: pool.len(),
        aggregation,
        composition,
        forced,
        allocation,
        roster,
        outlook,
        suggestions,
        alias_suggestions,
        extra_signups,
        diagnostics,
    })
}

fn roster_rows(
    allocation: &Allocation,
    composition: &Composition,
    forced: &ForcedResolution,
    cfg: &RosterConfig,
) -> Vec<RosterRow> {
    let signups: BTreeMap<&str, _> = forced
        .forced
        .iter()
        .map(|f| (f.player_key.as_str(), f))
        .collect();
    let mut rows: Vec<RosterRow> = allocation
        .assignments
        .iter()
        .map(|a| {
            let score = composition.scores.get(&a.player_key);
            let signup = signups.get(a.player_key.as_str());
            let events_seen = score.map(|s| s.events_seen).unwrap_or(0);
            let noshow_overall = score.and_then(|s| s.noshow_overall);
            let noshow_rolling = score.and_then(|s| s.noshow_rolling);
            RosterRow {
                team: a.team,
                role: a.role,
                player_key: a.player_key.clone(),
                display_name: score
                    .map(|s| s.display_name.clone())
                    .unwrap_or_else(|| a.player_key.clone()),
                stage: a.stage_label(),
                attend_prob: score.map(|s| s.attend_prob).unwrap_or(0.0),
                events_seen,
                noshow_count: score.map(|s| s.noshow_count).unwrap_or(0),
                noshow_overall,
                noshow_rolling,
                last_shown_at: score.and_then(|s| s.last_shown_at),
                last_noshow_at: score.and_then(|s| s.last_noshow_at),
                risk_penalty: score.map(|s| s.risk_penalty).unwrap_or(0.0),
                eb_p_hat: score.map(|s| s.estimate.p_hat).unwrap_or(0.0),
                eb_sigma: score.map(|s| s.estimate.sigma).unwrap_or(0.0),
                callup: recommend(events_seen, noshow_overall, noshow_rolling, &cfg.callup),
                hard_commit: a.stage == SelectionStage::Forced,
                signup_source: signup.map(|s| s.source.clone()),
                signup_note: signup.map(|s| s.note.clone()).filter(|n| !n.is_empty()),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.team
            .cmp(&b.team)
            .then(a.role.cmp(&b.role))
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.player_key.cmp(&b.player_key))
    });
    rows
}

/// Share of rostered players in each team with no recorded history.
pub fn low_data_share(rows: &[RosterRow]) -> PerTeam<f64> {
    PerTeam::from_fn(|team| {
        let team_rows: Vec<&RosterRow> = rows.iter().filter(|r| r.team == team).collect();
        if team_rows.is_empty() {
            return 0.0;
        }
        team_rows.iter().filter(|r| r.events_seen == 0).count() as f64 / team_rows.len() as f64
    })
}
