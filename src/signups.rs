use std::collections::BTreeSet;

use serde::Serialize;

use crate::compose::Composition;
use crate::error::{Diagnostics, InvalidForcedReason, Recovered};
use crate::model::{ForcedAssignment, Role, SlotMap, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    None,
    Hard,
}

impl Commitment {
    /// Only `hard` binds; anything else is an overlay signup.
    pub fn parse(raw: &str) -> Commitment {
        if raw.trim().eq_ignore_ascii_case("hard") {
            Commitment::Hard
        } else {
            Commitment::None
        }
    }
}

/// One row of the next-event signup sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignupEntry {
    /// `None` when the name canonicalizes to nothing.
    pub player_key: Option<String>,
    pub display_name: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub commitment: Commitment,
    pub source: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForcedSignup {
    pub player_key: String,
    pub display_name: String,
    pub team: Team,
    pub role: Role,
    pub source: String,
    pub note: String,
    pub overbooked: bool,
}

impl ForcedSignup {
    pub fn assignment(&self) -> ForcedAssignment {
        ForcedAssignment {
            player_key: self.player_key.clone(),
            team: self.team,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidSignup {
    pub display_name: String,
    pub player_key: Option<String>,
    pub reason: InvalidForcedReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForcedResolution {
    pub forced: Vec<ForcedSignup>,
    pub invalid: Vec<InvalidSignup>,
}

impl ForcedResolution {
    pub fn assignments(&self) -> Vec<ForcedAssignment> {
        self.forced.iter().map(ForcedSignup::assignment).collect()
    }
}

/// Keys of every hard commitment, valid or not.
pub fn hard_committed(signups: &[SignupEntry]) -> BTreeSet<String> {
    signups
        .iter()
        .filter(|s| s.commitment == Commitment::Hard)
        .filter_map(|s| s.player_key.clone())
        .collect()
}

fn choose_team(remaining: &SlotMap<i64>, requested: Option<Team>, preferred: Option<Team>) -> Team {
    let mut desired: Vec<Team> = Vec::new();
    for team in [requested, preferred].into_iter().flatten() {
        if !desired.contains(&team) {
            desired.push(team);
        }
    }
    if desired.is_empty() {
        desired.extend(Team::ALL);
    }
    let open = |team: Team| remaining.get(team, Role::Start) + remaining.get(team, Role::Sub);
    let mut best = desired[0];
    for &team in &desired[1..] {
        if open(team) > open(best) {
            best = team;
        }
    }
    best
}

fn choose_role(remaining: &SlotMap<i64>, team: Team, requested: Option<Role>) -> Role {
    requested.unwrap_or_else(|| {
        if remaining.get(team, Role::Start) >= remaining.get(team, Role::Sub) {
            Role::Start
        } else {
            Role::Sub
        }
    })
}

/// Turns hard commitments into forced placements, rejecting entries for
/// unknown, duplicate, non-member, absent or filtered-out players.
pub fn resolve_forced(
    signups: &[SignupEntry],
    members: &BTreeSet<String>,
    absent: &BTreeSet<String>,
    pool: &Composition,
    capacity: &SlotMap<u32>,
    diagnostics: &mut Diagnostics,
) -> ForcedResolution {
    let mut remaining: SlotMap<i64> = SlotMap::from_fn(|team, role| *capacity.get(team, role) as i64);
    let mut seen = BTreeSet::new();
    let mut out = ForcedResolution::default();

    for entry in signups.iter().filter(|s| s.commitment == Commitment::Hard) {
        let verdict = match entry.player_key.as_deref() {
            None | Some("") => Err(InvalidForcedReason::UnknownPlayer),
            Some(key) if seen.contains(key) => Err(InvalidForcedReason::Duplicate),
            Some(key) if !members.contains(key) => Err(InvalidForcedReason::NotAMember),
            Some(key) if absent.contains(key) => Err(InvalidForcedReason::Absent),
            Some(key) => pool.candidate(key).ok_or(InvalidForcedReason::FilteredOut),
        };
        let candidate = match verdict {
            Ok(candidate) => candidate,
            Err(reason) => {
                diagnostics.push(Recovered::InvalidForced {
                    player: entry.display_name.clone(),
                    reason,
                });
                out.invalid.push(InvalidSignup {
                    display_name: entry.display_name.clone(),
                    player_key: entry.player_key.clone(),
                    reason,
                });
                continue;
            }
        };

        let team = choose_team(&remaining, entry.team, candidate.preference.team);
        let role = choose_role(&remaining, team, entry.role);
        let slot = remaining.get_mut(team, role);
        *slot -= 1;
        seen.insert(candidate.player_key.clone());
        out.forced.push(ForcedSignup {
            player_key: candidate.player_key.clone(),
            display_name: entry.display_name.clone(),
            team,
            role,
            source: entry.source.clone(),
            note: entry.note.clone(),
            overbooked: *slot < 0,
        });
    }

    tracing::info!(
        forced = out.forced.len(),
        invalid = out.invalid.len(),
        "resolved hard commitments"
    );
    out
}
