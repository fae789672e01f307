use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use anyhow::{Context, Result};

use crate::canonical::canonicalize;
use crate::model::{AttendanceRecord, PrefMode, Preference, Role, SLOT_ORDER, Team};
use crate::pipeline::RunInputs;
use crate::report::csv_bytes;
use crate::tables::MemberRow;

const STARTERS: usize = 20;
const SUBS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthParams {
    pub players: usize,
    pub weeks: usize,
    pub seed: u64,
    pub first_event: NaiveDate,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            players: 80,
            weeks: 26,
            seed: 42,
            first_event: NaiveDate::from_ymd_opt(2025, 1, 4).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthPlayer {
    pub name: String,
    pub show_rate: f64,
    pub preference: Preference,
    pub in_alliance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthRow {
    pub event_id: String,
    pub slot: usize,
    pub player_name: String,
    pub role: Role,
    pub attended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthHistory {
    pub players: Vec<SynthPlayer>,
    pub rows: Vec<SynthRow>,
}

/// Weekly two-team events where each player shows up with a fixed hidden rate.
pub fn generate(params: &SynthParams) -> SynthHistory {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let players: Vec<SynthPlayer> = (0..params.players)
        .map(|i| {
            let team = match rng.gen_range(0..3) {
                0 => Some(Team::A),
                1 => Some(Team::B),
                _ => None,
            };
            let mode = if team.is_some() && rng.gen_bool(0.3) {
                PrefMode::Hard
            } else if team.is_some() {
                PrefMode::Soft
            } else {
                PrefMode::None
            };
            SynthPlayer {
                name: format!("Player {:03}", i + 1),
                show_rate: rng.gen_range(0.45..0.99),
                preference: Preference {
                    team,
                    mode,
                    boost: None,
                },
                in_alliance: rng.gen_bool(0.9),
            }
        })
        .collect();

    let mut rows = Vec::new();
    let mut order: Vec<usize> = (0..players.len()).collect();
    for week in 0..params.weeks {
        let date = params.first_event + Duration::days(7 * week as i64);
        order.shuffle(&mut rng);
        let mut picks = order.iter().copied();
        for (team, role) in SLOT_ORDER {
            let take = if role == Role::Start { STARTERS } else { SUBS };
            for slot in 0..take {
                let Some(idx) = picks.next() else {
                    break;
                };
                let player = &players[idx];
                rows.push(SynthRow {
                    event_id: format!("DS-{}-{}", date.format("%Y-%m-%d"), team.label()),
                    slot: slot + 1,
                    player_name: player.name.clone(),
                    role,
                    attended: rng.gen_bool(player.show_rate),
                });
            }
        }
    }
    SynthHistory { players, rows }
}

fn role_export_label(role: Role) -> &'static str {
    match role {
        Role::Start => "Start",
        Role::Sub => "Ersatz",
    }
}

impl SynthHistory {
    pub fn events_csv(&self) -> Result<Vec<u8>> {
        let mut table = vec![
            ["EventID", "Slot", "PlayerName", "RoleAtRegistration", "Teilgenommen"]
                .map(String::from)
                .to_vec(),
        ];
        for row in &self.rows {
            table.push(vec![
                row.event_id.clone(),
                row.slot.to_string(),
                row.player_name.clone(),
                role_export_label(row.role).to_string(),
                u8::from(row.attended).to_string(),
            ]);
        }
        csv_bytes(&table).context("encode synthetic events")
    }

    pub fn members_csv(&self) -> Result<Vec<u8>> {
        let mut table = vec![
            ["PlayerName", "InAlliance", "PrefGroup", "PrefMode"]
                .map(String::from)
                .to_vec(),
        ];
        for p in &self.players {
            table.push(vec![
                p.name.clone(),
                u8::from(p.in_alliance).to_string(),
                p.preference.team.map(|t| t.label().to_string()).unwrap_or_default(),
                p.preference.mode.label().to_string(),
            ]);
        }
        csv_bytes(&table).context("encode synthetic members")
    }

    /// The same history as typed records, skipping the CSV round trip.
    pub fn run_inputs(&self) -> RunInputs {
        let records = self
            .rows
            .iter()
            .filter_map(|row| {
                let day = NaiveDate::parse_from_str(row.event_id.get(3..13)?, "%Y-%m-%d").ok()?;
                Some(AttendanceRecord {
                    event_id: row.event_id.clone(),
                    player_key: canonicalize(&row.player_name),
                    role: row.role,
                    attended: row.attended,
                    event_at: Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)),
                })
            })
            .collect();
        let members = self
            .players
            .iter()
            .map(|p| MemberRow {
                player_key: canonicalize(&p.name),
                display_name: p.name.clone(),
                in_alliance: p.in_alliance,
                preference: p.preference,
            })
            .collect();
        RunInputs {
            records,
            members,
            ..RunInputs::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_history() {
        let params = SynthParams {
            players: 30,
            weeks: 3,
            ..SynthParams::default()
        };
        let a = generate(&params);
        let b = generate(&params);
        assert_eq!(a, b);
        assert_eq!(a.rows.len(), 3 * 30);
        assert_eq!(a.run_inputs().records.len(), a.rows.len());
    }

    #[test]
    fn csv_has_event_columns() {
        let history = generate(&SynthParams {
            players: 5,
            weeks: 1,
            ..SynthParams::default()
        });
        let text = String::from_utf8(history.events_csv().unwrap()).unwrap();
        assert!(text.starts_with("EventID,Slot,PlayerName,RoleAtRegistration,Teilgenommen\n"));
        assert!(text.contains("DS-2025-01-04-A"));
    }
}
