use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::absences::NextEvent;
use crate::aggregate::history_order;
use crate::allocator::{InvalidForced, Overbooked, SlotFill};
use crate::attendance::TeamOutlook;
use crate::callup::{CallupFlag, CallupSuggestion, recommend};
use crate::canonical::AliasSuggestion;
use crate::compose::PlayerScore;
use crate::config::{ConfigReport, RosterConfig};
use crate::error::Recovered;
use crate::model::{PerTeam, Role, SlotMap, Team};
use crate::pipeline::{RosterRow, RunOutput, low_data_share};
use crate::prior::PriorSource;
use crate::signups::{ForcedSignup, InvalidSignup, SignupEntry};

pub const SCHEMA_VERSION: u32 = 1;

pub const ROSTER_CSV: &str = "roster.csv";
pub const ROSTER_JSON: &str = "roster.json";
pub const SELECTION_CSV: &str = "debug_selection.csv";
pub const ROSTER_XLSX: &str = "roster.xlsx";

const ROSTER_HEADER: [&str; 15] = [
    "PlayerName",
    "Canonical",
    "Group",
    "Role",
    "Stage",
    "AttendProb",
    "NoShowOverall",
    "NoShowRolling",
    "LastSeenDate",
    "LastNoShowDate",
    "EventsSeen",
    "NoShowCount",
    "RiskPenalty",
    "EbPHat",
    "EbSigma",
];

const SELECTION_HEADER: [&str; 10] = [
    "canonical_name",
    "selection_stage",
    "team",
    "role",
    "category",
    "slot_score",
    "attend_prob",
    "events_seen",
    "selected",
    "cutoff_reason",
];

const HISTORY_HEADER: [&str; 10] = [
    "Canonical",
    "Assignments",
    "Shows",
    "NoShows",
    "NoShowRate",
    "WeightedNoShowRate",
    "StartAssignments",
    "SubAssignments",
    "LastSeenDate",
    "LastNoShowDate",
];

/// Four decimals keep the files stable across platforms.
pub fn fmt_prob(value: f64) -> String {
    format!("{value:.4}")
}

fn fmt_opt_prob(value: Option<f64>) -> String {
    value.map(fmt_prob).unwrap_or_default()
}

fn fmt_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn with_header<const N: usize>(header: [&str; N], rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(header.iter().map(|h| h.to_string()).collect());
    out.extend(rows);
    out
}

/// Roster rows with a header, in output order.
pub fn roster_table(rows: &[RosterRow]) -> Vec<Vec<String>> {
    let body = rows
        .iter()
        .map(|r| {
            vec![
                r.display_name.clone(),
                r.player_key.clone(),
                r.team.label().to_string(),
                r.role.label().to_string(),
                r.stage.clone(),
                fmt_prob(r.attend_prob),
                fmt_opt_prob(r.noshow_overall),
                fmt_opt_prob(r.noshow_rolling),
                fmt_date(r.last_shown_at),
                fmt_date(r.last_noshow_at),
                r.events_seen.to_string(),
                r.noshow_count.to_string(),
                fmt_prob(r.risk_penalty),
                fmt_prob(r.eb_p_hat),
                fmt_prob(r.eb_sigma),
            ]
        })
        .collect();
    with_header(ROSTER_HEADER, body)
}

pub fn selection_table(output: &RunOutput) -> Vec<Vec<String>> {
    let body = output
        .allocation
        .trace
        .iter()
        .map(|t| {
            vec![
                t.player_key.clone(),
                t.stage_label(),
                t.team.map(|team| team.label().to_string()).unwrap_or_default(),
                t.role.map(|role| role.label().to_string()).unwrap_or_default(),
                t.category.map(|c| c.label().to_string()).unwrap_or_default(),
                fmt_opt_prob(t.slot_score),
                fmt_prob(t.attend_prob),
                t.events_seen.to_string(),
                t.selected.to_string(),
                t.cutoff_reason.map(|c| c.label()).unwrap_or_default(),
            ]
        })
        .collect();
    with_header(SELECTION_HEADER, body)
}

/// Per-player history, worst attendance first.
pub fn history_table(output: &RunOutput) -> Vec<Vec<String>> {
    let body = history_order(&output.aggregation.profiles)
        .into_iter()
        .map(|p| {
            let c = &p.combined;
            vec![
                p.player_key.clone(),
                c.assignments.to_string(),
                c.shows.to_string(),
                c.noshows().to_string(),
                fmt_prob(c.noshow_rate()),
                fmt_prob(c.weighted_noshow_rate()),
                p.start.assignments.to_string(),
                p.sub.assignments.to_string(),
                fmt_date(c.last_shown_at),
                fmt_date(c.last_noshow_at),
            ]
        })
        .collect();
    with_header(HISTORY_HEADER, body)
}

pub fn csv_bytes(table: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in table {
        writer.write_record(row).context("encode csv row")?;
    }
    writer.into_inner().context("flush csv buffer")
}

#[derive(Debug, Serialize)]
struct Schema {
    name: &'static str,
    version: u32,
}

#[derive(Debug, Serialize)]
struct PriorSection {
    p0: f64,
    p0_padded: f64,
    samples: usize,
    source: PriorSource,
}

#[derive(Debug, Serialize)]
struct TeamSection<'a> {
    start: Vec<&'a RosterRow>,
    sub: Vec<&'a RosterRow>,
}

#[derive(Debug, Serialize)]
struct SlotSection {
    capacity: u32,
    forced: u32,
    main: u32,
    fallback: u32,
    filled: u32,
    unfilled: u32,
}

impl From<&SlotFill> for SlotSection {
    fn from(fill: &SlotFill) -> Self {
        Self {
            capacity: fill.capacity,
            forced: fill.forced,
            main: fill.main,
            fallback: fill.fallback,
            filled: fill.filled(),
            unfilled: fill.open(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlayerEntry<'a> {
    #[serde(flatten)]
    score: &'a PlayerScore,
    rostered: bool,
    callup: CallupFlag,
}

#[derive(Debug, Serialize)]
struct HistorySection<'a> {
    records_used: usize,
    records_before_start: usize,
    players: usize,
    dropped_events: &'a [String],
}

#[derive(Debug, Serialize)]
struct AbsenceSection<'a> {
    count: usize,
    players: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ResponseSection<'a> {
    raw_rows: usize,
    declined: Vec<&'a str>,
    no_response: Vec<&'a str>,
    maybe: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct RosterReport<'a> {
    schema: Schema,
    reference: DateTime<Utc>,
    next_event: &'a NextEvent,
    prior: PriorSection,
    config: &'a RosterConfig,
    config_report: &'a ConfigReport,
    history: HistorySection<'a>,
    pool_size: usize,
    teams: PerTeam<TeamSection<'a>>,
    slots: SlotMap<SlotSection>,
    forced: &'a [ForcedSignup],
    invalid_forced: &'a [InvalidSignup],
    allocator_invalid_forced: &'a [InvalidForced],
    overbooked: &'a [Overbooked],
    extra_signups: &'a PerTeam<Vec<SignupEntry>>,
    players: Vec<PlayerEntry<'a>>,
    absences: AbsenceSection<'a>,
    responses: ResponseSection<'a>,
    attendance: &'a PerTeam<TeamOutlook>,
    low_data_share: PerTeam<f64>,
    callup_suggestions: &'a PerTeam<Vec<CallupSuggestion>>,
    alias_suggestions: &'a [AliasSuggestion],
    warnings: Vec<&'a Recovered>,
}

fn team_section(rows: &[RosterRow], team: Team) -> TeamSection<'_> {
    let pick = |role: Role| -> Vec<&RosterRow> {
        rows.iter()
            .filter(|r| r.team == team && r.role == role)
            .collect()
    };
    TeamSection {
        start: pick(Role::Start),
        sub: pick(Role::Sub),
    }
}

/// Pretty JSON with every map ordered by key.
pub fn json_report(
    output: &RunOutput,
    cfg: &RosterConfig,
    config_report: &ConfigReport,
    config_warnings: &[Recovered],
) -> Result<String> {
    let players = output
        .composition
        .scores
        .values()
        .map(|score| PlayerEntry {
            score,
            rostered: output.allocation.assignment_for(&score.player_key).is_some(),
            callup: recommend(
                score.events_seen,
                score.noshow_overall,
                score.noshow_rolling,
                &cfg.callup,
            ),
        })
        .collect();
    let report = RosterReport {
        schema: Schema {
            name: "ds_roster",
            version: SCHEMA_VERSION,
        },
        reference: output.reference,
        next_event: &output.next_event,
        prior: PriorSection {
            p0: output.prior.p0,
            p0_padded: output.prior.padded(cfg.prior_pad),
            samples: output.prior.samples,
            source: output.prior.source,
        },
        config: cfg,
        config_report,
        history: HistorySection {
            records_used: output.aggregation.records_used,
            records_before_start: output.aggregation.records_before_start,
            players: output.aggregation.profiles.len(),
            dropped_events: &output.aggregation.dropped_events,
        },
        pool_size: output.pool_size,
        teams: PerTeam::from_fn(|team| team_section(&output.roster, team)),
        slots: SlotMap::from_fn(|team, role| output.allocation.fill.get(team, role).into()),
        forced: &output.forced.forced,
        invalid_forced: &output.forced.invalid,
        allocator_invalid_forced: &output.allocation.invalid_forced,
        overbooked: &output.allocation.overbooked,
        extra_signups: &output.extra_signups,
        players,
        absences: AbsenceSection {
            count: output.absent.len(),
            players: output.absent.iter().map(String::as_str).collect(),
        },
        responses: ResponseSection {
            raw_rows: output.responses.raw_rows,
            declined: output.responses.declined.iter().map(String::as_str).collect(),
            no_response: output.responses.no_response.iter().map(String::as_str).collect(),
            maybe: output.responses.maybe.iter().map(String::as_str).collect(),
        },
        attendance: &output.outlook,
        low_data_share: low_data_share(&output.roster),
        callup_suggestions: &output.suggestions,
        alias_suggestions: &output.alias_suggestions,
        warnings: config_warnings
            .iter()
            .chain(output.diagnostics.warnings())
            .collect(),
    };
    serde_json::to_string_pretty(&report).context("serialize roster report")
}

/// Writes next to the target and renames, so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} to {}", tmp.display(), path.display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub roster_csv: PathBuf,
    pub roster_json: PathBuf,
    pub selection_csv: PathBuf,
}

/// Writes the roster CSV, the selection trace and the JSON report into `out_dir`.
pub fn write_outputs(
    out_dir: &Path,
    output: &RunOutput,
    cfg: &RosterConfig,
    config_report: &ConfigReport,
    config_warnings: &[Recovered],
) -> Result<WrittenFiles> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let files = WrittenFiles {
        roster_csv: out_dir.join(ROSTER_CSV),
        roster_json: out_dir.join(ROSTER_JSON),
        selection_csv: out_dir.join(SELECTION_CSV),
    };
    write_atomic(&files.roster_csv, &csv_bytes(&roster_table(&output.roster))?)?;
    write_atomic(&files.selection_csv, &csv_bytes(&selection_table(output))?)?;
    let json = json_report(output, cfg, config_report, config_warnings)?;
    write_atomic(&files.roster_json, json.as_bytes())?;
    tracing::info!(
        dir = %out_dir.display(),
        rostered = output.roster.len(),
        traced = output.allocation.trace.len(),
        "reports written"
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quotes_embedded_commas() {
        let table = vec![
            vec!["PlayerName".to_string(), "Note".to_string()],
            vec!["Smith, J".to_string(), "ok".to_string()],
        ];
        let bytes = csv_bytes(&table).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "PlayerName,Note\n\"Smith, J\",ok\n");
    }

    #[test]
    fn probabilities_use_four_decimals() {
        assert_eq!(fmt_prob(0.5), "0.5000");
        assert_eq!(fmt_opt_prob(None), "");
        assert_eq!(fmt_prob(1.0 / 3.0), "0.3333");
    }

    #[test]
    fn atomic_write_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("roster.csv.tmp").exists());
    }
}
