use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv::StringRecord;

use crate::absences::AbsenceEntry;
use crate::canonical::AliasMap;
use crate::error::{Diagnostics, Recovered};
use crate::model::{AttendanceRecord, PrefMode, Preference, Role, Team};
use crate::pipeline::RunInputs;
use crate::responses::{EventResponse, ResponseStatus};
use crate::signups::{Commitment, SignupEntry};

/// File names that live next to event exports but are not events.
const NON_EVENT_SUFFIXES: [&str; 4] = ["alliance.csv", "aliases.csv", "absences.csv", "preferences.csv"];
const NON_EVENT_PREFIXES: [&str; 2] = ["event_signups", "event_responses"];

struct Table {
    source: String,
    columns: BTreeMap<String, usize>,
    rows: Vec<(u64, StringRecord)>,
}

impl Table {
    fn parse(raw: &str, source: &str) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(raw.as_bytes());
        let headers = reader
            .headers()
            .with_context(|| format!("read header of {source}"))?
            .clone();
        let mut columns = BTreeMap::new();
        for (idx, name) in headers.iter().enumerate() {
            let key = name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
            columns.entry(key).or_insert(idx);
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("read row of {source}"))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            rows.push((line, record));
        }
        Ok(Table {
            source: source.to_string(),
            columns,
            rows,
        })
    }

    fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.columns.get(&name.to_ascii_lowercase()).copied())
    }

    fn require(&self, name: &str) -> Result<usize> {
        match self.column(&[name]) {
            Some(idx) => Ok(idx),
            None => bail!("{} needs a '{name}' column", self.source),
        }
    }

    fn skip(&self, diagnostics: &mut Diagnostics, line: u64, reason: impl Into<String>) {
        diagnostics.push(Recovered::SkippedRow {
            source: self.source.clone(),
            line,
            reason: reason.into(),
        });
    }
}

fn field(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Truthy flags as they appear in exported sheets: `1`, `true`, `yes`, `x`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<f64>() {
        return Some(v > 0.0);
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "x" | "ja" => Some(true),
        "false" | "no" | "n" | "nein" | "" => Some(false),
        _ => None,
    }
}

/// `DS-YYYY-MM-DD-X` to the event date at midnight UTC and its team letter.
pub fn parse_event_id(event_id: &str) -> Option<(DateTime<Utc>, Option<Team>)> {
    let upper = event_id.trim().to_ascii_uppercase();
    let rest = upper.strip_prefix("DS-")?;
    let date = NaiveDate::parse_from_str(rest.get(..10)?, "%Y-%m-%d").ok()?;
    let team = rest.get(10..).and_then(|tail| Team::parse(tail.trim_start_matches('-')));
    Some((Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)), team))
}

/// Dates as `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    parse_date(raw).map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

fn parse_preference(record: &StringRecord, group: Option<usize>, mode: Option<usize>, boost: Option<usize>) -> Preference {
    Preference {
        team: Team::parse(field(record, group)),
        mode: PrefMode::parse(field(record, mode)),
        boost: field(record, boost)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
    }
}

fn is_event_table(table: &Table) -> bool {
    table.column(&["EventID"]).is_some()
        && table.column(&["PlayerName"]).is_some()
        && table.column(&["RoleAtRegistration"]).is_some()
}

pub fn parse_events(
    raw: &str,
    source: &str,
    aliases: &AliasMap,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<AttendanceRecord>> {
    let table = Table::parse(raw, source)?;
    events_from_table(&table, aliases, diagnostics)
}

fn events_from_table(
    table: &Table,
    aliases: &AliasMap,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<AttendanceRecord>> {
    let event_col = table.require("EventID")?;
    let name_col = table.require("PlayerName")?;
    let role_col = table.require("RoleAtRegistration")?;
    let attended_col = table.column(&["Teilgenommen", "Attended"]);

    let mut out = Vec::new();
    for (line, record) in &table.rows {
        let event_id = field(record, Some(event_col));
        let Some((event_at, _)) = parse_event_id(event_id) else {
            table.skip(diagnostics, *line, format!("unparseable EventID '{event_id}'"));
            continue;
        };
        let player_key = aliases.key_for(field(record, Some(name_col)));
        if player_key.is_empty() {
            table.skip(diagnostics, *line, "empty PlayerName");
            continue;
        }
        // Other registration roles are not slot assignments.
        let Some(role) = Role::parse(field(record, Some(role_col))) else {
            continue;
        };
        let attended = parse_flag(field(record, attended_col)).unwrap_or(false);
        out.push(AttendanceRecord {
            event_id: event_id.to_string(),
            player_key,
            role,
            attended,
            event_at,
        });
    }
    Ok(out)
}

/// Directories expand to the `*.csv` files inside them, sorted by name.
pub fn expand_event_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("list {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
                .collect();
            found.sort();
            out.extend(found);
        } else {
            out.push(path.clone());
        }
    }
    out.retain(|p| {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        !NON_EVENT_SUFFIXES.iter().any(|s| name.ends_with(s))
            && !NON_EVENT_PREFIXES.iter().any(|s| name.starts_with(s))
    });
    out.dedup();
    Ok(out)
}

/// Loads every event export; files without the event columns are skipped.
pub fn load_events(
    paths: &[PathBuf],
    aliases: &AliasMap,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<AttendanceRecord>> {
    let mut out = Vec::new();
    let mut used_files = 0;
    for path in expand_event_paths(paths)? {
        let raw = read_file(&path)?;
        let table = Table::parse(&raw, &path.display().to_string())?;
        if !is_event_table(&table) {
            tracing::info!("skipping {}: not an event export", path.display());
            continue;
        }
        out.extend(events_from_table(&table, aliases, diagnostics)?);
        used_files += 1;
    }
    if used_files == 0 {
        bail!("no usable event CSV files found");
    }
    tracing::info!(files = used_files, records = out.len(), "loaded event history");
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRow {
    pub player_key: String,
    pub display_name: String,
    pub in_alliance: bool,
    pub preference: Preference,
}

fn membership_column(table: &Table) -> Option<usize> {
    if let Some(idx) = table.column(&["InAlliance"]) {
        return Some(idx);
    }
    let legacy = table.column(&["Active"]);
    if legacy.is_some() {
        tracing::warn!("{}: legacy column 'Active' found, rename it to 'InAlliance'", table.source);
    }
    legacy
}

pub fn parse_members(raw: &str, source: &str, aliases: &AliasMap) -> Result<Vec<MemberRow>> {
    let table = Table::parse(raw, source)?;
    let name_col = table.require("PlayerName")?;
    let Some(member_col) = membership_column(&table) else {
        bail!("{source} needs an 'InAlliance' column (or legacy 'Active')");
    };
    let group = table.column(&["PrefGroup"]);
    let mode = table.column(&["PrefMode"]);
    let boost = table.column(&["PrefBoost"]);

    let mut out = Vec::new();
    for (_, record) in &table.rows {
        let display_name = field(record, Some(name_col));
        let player_key = aliases.key_for(display_name);
        if player_key.is_empty() {
            continue;
        }
        out.push(MemberRow {
            player_key,
            display_name: display_name.to_string(),
            in_alliance: parse_flag(field(record, Some(member_col))).unwrap_or(false),
            preference: parse_preference(record, group, mode, boost),
        });
    }
    Ok(out)
}

pub fn load_members(path: &Path, aliases: &AliasMap) -> Result<Vec<MemberRow>> {
    let rows = parse_members(&read_file(path)?, &path.display().to_string(), aliases)?;
    tracing::info!(members = rows.len(), "loaded members");
    Ok(rows)
}

/// Preference overrides keyed by player; the first row per player wins.
pub fn parse_preferences(raw: &str, source: &str, aliases: &AliasMap) -> Result<BTreeMap<String, Preference>> {
    let table = Table::parse(raw, source)?;
    let name_col = table.require("PlayerName")?;
    let group = Some(table.require("PrefGroup")?);
    let mode = table.column(&["PrefMode"]);
    let boost = table.column(&["PrefBoost"]);

    let mut out = BTreeMap::new();
    for (_, record) in &table.rows {
        let key = aliases.key_for(field(record, Some(name_col)));
        if key.is_empty() {
            continue;
        }
        out.entry(key)
            .or_insert_with(|| parse_preference(record, group, mode, boost));
    }
    Ok(out)
}

pub fn load_preferences(path: &Path, aliases: &AliasMap) -> Result<BTreeMap<String, Preference>> {
    parse_preferences(&read_file(path)?, &path.display().to_string(), aliases)
}

/// Reads `(from, to)` pairs from an alias sheet and resolves them.
pub fn parse_aliases(raw: &str, source: &str) -> Result<AliasMap> {
    let table = Table::parse(raw, source)?;
    let from_col = table.column(&["alias", "from_name", "from", "src", "playername", "aliasfrom", "alias_from"]);
    let to_col = ["canonical", "to_name", "to", "dst", "alias", "aliasto", "alias_to"]
        .iter()
        .filter_map(|name| table.column(&[name]))
        .find(|idx| Some(*idx) != from_col);
    let (Some(from_col), Some(to_col)) = (from_col, to_col) else {
        bail!("{source} needs (from_name,to_name) or (alias,canonical) columns");
    };
    let active_col = table.column(&["active", "enabled"]);

    let pairs = table
        .rows
        .iter()
        .filter(|(_, record)| {
            let raw = field(record, active_col);
            raw.parse::<f64>().map(|v| v != 0.0).unwrap_or(true)
        })
        .map(|(_, record)| {
            (
                field(record, Some(from_col)).to_string(),
                field(record, Some(to_col)).to_string(),
            )
        });
    AliasMap::from_pairs(pairs).with_context(|| format!("resolve aliases in {source}"))
}

pub fn load_aliases(path: &Path) -> Result<AliasMap> {
    let map = parse_aliases(&read_file(path)?, &path.display().to_string())?;
    tracing::info!(rules = map.len(), "loaded aliases");
    Ok(map)
}

/// Absence rows of current members only.
pub fn parse_absences(raw: &str, source: &str, aliases: &AliasMap) -> Result<Vec<AbsenceEntry>> {
    let table = Table::parse(raw, source)?;
    let name_col = table.require("PlayerName")?;
    let from_col = table.column(&["From"]);
    let to_col = table.column(&["To"]);
    let reason_col = table.column(&["Reason"]);
    let scope_col = table.column(&["Scope"]);
    let member_col = membership_column(&table);

    let mut out = Vec::new();
    for (_, record) in &table.rows {
        if member_col.is_some() && !parse_flag(field(record, member_col)).unwrap_or(false) {
            continue;
        }
        let display_name = field(record, Some(name_col));
        let player_key = aliases.key_for(display_name);
        if player_key.is_empty() {
            continue;
        }
        out.push(AbsenceEntry {
            player_key,
            display_name: display_name.to_string(),
            from: parse_date(field(record, from_col)),
            to: parse_date(field(record, to_col)),
            explicit_next_event: field(record, scope_col).eq_ignore_ascii_case("next_event"),
            reason: field(record, reason_col).to_string(),
        });
    }
    Ok(out)
}

pub fn load_absences(path: &Path, aliases: &AliasMap) -> Result<Vec<AbsenceEntry>> {
    parse_absences(&read_file(path)?, &path.display().to_string(), aliases)
}

pub fn parse_signups(raw: &str, source: &str, aliases: &AliasMap) -> Result<Vec<SignupEntry>> {
    let table = Table::parse(raw, source)?;
    let name_col = table.require("PlayerName")?;
    let group_col = table.column(&["Group"]);
    let role_col = table.column(&["Role"]);
    let commitment_col = table.column(&["Commitment"]);
    let source_col = table.column(&["Source"]);
    let note_col = table.column(&["Note"]);

    let mut out = Vec::new();
    for (_, record) in &table.rows {
        let display_name = field(record, Some(name_col));
        if display_name.is_empty() {
            continue;
        }
        let key = aliases.key_for(display_name);
        let origin = field(record, source_col);
        out.push(SignupEntry {
            player_key: (!key.is_empty()).then_some(key),
            display_name: display_name.to_string(),
            team: Team::parse(field(record, group_col)),
            role: Role::parse(field(record, role_col)),
            commitment: Commitment::parse(field(record, commitment_col)),
            source: if origin.is_empty() {
                "manual_event_signup".to_string()
            } else {
                origin.to_string()
            },
            note: field(record, note_col).to_string(),
        });
    }
    Ok(out)
}

pub fn load_signups(path: &Path, aliases: &AliasMap) -> Result<Vec<SignupEntry>> {
    let rows = parse_signups(&read_file(path)?, &path.display().to_string(), aliases)?;
    tracing::info!(
        signups = rows.len(),
        hard = rows.iter().filter(|s| s.commitment == Commitment::Hard).count(),
        "loaded event signups"
    );
    Ok(rows)
}

pub fn parse_responses(
    raw: &str,
    source: &str,
    aliases: &AliasMap,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<EventResponse>> {
    let table = Table::parse(raw, source)?;
    let name_col = table.require("PlayerName")?;
    let status_col = table.require("Status")?;
    let time_col = table.column(&["ResponseTime"]);
    let source_col = table.column(&["Source"]);
    let note_col = table.column(&["Note"]);

    let mut out = Vec::new();
    for (line, record) in &table.rows {
        let display_name = field(record, Some(name_col));
        let player_key = aliases.key_for(display_name);
        if player_key.is_empty() {
            continue;
        }
        let raw_status = field(record, Some(status_col));
        let Some(status) = ResponseStatus::parse(raw_status) else {
            table.skip(diagnostics, *line, format!("unknown status '{raw_status}'"));
            continue;
        };
        let origin = field(record, source_col);
        out.push(EventResponse {
            player_key,
            display_name: display_name.to_string(),
            status,
            response_time: parse_timestamp(field(record, time_col)),
            source: if origin.is_empty() {
                "manual".to_string()
            } else {
                origin.to_string()
            },
            note: field(record, note_col).to_string(),
        });
    }
    Ok(out)
}

pub fn load_responses(
    path: &Path,
    aliases: &AliasMap,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<EventResponse>> {
    parse_responses(&read_file(path)?, &path.display().to_string(), aliases, diagnostics)
}

/// File locations for one run. Optional sheets are skipped when `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputPaths {
    pub events: Vec<PathBuf>,
    pub members: PathBuf,
    pub aliases: Option<PathBuf>,
    pub preferences: Option<PathBuf>,
    pub absences: Option<PathBuf>,
    pub signups: Option<PathBuf>,
    pub responses: Option<PathBuf>,
}

/// Loads every sheet, resolving names through the alias sheet first.
pub fn load_inputs(paths: &InputPaths, diagnostics: &mut Diagnostics) -> Result<RunInputs> {
    let aliases = match &paths.aliases {
        Some(path) => load_aliases(path)?,
        None => AliasMap::default(),
    };
    let records = load_events(&paths.events, &aliases, diagnostics)?;
    let members = load_members(&paths.members, &aliases)?;
    let preferences = match &paths.preferences {
        Some(path) => load_preferences(path, &aliases)?,
        None => BTreeMap::new(),
    };
    let absences = match &paths.absences {
        Some(path) => load_absences(path, &aliases)?,
        None => Vec::new(),
    };
    let signups = match &paths.signups {
        Some(path) => load_signups(path, &aliases)?,
        None => Vec::new(),
    };
    let responses = match &paths.responses {
        Some(path) => load_responses(path, &aliases, diagnostics)?,
        None => Vec::new(),
    };
    Ok(RunInputs {
        records,
        members,
        preferences,
        absences,
        signups,
        responses,
    })
}
