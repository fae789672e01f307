use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_yaml::Value;

use crate::error::{Diagnostics, Recovered};
use crate::model::{PerTeam, Role, SlotMap, Team};

pub const ENV_PREFIX: &str = "ROSTER_";
pub const DEFAULT_CONFIG_PATH: &str = "data/roster.yml";

const STARTERS_PER_TEAM: u32 = 20;
const SUBS_PER_TEAM: u32 = 10;

/// Top-level YAML blocks whose keys are read without a prefix.
const NAMESPACE_BLOCKS: [&str; 2] = ["roster", "attendance"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetBand {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CallupThresholds {
    pub min_events: u32,
    pub low_n_max_events: u32,
    pub high_overall: f64,
    pub high_rolling: f64,
    pub rolling_uptick_min: f64,
    pub rolling_uptick_delta: f64,
}

impl Default for CallupThresholds {
    fn default() -> Self {
        Self {
            min_events: 3,
            low_n_max_events: 2,
            high_overall: 0.40,
            high_rolling: 0.50,
            rolling_uptick_min: 0.25,
            rolling_uptick_delta: 0.10,
        }
    }
}

/// Every tunable of a run. Built once and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterConfig {
    pub half_life_days: f64,
    pub reliability_start_date: Option<NaiveDate>,
    pub eb_enable: bool,
    pub eb_n0: f64,
    pub eb_lambda: f64,
    pub winsorize: bool,
    pub prior_fallback: f64,
    pub prior_pad: f64,
    pub no_response_multiplier: f64,
    pub hard_commit_floor: f64,
    /// `None` disables the low-data start guard.
    pub start_no_data_cap: Option<u32>,
    pub capacity: SlotMap<u32>,
    /// Minimum `attend_prob` per slot; `None` fills the slot to capacity.
    pub min_attend: SlotMap<Option<f64>>,
    pub min_b_starters: u32,
    pub allow_unfilled: bool,
    /// Restricts the pool to players listed on the signup sheet.
    pub callups_only_mode: bool,
    pub attendance_targets: PerTeam<TargetBand>,
    pub callup: CallupThresholds,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            half_life_days: 90.0,
            reliability_start_date: None,
            eb_enable: true,
            eb_n0: 4.0,
            eb_lambda: 0.2,
            winsorize: true,
            prior_fallback: 0.18,
            prior_pad: 0.02,
            no_response_multiplier: 0.65,
            hard_commit_floor: 0.92,
            start_no_data_cap: Some(2),
            capacity: SlotMap::from_fn(|_, role| match role {
                Role::Start => STARTERS_PER_TEAM,
                Role::Sub => SUBS_PER_TEAM,
            }),
            min_attend: SlotMap::from_fn(|team, role| match (team, role) {
                (Team::A, Role::Start) => None,
                (Team::B, Role::Start) => Some(0.55),
                (_, Role::Sub) => Some(0.45),
            }),
            min_b_starters: 15,
            allow_unfilled: false,
            callups_only_mode: false,
            attendance_targets: PerTeam::from_fn(|_| TargetBand {
                low: 24.0,
                high: 28.0,
            }),
            callup: CallupThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    File,
    Env,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigReport {
    pub path: Option<String>,
    pub loaded_from_file: bool,
    pub defaults_applied: Vec<String>,
    pub overrides: BTreeMap<String, ConfigSource>,
    pub unknown_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: RosterConfig,
    pub report: ConfigReport,
    pub diagnostics: Diagnostics,
}

/// Reads the YAML file (when present) and applies `ROSTER_*` environment
/// overrides on top.
pub fn load(path: Option<&Path>) -> Result<LoadedConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let raw = if path.exists() {
        Some(
            fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?,
        )
    } else {
        tracing::info!("config {} not found, using defaults", path.display());
        None
    };
    let mut loaded = resolve(raw.as_deref(), |key| {
        std::env::var(key).ok().filter(|val| !val.trim().is_empty())
    })
    .with_context(|| format!("parse config {}", path.display()))?;
    loaded.report.path = Some(path.display().to_string());
    Ok(loaded)
}

/// Pure resolution: defaults, then YAML values, then environment values.
pub fn resolve(yaml: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<LoadedConfig> {
    let mut file_values = BTreeMap::new();
    let loaded_from_file = yaml.is_some();
    if let Some(raw) = yaml {
        let doc: Value = serde_yaml::from_str(raw).context("invalid YAML")?;
        if let Value::Mapping(map) = doc {
            flatten_into(&mut file_values, "", &map, true);
        }
    }

    let mut resolver = Resolver {
        file_values,
        env: &env,
        report: ConfigReport {
            loaded_from_file,
            ..ConfigReport::default()
        },
        diagnostics: Diagnostics::new(),
    };

    let defaults = RosterConfig::default();
    let callup_defaults = defaults.callup;

    let half_life_days = resolver.f64("half_life_days", defaults.half_life_days, -1.0, 10_000.0);
    let reliability_start_date = resolver.date("reliability_start_date");
    let eb_enable = resolver.bool("eb_enable", defaults.eb_enable);
    let eb_n0 = resolver.f64("eb_n0", defaults.eb_n0, 0.0, 1_000.0);
    let eb_lambda = resolver.f64("eb_lambda", defaults.eb_lambda, 0.0, 10.0);
    let winsorize = resolver.bool("winsorize", defaults.winsorize);
    let prior_fallback = resolver.f64("prior_fallback", defaults.prior_fallback, 0.0, 1.0);
    let prior_pad = resolver.f64("prior_pad", defaults.prior_pad, 0.0, 1.0);
    let no_response_multiplier =
        resolver.f64("no_response_multiplier", defaults.no_response_multiplier, 0.0, 1.0);
    let hard_commit_floor = resolver.f64("hard_commit_floor", defaults.hard_commit_floor, 0.0, 1.0);
    let start_no_data_cap = {
        let raw = resolver.int("start_no_data_cap", 2, -1, 1_000);
        u32::try_from(raw).ok()
    };
    let starters = resolver.int("starters_per_team", STARTERS_PER_TEAM as i64, 0, 200) as u32;
    let subs = resolver.int("subs_per_team", SUBS_PER_TEAM as i64, 0, 200) as u32;
    let min_start_a = resolver.opt_f64("min_start_a", *defaults.min_attend.get(Team::A, Role::Start));
    let min_start_b = resolver.opt_f64("min_start_b", *defaults.min_attend.get(Team::B, Role::Start));
    let min_bench_a = resolver.opt_f64("min_bench_a", *defaults.min_attend.get(Team::A, Role::Sub));
    let min_bench_b = resolver.opt_f64("min_bench_b", *defaults.min_attend.get(Team::B, Role::Sub));
    let min_b_starters = resolver.int("min_b_starters", defaults.min_b_starters as i64, 0, 200) as u32;
    let allow_unfilled = resolver.bool("allow_unfilled", defaults.allow_unfilled);
    let callups_only_mode = resolver.bool("callups_only_mode", defaults.callups_only_mode);
    let attendance_targets = PerTeam::from_fn(|team| {
        let suffix = team.label().to_ascii_lowercase();
        let base = defaults.attendance_targets.get(team);
        let low = resolver.f64(&format!("target_expected_{suffix}_low"), base.low, 0.0, 1_000.0);
        let high = resolver.f64(&format!("target_expected_{suffix}_high"), base.high, 0.0, 1_000.0);
        TargetBand {
            low: low.min(high),
            high: high.max(low),
        }
    });
    let callup = CallupThresholds {
        min_events: resolver.int("callup_min_events", callup_defaults.min_events as i64, 0, 1_000) as u32,
        low_n_max_events: resolver.int(
            "callup_low_n_max_events",
            callup_defaults.low_n_max_events as i64,
            0,
            1_000,
        ) as u32,
        high_overall: resolver.f64("callup_high_overall_threshold", callup_defaults.high_overall, 0.0, 1.0),
        high_rolling: resolver.f64("callup_high_rolling_threshold", callup_defaults.high_rolling, 0.0, 1.0),
        rolling_uptick_min: resolver.f64(
            "callup_rolling_uptick_min",
            callup_defaults.rolling_uptick_min,
            0.0,
            1.0,
        ),
        rolling_uptick_delta: resolver.f64(
            "callup_rolling_uptick_delta",
            callup_defaults.rolling_uptick_delta,
            0.0,
            1.0,
        ),
    };

    let config = RosterConfig {
        half_life_days,
        reliability_start_date,
        eb_enable,
        eb_n0,
        eb_lambda,
        winsorize,
        prior_fallback,
        prior_pad,
        no_response_multiplier,
        hard_commit_floor,
        start_no_data_cap,
        capacity: SlotMap::from_fn(|_, role| match role {
            Role::Start => starters,
            Role::Sub => subs,
        }),
        min_attend: SlotMap::from_fn(|team, role| match (team, role) {
            (Team::A, Role::Start) => min_start_a,
            (Team::B, Role::Start) => min_start_b,
            (Team::A, Role::Sub) => min_bench_a,
            (Team::B, Role::Sub) => min_bench_b,
        }),
        min_b_starters,
        allow_unfilled,
        callups_only_mode,
        attendance_targets,
        callup,
    };

    let Resolver {
        file_values,
        mut report,
        diagnostics,
        ..
    } = resolver;
    report.unknown_keys = file_values.into_keys().collect();
    if !report.unknown_keys.is_empty() {
        tracing::info!("ignoring unknown config keys: {}", report.unknown_keys.join(", "));
    }

    Ok(LoadedConfig {
        config,
        report,
        diagnostics,
    })
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: &str, map: &serde_yaml::Mapping, top: bool) {
    for (key, value) in map {
        let Some(key) = key_text(key) else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if let Value::Mapping(inner) = value {
            if top && NAMESPACE_BLOCKS.contains(&key.as_str()) {
                flatten_into(out, "", inner, false);
            } else {
                flatten_into(out, &join_key(prefix, &key), inner, false);
            }
            continue;
        }
        out.insert(join_key(prefix, &key), value.clone());
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}_{key}")
    }
}

fn key_text(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

enum Raw {
    Yaml(Value),
    Text(String),
}

impl Raw {
    fn text(&self) -> String {
        match self {
            Raw::Text(s) => s.trim().to_string(),
            Raw::Yaml(Value::String(s)) => s.trim().to_string(),
            Raw::Yaml(Value::Number(n)) => n.to_string(),
            Raw::Yaml(Value::Bool(b)) => b.to_string(),
            Raw::Yaml(Value::Null) => String::new(),
            Raw::Yaml(other) => serde_yaml::to_string(other)
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Raw::Yaml(Value::Null) => true,
            _ => matches!(
                self.text().to_ascii_lowercase().as_str(),
                "" | "none" | "null" | "off"
            ),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Raw::Yaml(Value::Number(n)) => n.as_f64(),
            _ => self.text().parse::<f64>().ok(),
        }?;
        v.is_finite().then_some(v)
    }

    fn as_bool(&self) -> Option<bool> {
        if let Raw::Yaml(Value::Bool(b)) = self {
            return Some(*b);
        }
        match self.text().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" | "y" => Some(true),
            "0" | "false" | "no" | "off" | "n" => Some(false),
            _ => None,
        }
    }
}

struct Resolver<'a, F: Fn(&str) -> Option<String>> {
    file_values: BTreeMap<String, Value>,
    env: &'a F,
    report: ConfigReport,
    diagnostics: Diagnostics,
}

impl<F: Fn(&str) -> Option<String>> Resolver<'_, F> {
    fn lookup(&mut self, key: &str) -> Option<Raw> {
        let file_value = self.file_values.remove(key);
        let env_key = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
        if let Some(val) = (self.env)(&env_key) {
            self.report.overrides.insert(key.to_string(), ConfigSource::Env);
            return Some(Raw::Text(val));
        }
        let value = file_value?;
        self.report.overrides.insert(key.to_string(), ConfigSource::File);
        Some(Raw::Yaml(value))
    }

    fn defaulted(&mut self, key: &str, raw: Option<&Raw>) {
        self.report.overrides.remove(key);
        self.report.defaults_applied.push(key.to_string());
        if let Some(raw) = raw {
            self.diagnostics.push(Recovered::ConfigDefaulted {
                key: key.to_string(),
                raw: raw.text(),
            });
        }
    }

    fn f64(&mut self, key: &str, default: f64, lo: f64, hi: f64) -> f64 {
        let Some(raw) = self.lookup(key) else {
            self.defaulted(key, None);
            return default;
        };
        match raw.as_f64() {
            Some(v) => v.clamp(lo, hi),
            None => {
                self.defaulted(key, Some(&raw));
                default
            }
        }
    }

    fn opt_f64(&mut self, key: &str, default: Option<f64>) -> Option<f64> {
        let Some(raw) = self.lookup(key) else {
            self.defaulted(key, None);
            return default;
        };
        if raw.is_null() {
            return None;
        }
        match raw.as_f64() {
            Some(v) => Some(v.clamp(0.0, 1.0)),
            None => {
                self.defaulted(key, Some(&raw));
                default
            }
        }
    }

    fn int(&mut self, key: &str, default: i64, lo: i64, hi: i64) -> i64 {
        let Some(raw) = self.lookup(key) else {
            self.defaulted(key, None);
            return default;
        };
        match raw.as_f64().filter(|v| v.fract() == 0.0) {
            Some(v) => (v as i64).clamp(lo, hi),
            None => {
                self.defaulted(key, Some(&raw));
                default
            }
        }
    }

    fn bool(&mut self, key: &str, default: bool) -> bool {
        let Some(raw) = self.lookup(key) else {
            self.defaulted(key, None);
            return default;
        };
        match raw.as_bool() {
            Some(v) => v,
            None => {
                self.defaulted(key, Some(&raw));
                default
            }
        }
    }

    fn date(&mut self, key: &str) -> Option<NaiveDate> {
        let Some(raw) = self.lookup(key) else {
            self.defaulted(key, None);
            return None;
        };
        if raw.is_null() {
            return None;
        }
        let text = raw.text();
        let day = text.get(..10).unwrap_or(&text);
        match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.defaulted(key, Some(&raw));
                None
            }
        }
    }
}
