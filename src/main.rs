use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use ds_roster::cli;
use ds_roster::config;
use ds_roster::error::Diagnostics;
use ds_roster::export::export_workbook;
use ds_roster::logging;
use ds_roster::model::{Role, Team};
use ds_roster::pipeline;
use ds_roster::report::{ROSTER_XLSX, write_outputs};
use ds_roster::tables::{InputPaths, load_inputs};

const DATA_DIR: &str = "data";

fn existing(default: &str) -> Option<PathBuf> {
    let path = Path::new(DATA_DIR).join(default);
    path.exists().then_some(path)
}

fn optional_input(args: &[String], flag: &str, default: &str) -> Option<PathBuf> {
    cli::path_arg(args, flag).or_else(|| existing(default))
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let args = cli::args();
    let loaded = config::load(cli::path_arg(&args, "--config").as_deref())?;
    let mut cfg = loaded.config;
    if let Some(half_life) = cli::f64_arg(&args, "--half-life-days") {
        cfg.half_life_days = half_life;
    }

    let mut events = cli::path_args(&args, "--events");
    if events.is_empty() {
        events.push(PathBuf::from(DATA_DIR));
    }
    let paths = InputPaths {
        events,
        members: cli::path_arg(&args, "--alliance")
            .unwrap_or_else(|| Path::new(DATA_DIR).join("alliance.csv")),
        aliases: optional_input(&args, "--aliases", "aliases.csv"),
        preferences: optional_input(&args, "--preferences", "preferences.csv"),
        absences: optional_input(&args, "--absences", "absences.csv"),
        signups: optional_input(&args, "--event-signups", "event_signups_next.csv"),
        responses: optional_input(&args, "--event-responses", "event_responses_next.csv"),
    };

    let mut load_warnings = loaded.diagnostics;
    let mut table_warnings = Diagnostics::new();
    let inputs = load_inputs(&paths, &mut table_warnings)?;
    load_warnings.extend(table_warnings);

    let reference = cli::reference_arg(&args).unwrap_or_else(Utc::now);
    let output = pipeline::run(&inputs, &cfg, reference).context("roster allocation failed")?;

    let out_dir = cli::path_arg(&args, "--out").unwrap_or_else(|| PathBuf::from("out"));
    let files = write_outputs(&out_dir, &output, &cfg, &loaded.report, load_warnings.warnings())?;
    if cli::flag(&args, "--xlsx") {
        export_workbook(&out_dir.join(ROSTER_XLSX), &output)?;
    }

    println!("next event: {}", output.next_event.date);
    for team in Team::ALL {
        let fill = |role: Role| {
            let slot = output.allocation.fill.get(team, role);
            format!("{}/{}", slot.filled(), slot.capacity)
        };
        let outlook = output.outlook.get(team);
        println!(
            "team {team}: {} start / {} sub, expected attendance {:.1} (target {:.0}-{:.0})",
            fill(Role::Start),
            fill(Role::Sub),
            outlook.expected_total,
            outlook.target.low,
            outlook.target.high,
        );
    }
    let warnings = load_warnings.warnings().len() + output.diagnostics.warnings().len();
    if warnings > 0 {
        println!("{warnings} warnings, see {}", files.roster_json.display());
    }
    println!("roster written: {}", files.roster_csv.display());
    Ok(())
}
