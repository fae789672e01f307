use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use ds_roster::cli;
use ds_roster::logging;
use ds_roster::report::write_atomic;
use ds_roster::synth::{SynthParams, generate};

fn main() -> Result<()> {
    logging::init();
    let args = cli::args();
    let defaults = SynthParams::default();
    let params = SynthParams {
        players: cli::usize_arg(&args, "--players").unwrap_or(defaults.players).max(1),
        weeks: cli::usize_arg(&args, "--weeks").unwrap_or(defaults.weeks).max(1),
        seed: cli::u64_arg(&args, "--seed").unwrap_or(defaults.seed),
        first_event: cli::reference_arg(&args)
            .map(|ts| ts.date_naive())
            .unwrap_or(defaults.first_event),
    };
    let out_dir = cli::path_arg(&args, "--out").unwrap_or_else(|| PathBuf::from("data/synthetic"));
    fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let history = generate(&params);
    let events_path = out_dir.join("events.csv");
    let members_path = out_dir.join("alliance.csv");
    write_atomic(&events_path, &history.events_csv()?)?;
    write_atomic(&members_path, &history.members_csv()?)?;

    println!(
        "synthetic history written: {} ({} rows), {} ({} players)",
        events_path.display(),
        history.rows.len(),
        members_path.display(),
        history.players.len()
    );
    Ok(())
}
