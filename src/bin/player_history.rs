use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use ds_roster::aggregate::{aggregate, history_order};
use ds_roster::canonical::AliasMap;
use ds_roster::cli;
use ds_roster::config;
use ds_roster::error::Diagnostics;
use ds_roster::logging;
use ds_roster::prior::compute_team_prior;
use ds_roster::reliability::eb_rate;
use ds_roster::report::fmt_prob;
use ds_roster::tables::{load_aliases, load_events};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let args = cli::args();
    let cfg = config::load(cli::path_arg(&args, "--config").as_deref())?.config;
    let half_life = cli::f64_arg(&args, "--half-life-days").unwrap_or(cfg.half_life_days);
    let limit = cli::usize_arg(&args, "--limit").unwrap_or(usize::MAX);

    let aliases = match cli::path_arg(&args, "--aliases") {
        Some(path) => load_aliases(&path)?,
        None => AliasMap::default(),
    };
    let mut events = cli::path_args(&args, "--events");
    if events.is_empty() {
        events.push(PathBuf::from("data"));
    }
    let mut diagnostics = Diagnostics::new();
    let records = load_events(&events, &aliases, &mut diagnostics)?;
    let reference = cli::reference_arg(&args).unwrap_or_else(Utc::now);
    let agg = aggregate(
        &records,
        reference,
        half_life,
        cfg.reliability_start_date,
        &mut diagnostics,
    );

    let rates: Vec<f64> = agg
        .profiles
        .values()
        .filter_map(|p| p.combined.observed_noshow_rate())
        .collect();
    let prior = compute_team_prior(&rates, cfg.winsorize, cfg.prior_fallback);
    println!(
        "prior p0={} ({:?}, {} players), half-life {half_life} days, {} records, {} dropped events",
        fmt_prob(prior.p0),
        prior.source,
        prior.samples,
        agg.records_used,
        agg.dropped_events.len(),
    );
    println!(
        "{:<28} {:>5} {:>5} {:>8} {:>8} {:>8} {:>8}",
        "player", "n", "miss", "rate", "rolling", "eb_p", "eb_sd"
    );
    for profile in history_order(&agg.profiles).into_iter().take(limit) {
        let c = &profile.combined;
        let est = eb_rate(c.noshows() as f64, c.assignments as f64, prior.p0, cfg.eb_n0);
        println!(
            "{:<28} {:>5} {:>5} {:>8} {:>8} {:>8} {:>8}",
            profile.player_key,
            c.assignments,
            c.noshows(),
            fmt_prob(c.noshow_rate()),
            fmt_prob(c.weighted_noshow_rate()),
            fmt_prob(est.p_hat),
            fmt_prob(est.sigma),
        );
    }
    Ok(())
}
