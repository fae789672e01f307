use std::path::PathBuf;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};

use crate::tables::{parse_date, parse_timestamp};

/// Process arguments without the program name.
pub fn args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Every value given for `name`, as `--name=v` or `--name v`.
pub fn values(args: &[String], name: &str) -> Vec<String> {
    let prefix = format!("{name}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix)
            && !v.trim().is_empty()
        {
            out.push(v.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            out.push(next.trim().to_string());
        }
    }
    out
}

pub fn value(args: &[String], name: &str) -> Option<String> {
    values(args, name).into_iter().next()
}

pub fn path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    value(args, name).map(PathBuf::from)
}

pub fn path_args(args: &[String], name: &str) -> Vec<PathBuf> {
    values(args, name).into_iter().map(PathBuf::from).collect()
}

pub fn f64_arg(args: &[String], name: &str) -> Option<f64> {
    value(args, name)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

pub fn u64_arg(args: &[String], name: &str) -> Option<u64> {
    value(args, name).and_then(|raw| raw.parse::<u64>().ok())
}

pub fn usize_arg(args: &[String], name: &str) -> Option<usize> {
    value(args, name).and_then(|raw| raw.parse::<usize>().ok())
}

pub fn flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

/// `--reference` as a timestamp or a date (midnight UTC).
pub fn reference_arg(args: &[String]) -> Option<DateTime<Utc>> {
    let raw = value(args, "--reference")?;
    if raw.len() == 10 {
        return parse_date(&raw).map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    }
    parse_timestamp(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn both_spellings_and_repeats() {
        let args = argv(&["--events", "a.csv", "--events=b.csv", "--xlsx", "--out", "dir"]);
        assert_eq!(path_args(&args, "--events"), vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(path_arg(&args, "--out"), Some(PathBuf::from("dir")));
        assert!(flag(&args, "--xlsx"));
        assert_eq!(value(&args, "--xlsx"), None);
    }

    #[test]
    fn numbers_and_reference() {
        let args = argv(&["--half-life-days=30", "--reference", "2025-06-01", "--seed", "7"]);
        assert_eq!(f64_arg(&args, "--half-life-days"), Some(30.0));
        assert_eq!(u64_arg(&args, "--seed"), Some(7));
        let reference = reference_arg(&args).unwrap();
        assert_eq!(reference, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(f64_arg(&argv(&["--half-life-days", "lots"]), "--half-life-days"), None);
    }
}
