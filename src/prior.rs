use serde::Serialize;

/// Winsorizing needs at least this many samples to be meaningful.
pub const WINSOR_MIN_SAMPLES: usize = 10;
const WINSOR_LOW_Q: f64 = 0.05;
const WINSOR_HIGH_Q: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorSource {
    Mean,
    WinsorizedMean,
    Fallback,
}

/// Population-level no-show rate every player is shrunk toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamPrior {
    pub p0: f64,
    pub samples: usize,
    pub source: PriorSource,
}

impl TeamPrior {
    /// Reporting-only variant with a safety margin added.
    pub fn padded(&self, pad: f64) -> f64 {
        (self.p0 + pad).clamp(0.0, 1.0)
    }
}

/// Linear interpolation between closest ranks on an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn compute_team_prior(rates: &[f64], winsorize: bool, fallback: f64) -> TeamPrior {
    let fallback = if fallback.is_finite() {
        fallback.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut values: Vec<f64> = rates
        .iter()
        .copied()
        .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
        .collect();
    let samples = values.len();
    let fallback_prior = TeamPrior {
        p0: fallback,
        samples,
        source: PriorSource::Fallback,
    };
    if values.is_empty() {
        return fallback_prior;
    }

    let (mean, source) = if winsorize {
        if samples < WINSOR_MIN_SAMPLES {
            return fallback_prior;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let (Some(lo), Some(hi)) = (
            quantile(&values, WINSOR_LOW_Q),
            quantile(&values, WINSOR_HIGH_Q),
        ) else {
            return fallback_prior;
        };
        let sum: f64 = values.iter().map(|v| v.clamp(lo, hi)).sum();
        (sum / samples as f64, PriorSource::WinsorizedMean)
    } else {
        (values.iter().sum::<f64>() / samples as f64, PriorSource::Mean)
    };

    TeamPrior {
        p0: mean.clamp(0.0, 1.0),
        samples,
        source,
    }
}
