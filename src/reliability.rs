use serde::Serialize;

/// Shrunk no-show rate and its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReliabilityEstimate {
    pub p_hat: f64,
    pub sigma: f64,
}

impl ReliabilityEstimate {
    /// Penalty subtracted from attendance, proportional to the uncertainty.
    pub fn risk_penalty(&self, lambda: f64) -> f64 {
        (lambda.max(0.0) * self.sigma).max(0.0)
    }

    /// Upper-confidence no-show score.
    pub fn score(&self, lambda: f64) -> f64 {
        self.p_hat + lambda * self.sigma
    }
}

/// Beta-Binomial posterior of the no-show rate for `s` no-shows in `n`
/// assignments, with a prior of mean `p0` and strength `n0`.
pub fn eb_rate(s: f64, n: f64, p0: f64, n0: f64) -> ReliabilityEstimate {
    let p0 = if p0.is_finite() { p0.clamp(0.0, 1.0) } else { 0.0 };
    let n = if n.is_finite() { n.max(0.0) } else { 0.0 };
    let s = if s.is_finite() { s.clamp(0.0, n) } else { 0.0 };
    let n0 = if n0.is_finite() { n0.max(0.0) } else { 0.0 };

    let alpha = p0 * n0 + s;
    let beta = (1.0 - p0) * n0 + (n - s);
    let total = alpha + beta;
    if total <= 0.0 {
        return ReliabilityEstimate {
            p_hat: p0,
            sigma: 0.0,
        };
    }

    let p_hat = alpha / total;
    let variance = if total > 1.0 {
        (alpha * beta) / (total * total * (total + 1.0))
    } else {
        0.0
    };
    ReliabilityEstimate {
        p_hat,
        sigma: variance.max(0.0).sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_fixture() {
        let est = eb_rate(3.0, 5.0, 0.2, 4.0);
        assert!((est.p_hat - 0.4222).abs() < 1e-4);
        assert!((est.sigma - 0.1562).abs() < 1e-4);
    }

    #[test]
    fn no_data_returns_the_prior() {
        let est = eb_rate(0.0, 0.0, 0.3, 4.0);
        assert!((est.p_hat - 0.3).abs() < 1e-12);
        let empty = eb_rate(0.0, 0.0, 0.3, 0.0);
        assert_eq!(empty, ReliabilityEstimate { p_hat: 0.3, sigma: 0.0 });
    }

    #[test]
    fn inputs_are_clamped() {
        let est = eb_rate(9.0, 3.0, 1.7, -2.0);
        assert!((est.p_hat - 1.0).abs() < 1e-12);
        assert_eq!(est.sigma, 0.0);
    }

    #[test]
    fn more_data_pulls_away_from_prior() {
        let few = eb_rate(1.0, 2.0, 0.1, 4.0);
        let many = eb_rate(10.0, 20.0, 0.1, 4.0);
        assert!(many.p_hat > few.p_hat);
        assert!(many.sigma < few.sigma);
    }

    #[test]
    fn penalty_scales_with_sigma() {
        let est = eb_rate(3.0, 5.0, 0.2, 4.0);
        assert!((est.risk_penalty(0.2) - 0.2 * est.sigma).abs() < 1e-12);
        assert_eq!(est.risk_penalty(-1.0), 0.0);
        assert!(est.score(0.2) > est.p_hat);
    }
}
