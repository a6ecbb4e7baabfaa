//! Convergence diagnostics: split R-hat, bulk/tail ESS, MCSE, HDI.
//!
//! Definitions follow Vehtari, Gelman, Simpson, Carpenter & Bürkner
//! (2021), "Rank-normalization, folding, and localization: an improved
//! R-hat for assessing convergence of MCMC".

use std::cmp::Ordering;

/// Per-parameter convergence summary.
#[derive(Debug, Clone)]
pub struct ParamSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub hdi_3: f64,
    pub hdi_97: f64,
    pub ess_bulk: f64,
    pub ess_tail: f64,
    pub r_hat: f64,
    pub mcse_mean: f64,
}

/// Summary of a full sampling run.
#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    pub params: Vec<ParamSummary>,
    pub chains: usize,
    pub draws: usize,
    pub divergences: usize,
}

impl DiagnosticsReport {
    /// Render as a fixed-width table with warning footers.
    pub fn to_table(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("{} chains x {} draws", self.chains, self.draws));
        lines.push(String::new());
        lines.push(format!(
            "{:<28} {:>9} {:>9} {:>10} {:>10} {:>9} {:>9} {:>7} {:>10}",
            "parameter", "mean", "sd", "hdi_3%", "hdi_97%", "ess_bulk", "ess_tail", "r_hat", "mcse"
        ));
        lines.push("-".repeat(108));
        for p in &self.params {
            lines.push(format!(
                "{:<28} {:>9.4} {:>9.4} {:>10.4} {:>10.4} {:>9.0} {:>9.0} {:>7.3} {:>10.5}",
                p.name, p.mean, p.sd, p.hdi_3, p.hdi_97, p.ess_bulk, p.ess_tail, p.r_hat,
                p.mcse_mean
            ));
        }
        lines.push("-".repeat(108));

        if self
            .params
            .iter()
            .any(|p| p.r_hat > 1.05 || !p.r_hat.is_finite())
        {
            lines.push("warning: some r_hat > 1.05 - chains may not have converged".into());
        }
        if self
            .params
            .iter()
            .any(|p| p.ess_bulk < 400.0 || p.ess_tail < 400.0)
        {
            lines.push("warning: some ess < 400 - consider more draws".into());
        }
        if self.divergences > 0 {
            lines.push(format!(
                "warning: {} divergent transitions - results may be biased",
                self.divergences
            ));
        }
        lines.join("\n")
    }
}

/// Compute diagnostics for a set of named scalar traces.
///
/// Each entry is `(name, chains)` where `chains[chain][draw]` is the
/// per-draw value of one scalar quantity.
pub fn summarize(traces: &[(String, Vec<Vec<f64>>)], divergences: usize) -> DiagnosticsReport {
    let chains = traces.first().map(|(_, c)| c.len()).unwrap_or(0);
    let draws = traces
        .first()
        .and_then(|(_, c)| c.first().map(|d| d.len()))
        .unwrap_or(0);

    let params = traces
        .iter()
        .map(|(name, chain_draws)| single_param(name, chain_draws))
        .collect();

    DiagnosticsReport {
        params,
        chains,
        draws,
        divergences,
    }
}

fn single_param(name: &str, chains: &[Vec<f64>]) -> ParamSummary {
    let mut pooled: Vec<f64> = chains.iter().flatten().copied().collect();
    let mean = mean(&pooled);
    let sd = if pooled.len() > 1 {
        (pooled
            .iter()
            .map(|&x| (x - mean) * (x - mean))
            .sum::<f64>()
            / (pooled.len() - 1) as f64)
            .sqrt()
    } else {
        f64::NAN
    };

    pooled.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let hdi_3 = quantile_sorted(&pooled, 0.03);
    let hdi_97 = quantile_sorted(&pooled, 0.97);

    let ess_bulk = ess_of(&rank_normalize(chains));
    let ess_tail = tail_ess(chains, &pooled);
    let r_hat = split_r_hat(chains);
    let mcse_mean = if ess_bulk > 0.0 {
        sd / ess_bulk.sqrt()
    } else {
        f64::NAN
    };

    ParamSummary {
        name: name.to_string(),
        mean,
        sd,
        hdi_3,
        hdi_97,
        ess_bulk,
        ess_tail,
        r_hat,
        mcse_mean,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Halve every chain so within-chain trends register as between-chain
/// disagreement.
fn split_halves(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut out = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let mid = chain.len() / 2;
        out.push(chain[..mid].to_vec());
        out.push(chain[mid..].to_vec());
    }
    out
}

/// Split R-hat.
fn split_r_hat(chains: &[Vec<f64>]) -> f64 {
    let split = split_halves(chains);
    let m = split.len() as f64;
    let n = split.iter().map(|c| c.len()).min().unwrap_or(0);
    if n < 2 || m < 2.0 {
        return f64::NAN;
    }
    let n_f = n as f64;

    let chain_means: Vec<f64> = split.iter().map(|c| mean(c)).collect();
    let grand = mean(&chain_means);

    let between = n_f / (m - 1.0)
        * chain_means
            .iter()
            .map(|&cm| (cm - grand) * (cm - grand))
            .sum::<f64>();
    let within = split
        .iter()
        .map(|c| {
            let cm = mean(c);
            c.iter().map(|&x| (x - cm) * (x - cm)).sum::<f64>() / (c.len() as f64 - 1.0)
        })
        .sum::<f64>()
        / m;

    if within < 1e-30 {
        return f64::NAN;
    }
    let pooled_var = (n_f - 1.0) / n_f * within + between / n_f;
    (pooled_var / within).sqrt()
}

/// Effective sample size from split chains via Geyer's initial positive
/// sequence of autocorrelations.
fn ess_of(chains: &[Vec<f64>]) -> f64 {
    let split = split_halves(chains);
    let m = split.len();
    let n = split.iter().map(|c| c.len()).min().unwrap_or(0);
    if n < 4 || m == 0 {
        return f64::NAN;
    }
    let m_f = m as f64;
    let n_f = n as f64;

    let chain_means: Vec<f64> = split.iter().map(|c| mean(c)).collect();
    let within = split
        .iter()
        .map(|c| {
            let cm = mean(c);
            c.iter().map(|&x| (x - cm) * (x - cm)).sum::<f64>() / (c.len() as f64 - 1.0)
        })
        .sum::<f64>()
        / m_f;
    if within < 1e-30 {
        return f64::NAN;
    }

    let mut rho = Vec::with_capacity(n);
    for lag in 0..n {
        let mut acov = 0.0f64;
        for (ci, chain) in split.iter().enumerate() {
            let cm = chain_means[ci];
            for t in 0..(n - lag) {
                acov += (chain[t] - cm) * (chain[t + lag] - cm);
            }
        }
        acov /= m_f * (n_f - 1.0);
        rho.push(1.0 - (within - acov) / within);
    }

    let mut tau = -1.0f64;
    let mut lag = 1;
    while lag + 1 < rho.len() {
        let pair = rho[lag] + rho[lag + 1];
        if pair < 0.0 {
            break;
        }
        tau += pair;
        lag += 2;
    }
    tau = tau.max(1.0 / (m_f * n_f));

    m_f * n_f / (1.0 + 2.0 * tau)
}

/// Replace draws by their pooled normal scores (average ranks for ties).
fn rank_normalize(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n_chains = chains.len();
    let total: usize = chains.iter().map(|c| c.len()).sum();
    if total == 0 {
        return vec![Vec::new(); n_chains];
    }

    let mut indexed: Vec<(f64, usize, usize)> = Vec::with_capacity(total);
    for (ci, chain) in chains.iter().enumerate() {
        for (di, &v) in chain.iter().enumerate() {
            indexed.push((v, ci, di));
        }
    }
    indexed.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0f64; total];
    let mut i = 0;
    while i < total {
        let mut j = i;
        while j < total && indexed[j].0 == indexed[i].0 {
            j += 1;
        }
        let avg = (i + j + 1) as f64 / 2.0;
        for r in ranks.iter_mut().take(j).skip(i) {
            *r = avg;
        }
        i = j;
    }

    let n_f = total as f64;
    let mut out: Vec<Vec<f64>> = chains.iter().map(|c| vec![0.0; c.len()]).collect();
    for (k, &(_, ci, di)) in indexed.iter().enumerate() {
        let p = (ranks[k] - 0.375) / (n_f + 0.25);
        out[ci][di] = inv_normal_cdf(p);
    }
    out
}

/// Tail ESS: minimum ESS of the 5%/95% exceedance indicators.
fn tail_ess(chains: &[Vec<f64>], pooled_sorted: &[f64]) -> f64 {
    let q05 = quantile_sorted(pooled_sorted, 0.05);
    let q95 = quantile_sorted(pooled_sorted, 0.95);

    let low: Vec<Vec<f64>> = chains
        .iter()
        .map(|c| c.iter().map(|&x| f64::from(u8::from(x <= q05))).collect())
        .collect();
    let high: Vec<Vec<f64>> = chains
        .iter()
        .map(|c| c.iter().map(|&x| f64::from(u8::from(x >= q95))).collect())
        .collect();

    ess_of(&low).min(ess_of(&high))
}

/// Beasley-Springer-Moro approximation to the standard normal quantile.
fn inv_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let t = if p < 0.5 {
        (-2.0 * p.ln()).sqrt()
    } else {
        (-2.0 * (1.0 - p).ln()).sqrt()
    };
    let num = 2.515_517 + t * (0.802_853 + t * 0.010_328);
    let den = 1.0 + t * (1.432_788 + t * (0.189_269 + t * 0.001_308));
    let v = t - num / den;
    if p < 0.5 {
        -v
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_chain(seed: u64, n: usize, offset: f64) -> Vec<f64> {
        // Deterministic pseudo-noise; not an RNG, just well-mixed values.
        let mut state = seed as f64 + 0.5;
        (0..n)
            .map(|_| {
                state = (state * 1.7 + 0.31).sin() * 3.0;
                state + offset
            })
            .collect()
    }

    #[test]
    fn r_hat_near_one_for_matching_chains() {
        let chains: Vec<Vec<f64>> = (0..4).map(|s| synthetic_chain(s, 1000, 0.0)).collect();
        let rh = split_r_hat(&chains);
        assert!(rh < 1.1, "r_hat {rh}");
    }

    #[test]
    fn r_hat_large_for_separated_chains() {
        let a = synthetic_chain(1, 500, 0.0);
        let b = synthetic_chain(2, 500, 50.0);
        let rh = split_r_hat(&[a, b]);
        assert!(rh > 1.5, "r_hat {rh}");
    }

    #[test]
    fn ess_is_positive_and_bounded() {
        let chains: Vec<Vec<f64>> = (0..4).map(|s| synthetic_chain(s, 500, 0.0)).collect();
        let ess = ess_of(&rank_normalize(&chains));
        assert!(ess > 0.0);
        assert!(ess <= 4.0 * 500.0 * 1.5, "ess {ess}");
    }

    #[test]
    fn quantiles_interpolate() {
        let sorted = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 0.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 4.0);
        assert!((quantile_sorted(&sorted, 0.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn inv_normal_cdf_symmetry() {
        let a = inv_normal_cdf(0.025);
        let b = inv_normal_cdf(0.975);
        assert!((a + b).abs() < 1e-3);
        assert!((b - 1.96).abs() < 0.01, "got {b}");
    }

    #[test]
    fn summarize_shapes_report() {
        let chains: Vec<Vec<f64>> = (0..2).map(|s| synthetic_chain(s, 200, 0.0)).collect();
        let traces = vec![("theta".to_string(), chains)];
        let report = summarize(&traces, 3);
        assert_eq!(report.params.len(), 1);
        assert_eq!(report.chains, 2);
        assert_eq!(report.draws, 200);
        assert_eq!(report.divergences, 3);
        let table = report.to_table();
        assert!(table.contains("theta"));
        assert!(table.contains("divergent"));
    }
}
