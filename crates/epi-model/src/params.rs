//! Per-run model configuration.
//!
//! [`ModelParams`] is the immutable bundle the model graph is built from:
//! observed tensors, population counts, intervention change points, and
//! prior hyper-parameters. It is constructed once from a dataset and
//! validated there; the model itself assumes every invariant checked here.

use crate::error::{ModelError, Result};
use chrono::NaiveDate;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Lag window of the discretized generation-interval kernel, days.
pub const GEN_KERNEL_LEN: usize = 12;

/// Lag window of the test-reporting delay kernel, days.
pub const TEST_DELAY_LEN: usize = 14;

/// Lag window of the death-reporting delay kernel, days.
pub const DEATH_DELAY_LEN: usize = 42;

/// Clip range applied to the infection trajectory.
pub const NEW_E_CLIP: (f64, f64) = (1e-7, 1e9);

/// How an intervention switches on at its change point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePointKind {
    /// Hard switch on the change-point day.
    Step,
    /// Smooth sigmoid transition around the change point.
    Sigmoid,
}

/// Weekly reporting modulation variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulationKind {
    /// `1 - f_w * (1 - |sin(pi/7 t + phi/2)|)` per day.
    AbsSine,
    /// Weekend days multiplied by `1 - f_w`.
    Step,
}

/// One intervention with a per-country change-point day.
///
/// Days are offsets from the start of the observed window and may be
/// negative (the intervention predates the data). `None` means the
/// country never enacts this intervention.
#[derive(Debug, Clone, PartialEq)]
pub struct Intervention {
    pub name: String,
    pub kind: ChangePointKind,
    pub day: Vec<Option<f64>>,
}

/// Observed data, one tensor per reporting channel.
///
/// Shape `(time, country, age_group)`; NaN marks missing entries, which
/// the likelihood skips via a mask.
#[derive(Debug, Clone)]
pub struct ObservedData {
    pub positive: Array3<f64>,
    pub total: Array3<f64>,
    pub deaths: Array3<f64>,
}

/// Prior hyper-parameters.
///
/// Serde defaults make every field optional in run configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Median of the global R_0 prior.
    pub r0_loc: f64,
    /// Log-scale of the global R_0 prior.
    pub r0_scale: f64,
    /// Half-normal scale of the per-country R_0 spread.
    pub r0_hn_scale: f64,

    /// Mean of the intervention-effectiveness prior.
    pub alpha_loc: f64,
    pub alpha_scale: f64,
    /// Half-normal scale of the per-country effectiveness spread.
    pub alpha_hn_scale: f64,
    /// Scale of the change-point delay prior, days.
    pub cp_delay_scale: f64,
    /// Median of the transition-length prior, days.
    pub cp_length_loc: f64,
    pub cp_length_scale: f64,

    /// Median of the generation-interval mean, days.
    pub gen_mu_loc: f64,
    pub gen_mu_scale: f64,
    /// Log-scale of per-country generation-interval offsets.
    pub gen_mu_country_scale: f64,
    /// Median of the generation-interval dispersion.
    pub gen_theta_loc: f64,
    pub gen_theta_scale: f64,

    /// Location of the log initial-infections prior.
    pub i0_loc: f64,
    pub i0_scale: f64,

    /// LKJ concentration of the contact-matrix prior.
    pub contact_eta: f64,

    /// Prior mean of the detected fraction of infections.
    pub phi_plus_loc: f64,
    pub phi_plus_scale: f64,
    /// Median tests-per-positive factor.
    pub eta_test_loc: f64,
    pub eta_test_scale: f64,
    /// Median test-reporting delay, days.
    pub test_delay_loc: f64,
    pub test_delay_scale: f64,
    pub test_delay_theta_loc: f64,
    pub test_delay_theta_scale: f64,

    /// Log-scale of the per-country IFR spread around the age means.
    pub ifr_scale: f64,
    /// Median death-reporting delay, days.
    pub death_delay_loc: f64,
    pub death_delay_scale: f64,
    pub death_delay_theta_loc: f64,
    pub death_delay_theta_scale: f64,

    /// Median weekend suppression factor.
    pub weekend_factor_loc: f64,
    pub weekend_factor_scale: f64,
    /// Log-scale of per-country weekend-factor offsets.
    pub weekend_factor_country_scale: f64,
    /// Concentration of the weekday phase prior.
    pub weekend_offset_kappa: f64,

    /// Half-Cauchy scale of the likelihood scales.
    pub sigma_scale: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            r0_loc: 2.0,
            r0_scale: 0.5,
            r0_hn_scale: 0.3,

            alpha_loc: 0.05,
            alpha_scale: 0.2,
            alpha_hn_scale: 0.2,
            cp_delay_scale: 3.5,
            cp_length_loc: 4.0,
            cp_length_scale: 0.5,

            gen_mu_loc: 4.0,
            gen_mu_scale: 0.3,
            gen_mu_country_scale: 0.1,
            gen_theta_loc: 1.0,
            gen_theta_scale: 0.3,

            i0_loc: 0.0,
            i0_scale: 3.0,

            contact_eta: 4.0,

            phi_plus_loc: 0.1,
            phi_plus_scale: 1.0,
            eta_test_loc: 10.0,
            eta_test_scale: 0.5,
            test_delay_loc: 4.0,
            test_delay_scale: 0.3,
            test_delay_theta_loc: 2.0,
            test_delay_theta_scale: 0.3,

            ifr_scale: 0.3,
            death_delay_loc: 21.0,
            death_delay_scale: 0.2,
            death_delay_theta_loc: 5.0,
            death_delay_theta_scale: 0.2,

            weekend_factor_loc: 0.3,
            weekend_factor_scale: 0.5,
            weekend_factor_country_scale: 0.2,
            weekend_offset_kappa: 1.0,

            sigma_scale: 50.0,
        }
    }
}

/// Default per-age infection fatality ratios: a steep age ramp from
/// roughly 0.01% in the youngest group to a few percent in the oldest.
pub fn default_ifr_means(num_age_groups: usize) -> Vec<f64> {
    if num_age_groups == 1 {
        return vec![0.005];
    }
    let low: f64 = 1e-4;
    let high: f64 = 0.05;
    let ratio = (high / low).powf(1.0 / (num_age_groups as f64 - 1.0));
    (0..num_age_groups)
        .map(|a| low * ratio.powi(a as i32))
        .collect()
}

/// Immutable per-run configuration consumed by the model graph.
#[derive(Debug, Clone)]
pub struct ModelParams {
    countries: Vec<String>,
    age_groups: Vec<String>,
    begin: NaiveDate,
    observed: ObservedData,
    population: Array2<f64>,
    ifr_means: Vec<f64>,
    interventions: Vec<Intervention>,
    priors: PriorConfig,
}

impl ModelParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        countries: Vec<String>,
        age_groups: Vec<String>,
        begin: NaiveDate,
        observed: ObservedData,
        population: Array2<f64>,
        ifr_means: Vec<f64>,
        interventions: Vec<Intervention>,
        priors: PriorConfig,
    ) -> Result<Self> {
        let c = countries.len();
        let a = age_groups.len();
        if c == 0 || a == 0 {
            return Err(ModelError::Config(
                "need at least one country and one age group".into(),
            ));
        }

        let t = observed.positive.shape()[0];
        for (name, tensor) in [
            ("positive_tests", &observed.positive),
            ("total_tests", &observed.total),
            ("deaths", &observed.deaths),
        ] {
            let got = tensor.shape();
            if got != [t, c, a] {
                return Err(ModelError::shape(name, &[t, c, a], got));
            }
        }
        if t == 0 {
            return Err(ModelError::Config("observed window is empty".into()));
        }

        if population.shape() != [c, a] {
            return Err(ModelError::shape("population", &[c, a], population.shape()));
        }
        if population.iter().any(|&n| !(n > 0.0) || !n.is_finite()) {
            return Err(ModelError::Config(
                "population entries must be positive and finite".into(),
            ));
        }

        if ifr_means.len() != a {
            return Err(ModelError::shape("ifr_means", &[a], &[ifr_means.len()]));
        }
        if ifr_means.iter().any(|&x| !(x > 0.0 && x < 1.0)) {
            return Err(ModelError::Config("ifr_means must lie in (0, 1)".into()));
        }

        for intervention in &interventions {
            if intervention.day.len() != c {
                return Err(ModelError::shape(
                    format!("intervention '{}'", intervention.name),
                    &[c],
                    &[intervention.day.len()],
                ));
            }
        }

        Ok(Self {
            countries,
            age_groups,
            begin,
            observed,
            population,
            ifr_means,
            interventions,
            priors,
        })
    }

    pub fn num_countries(&self) -> usize {
        self.countries.len()
    }

    pub fn num_age_groups(&self) -> usize {
        self.age_groups.len()
    }

    pub fn num_days(&self) -> usize {
        self.observed.positive.shape()[0]
    }

    /// Length of the pre-data seed segment: the convolution window plus
    /// the prior-mean generation interval, so the renewal loop always
    /// has full history. Constant across draws by construction.
    pub fn seed_len(&self) -> usize {
        GEN_KERNEL_LEN + (self.priors.gen_mu_loc.round().max(1.0) as usize)
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn age_groups(&self) -> &[String] {
        &self.age_groups
    }

    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    pub fn observed(&self) -> &ObservedData {
        &self.observed
    }

    pub fn population(&self) -> &Array2<f64> {
        &self.population
    }

    pub fn ifr_means(&self) -> &[f64] {
        &self.ifr_means
    }

    pub fn interventions(&self) -> &[Intervention] {
        &self.interventions
    }

    pub fn priors(&self) -> &PriorConfig {
        &self.priors
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn blank_observed(t: usize, c: usize, a: usize) -> ObservedData {
        ObservedData {
            positive: Array3::zeros((t, c, a)),
            total: Array3::zeros((t, c, a)),
            deaths: Array3::zeros((t, c, a)),
        }
    }

    #[test]
    fn rejects_population_shape_mismatch() {
        let err = ModelParams::new(
            vec!["a".into()],
            vec!["g".into()],
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            blank_observed(5, 1, 1),
            Array2::from_elem((2, 1), 1e5),
            vec![0.01],
            vec![],
            PriorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Shape { .. }));
    }

    #[test]
    fn rejects_non_positive_population() {
        let err = ModelParams::new(
            vec!["a".into()],
            vec!["g".into()],
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            blank_observed(5, 1, 1),
            Array2::from_elem((1, 1), 0.0),
            vec![0.01],
            vec![],
            PriorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn rejects_intervention_with_wrong_country_count() {
        let err = ModelParams::new(
            vec!["a".into()],
            vec!["g".into()],
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            blank_observed(5, 1, 1),
            Array2::from_elem((1, 1), 1e5),
            vec![0.01],
            vec![Intervention {
                name: "x".into(),
                kind: ChangePointKind::Step,
                day: vec![Some(1.0), Some(2.0)],
            }],
            PriorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Shape { .. }));
    }

    #[test]
    fn seed_len_covers_convolution_window() {
        let params = test_fixtures::small_params(10);
        assert!(params.seed_len() > GEN_KERNEL_LEN);
        assert_eq!(params.seed_len(), GEN_KERNEL_LEN + 4);
    }

    #[test]
    fn ifr_defaults_ramp_with_age() {
        let ifr = default_ifr_means(4);
        assert_eq!(ifr.len(), 4);
        for w in ifr.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert!((ifr[0] - 1e-4).abs() < 1e-12);
        assert!((ifr[3] - 0.05).abs() < 1e-9);
    }
}
