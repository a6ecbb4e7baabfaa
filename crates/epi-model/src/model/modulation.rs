//! Weekly reporting modulation.
//!
//! Reported counts dip on weekends. The multiplier is either a smooth
//! `1 - f_w * (1 - |sin(pi/7 t + phi/2)|)` wave with a learned phase, or
//! a hard step on weekend days. The weekend factor is hierarchical across
//! countries. Disabled by default in run configuration; when enabled it
//! multiplies every observation channel.

use crate::error::Result;
use crate::params::{ModelParams, ModulationKind};
use crate::space::Draw;
use chrono::Datelike;
use ndarray::Array3;
use std::f64::consts::PI;

/// Saturday/Sunday as offsets from Monday.
const WEEKEND_DAYS: [u32; 2] = [5, 6];

/// Learned weekday effect shared by all observation channels.
#[derive(Debug, Clone)]
pub struct WeekdayEffect {
    kind: ModulationKind,
    /// Weekend suppression per country.
    factor: Vec<f64>,
    /// Phase offset per country, radians.
    offset: Vec<f64>,
    /// Weekday of the first observed day, Monday = 0.
    start_weekday: u32,
}

/// Read the modulation parameters once; the effect is applied per channel.
pub fn construct_weekday_effect(
    draw: &Draw<'_>,
    params: &ModelParams,
    kind: ModulationKind,
) -> Result<WeekdayEffect> {
    let c = params.num_countries();
    let priors = params.priors();

    let log_base = draw.scalar("weekend_factor_log")?;
    let z = draw.raw("weekend_factor_z")?;
    let offset = draw.raw("weekend_offset")?;

    let factor = (0..c)
        .map(|ci| (log_base + priors.weekend_factor_country_scale * z[ci]).exp())
        .collect();

    Ok(WeekdayEffect {
        kind,
        factor,
        offset: offset.to_vec(),
        start_weekday: params.begin().weekday().num_days_from_monday(),
    })
}

impl WeekdayEffect {
    /// Multiplier for day `t` of the observed window in country `ci`.
    pub fn multiplier(&self, t: usize, ci: usize) -> f64 {
        match self.kind {
            ModulationKind::AbsSine => {
                // Phase anchored so the minimum falls near the weekend.
                let days_from_sunday = (self.start_weekday + 1) % 7;
                let tt = (t as u32 + days_from_sunday) as f64;
                let wave = 1.0 - (PI / 7.0 * tt + self.offset[ci] / 2.0).sin().abs();
                (1.0 - self.factor[ci] * wave).abs()
            }
            ModulationKind::Step => {
                let weekday = (self.start_weekday + t as u32) % 7;
                if WEEKEND_DAYS.contains(&weekday) {
                    (1.0 - self.factor[ci]).abs()
                } else {
                    1.0
                }
            }
        }
    }

    /// Apply the effect to one channel, shape (time, country, age_group).
    pub fn apply(&self, cases: &Array3<f64>) -> Array3<f64> {
        let (t_max, c, a) = cases.dim();
        let mut out = cases.clone();
        for t in 0..t_max {
            for ci in 0..c {
                let m = self.multiplier(t, ci);
                for ai in 0..a {
                    out[[t, ci, ai]] *= m;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenewalModel;
    use crate::params::test_fixtures::small_params;
    use crate::space::Draw;
    use ndarray::Array3;

    fn effect(kind: ModulationKind) -> WeekdayEffect {
        let model = RenewalModel::with_modulation(small_params(14), kind);
        let q = vec![0.0; model.space().dim()];
        let draw = Draw::new(model.space(), &q).unwrap();
        construct_weekday_effect(&draw, model.params(), kind).unwrap()
    }

    #[test]
    fn step_suppresses_only_weekends() {
        let eff = effect(ModulationKind::Step);
        // Window starts on a Monday (2020-03-02).
        for t in 0..14usize {
            let m = eff.multiplier(t, 0);
            if t % 7 == 5 || t % 7 == 6 {
                assert!((m - 0.7).abs() < 1e-9, "t={t} m={m}");
            } else {
                assert!((m - 1.0).abs() < 1e-12, "t={t} m={m}");
            }
        }
    }

    #[test]
    fn abs_sine_dips_once_a_week() {
        let eff = effect(ModulationKind::AbsSine);
        let series: Vec<f64> = (0..14).map(|t| eff.multiplier(t, 0)).collect();
        assert!(series.iter().all(|&m| (0.0..=1.0).contains(&m)));
        let min = series.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = series.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(max > 0.95);
        assert!(min < 0.8, "min {min}");
        // Weekly periodicity.
        for t in 0..7 {
            assert!((series[t] - series[t + 7]).abs() < 1e-9);
        }
    }

    #[test]
    fn apply_scales_every_age_group_equally() {
        let eff = effect(ModulationKind::Step);
        let cases = Array3::from_elem((14, 2, 2), 100.0);
        let out = eff.apply(&cases);
        for t in 0..14usize {
            for ci in 0..2 {
                assert!((out[[t, ci, 0]] - out[[t, ci, 1]]).abs() < 1e-12);
            }
        }
        // Weekend days are reduced.
        assert!(out[[5, 0, 0]] < 100.0);
        assert!((out[[0, 0, 0]] - 100.0).abs() < 1e-12);
    }
}
