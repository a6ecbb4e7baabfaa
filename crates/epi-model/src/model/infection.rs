//! The renewal-equation infection process.
//!
//! Sequential over days: infectiousness is the generation-interval
//! convolution of past infections, redistributed across age groups by the
//! contact matrix, scaled by R(t) and by the remaining susceptible
//! fraction. The generated window is clipped to [`NEW_E_CLIP`] afterwards
//! so downstream gradients never see infinities.

use crate::error::{ModelError, Result};
use crate::params::{GEN_KERNEL_LEN, NEW_E_CLIP};
use ndarray::{Array2, Array3};

/// Run the renewal process.
///
/// Returns the extended trajectory `(seed_len + time, country, age_group)`:
/// the seed segment followed by the generated window. Only the generated
/// part is clipped; the seed is positive by construction.
pub fn infection_model(
    r_t: &Array3<f64>,
    h0: &Array3<f64>,
    contact: &Array3<f64>,
    kernel: &Array2<f64>,
    population: &Array2<f64>,
) -> Result<Array3<f64>> {
    let (t_max, c, a) = r_t.dim();
    let (seed_len, h0_c, h0_a) = h0.dim();

    if h0_c != c || h0_a != a {
        return Err(ModelError::shape("h_0_t", &[seed_len, c, a], h0.shape()));
    }
    if contact.dim() != (c, a, a) {
        return Err(ModelError::shape("C", &[c, a, a], contact.shape()));
    }
    if kernel.dim() != (c, GEN_KERNEL_LEN) {
        return Err(ModelError::shape(
            "gen_kernel",
            &[c, GEN_KERNEL_LEN],
            kernel.shape(),
        ));
    }
    if population.dim() != (c, a) {
        return Err(ModelError::shape("N", &[c, a], population.shape()));
    }
    if seed_len < GEN_KERNEL_LEN + 1 {
        return Err(ModelError::Config(format!(
            "seed segment ({seed_len}) shorter than the convolution window"
        )));
    }

    let mut extended = Array3::zeros((seed_len + t_max, c, a));
    let mut cumulative = Array2::<f64>::zeros((c, a));
    for s in 0..seed_len {
        for ci in 0..c {
            for ai in 0..a {
                let v = h0[[s, ci, ai]];
                extended[[s, ci, ai]] = v;
                cumulative[[ci, ai]] += v;
            }
        }
    }

    let mut infectious = vec![0.0f64; a];
    let mut mixed = vec![0.0f64; a];

    for t in 0..t_max {
        let s = seed_len + t;
        for ci in 0..c {
            for ai in 0..a {
                let mut acc = 0.0;
                for tau in 0..GEN_KERNEL_LEN {
                    acc += kernel[[ci, tau]] * extended[[s - 1 - tau, ci, ai]];
                }
                infectious[ai] = acc;
            }
            for ai in 0..a {
                let mut acc = 0.0;
                for (bi, &f) in infectious.iter().enumerate() {
                    acc += contact[[ci, ai, bi]] * f;
                }
                mixed[ai] = acc;
            }
            for ai in 0..a {
                let n = population[[ci, ai]];
                let susceptible = (1.0 - cumulative[[ci, ai]] / n).clamp(0.0, 1.0);
                let new_e = r_t[[t, ci, ai]] * mixed[ai] * susceptible;
                extended[[s, ci, ai]] = new_e;
                cumulative[[ci, ai]] += new_e.max(0.0);
            }
        }
    }

    // Clip after the loop; NaN propagates through clamp so a broken draw
    // is rejected by the sampler instead of silently capped.
    for t in 0..t_max {
        let s = seed_len + t;
        for ci in 0..c {
            for ai in 0..a {
                extended[[s, ci, ai]] = extended[[s, ci, ai]].clamp(NEW_E_CLIP.0, NEW_E_CLIP.1);
            }
        }
    }

    Ok(extended)
}
