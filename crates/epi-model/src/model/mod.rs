//! The generative model graph.
//!
//! [`RenewalModel`] wires every sub-model into one pure density
//! evaluation: reproduction numbers, contact structure, generation
//! interval, seed infections, the renewal process, the observation
//! sub-models, and the masked Student-t likelihood. One evaluation per
//! draw; the trace records every named tensor the graph declares.

pub mod contact;
pub mod deaths;
pub mod generation;
pub mod infection;
pub mod likelihood;
pub mod modulation;
pub mod reproduction;
pub mod seed;
pub mod testing;

use crate::error::Result;
use crate::params::{ModelParams, ModulationKind, GEN_KERNEL_LEN};
use crate::space::{Draw, ParamSpace, Prior, Transform};
use crate::trace::ChainTrace;
use epi_math::{logit, CorrCholesky};
use epi_sampler::LogDensity;
use likelihood::LikelihoodScales;
use ndarray::{s, Array1, Array2, Array3, Dimension};
use rand::Rng;
use tracing::trace;

/// Every tensor of one model evaluation.
#[derive(Debug, Clone)]
pub struct ModelState {
    pub r0: Array2<f64>,
    pub r_t: Array3<f64>,
    pub contact: Array3<f64>,
    pub gen_kernel: Array2<f64>,
    pub gen_mean: Array1<f64>,
    pub h0: Array3<f64>,
    pub new_e: Array3<f64>,
    pub positive: Array3<f64>,
    pub total: Array3<f64>,
    pub deaths: Array3<f64>,
    pub scales: LikelihoodScales,
    pub log_prior: f64,
    pub log_likelihood: f64,
}

impl ModelState {
    /// Total log-density of the draw.
    pub fn lp(&self) -> f64 {
        self.log_prior + self.log_likelihood
    }

    /// Append every named tensor of this draw to a chain trace.
    pub fn record_into(&self, chain: &mut ChainTrace) -> Result<()> {
        record(chain, "R_0", &self.r0)?;
        record(chain, "R_t", &self.r_t)?;
        record(chain, "C", &self.contact)?;
        record(chain, "gen_kernel", &self.gen_kernel)?;
        record(chain, "g_mu", &self.gen_mean)?;
        record(chain, "h_0_t", &self.h0)?;
        record(chain, "new_E_t", &self.new_e)?;
        record(chain, "positive_tests", &self.positive)?;
        record(chain, "total_tests", &self.total)?;
        record(chain, "cases_delayed_deaths", &self.deaths)?;
        chain.record(
            "sigma_positive",
            &[self.scales.positive.len()],
            self.scales.positive.clone(),
        )?;
        chain.record(
            "sigma_total",
            &[self.scales.total.len()],
            self.scales.total.clone(),
        )?;
        chain.record(
            "sigma_deaths",
            &[self.scales.deaths.len()],
            self.scales.deaths.clone(),
        )?;
        chain.lp.push(self.lp());
        Ok(())
    }
}

fn record<D: Dimension>(
    chain: &mut ChainTrace,
    name: &str,
    tensor: &ndarray::Array<f64, D>,
) -> Result<()> {
    chain.record(name, tensor.shape(), tensor.iter().copied().collect())
}

/// The full model: parameters, layout, and configuration flags.
pub struct RenewalModel {
    params: ModelParams,
    space: ParamSpace,
    modulation: Option<ModulationKind>,
}

impl RenewalModel {
    /// Model without weekly modulation (the default configuration).
    pub fn new(params: ModelParams) -> Self {
        let space = build_space(&params, false);
        Self {
            params,
            space,
            modulation: None,
        }
    }

    /// Model with weekly reporting modulation on every channel.
    pub fn with_modulation(params: ModelParams, kind: ModulationKind) -> Self {
        let space = build_space(&params, true);
        Self {
            params,
            space,
            modulation: Some(kind),
        }
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn space(&self) -> &ParamSpace {
        &self.space
    }

    /// Draw an unconstrained parameter vector from the priors.
    pub fn sample_prior<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.space.sample_prior(rng)
    }

    /// Evaluate the full graph at one parameter vector.
    pub fn evaluate(&self, q: &[f64]) -> Result<ModelState> {
        let log_prior = self.space.log_prior(q)?;
        let draw = Draw::new(&self.space, q)?;
        let params = &self.params;

        let r0 = reproduction::construct_r0(&draw, params)?;
        trace!(shape = ?r0.shape(), "R_0");
        let r_t = reproduction::construct_r_t(&draw, params, &r0)?;
        trace!(shape = ?r_t.shape(), "R_t");

        let contact = contact::construct_contact(&draw, params)?;
        let gen = generation::construct_generation_interval(&draw, params)?;
        let h0 = seed::construct_h0(&draw, params, &gen, &r0)?;

        let extended =
            infection::infection_model(&r_t, &h0, &contact, &gen.kernel, params.population())?;
        let new_e = extended
            .slice(s![params.seed_len().., .., ..])
            .to_owned();
        trace!(shape = ?new_e.shape(), "new_E_t");

        let tests = testing::generate_testing(&draw, params, &extended)?;
        let phi_ifr = deaths::calc_phi_ifr(&draw, params)?;
        let delay = deaths::construct_reporting_delay(&draw, params)?;
        let delayed_deaths =
            deaths::calc_delayed_deaths(&phi_ifr, &delay, &extended, params.num_days());

        let (positive, total, delayed_deaths) = match self.modulation {
            Some(kind) => {
                let effect = modulation::construct_weekday_effect(&draw, params, kind)?;
                (
                    effect.apply(&tests.positive),
                    effect.apply(&tests.total),
                    effect.apply(&delayed_deaths),
                )
            }
            None => (tests.positive, tests.total, delayed_deaths),
        };

        let (log_likelihood, scales) =
            likelihood::student_t_likelihood(&draw, params, &positive, &total, &delayed_deaths)?;

        Ok(ModelState {
            r0,
            r_t,
            contact,
            gen_kernel: gen.kernel,
            gen_mean: Array1::from_vec(gen.mean),
            h0,
            new_e,
            positive,
            total,
            deaths: delayed_deaths,
            scales,
            log_prior,
            log_likelihood,
        })
    }
}

impl LogDensity for RenewalModel {
    fn dim(&self) -> usize {
        self.space.dim()
    }

    fn logp(&self, position: &[f64]) -> f64 {
        match self.evaluate(position) {
            Ok(state) => state.lp(),
            Err(err) => {
                trace!(%err, "rejecting draw");
                f64::NEG_INFINITY
            }
        }
    }
}

/// Register every random variable of the graph, in evaluation order.
fn build_space(params: &ModelParams, with_modulation: bool) -> ParamSpace {
    let c = params.num_countries();
    let a = params.num_age_groups();
    let n_interventions = params.interventions().len();
    let priors = params.priors();

    let mut builder = ParamSpace::builder()
        .block(
            "R_0_log",
            1,
            Transform::Identity,
            Prior::Normal {
                loc: priors.r0_loc.ln(),
                scale: priors.r0_scale,
            },
        )
        .block(
            "R_0_xi",
            c,
            Transform::Exp,
            Prior::HalfNormal {
                scale: priors.r0_hn_scale,
            },
        )
        .block("R_0_z", c * a, Transform::Identity, STD_NORMAL);

    if n_interventions > 0 {
        builder = builder
            .block(
                "alpha_mean",
                n_interventions,
                Transform::Identity,
                Prior::Normal {
                    loc: priors.alpha_loc,
                    scale: priors.alpha_scale,
                },
            )
            .block(
                "alpha_sigma",
                n_interventions,
                Transform::Exp,
                Prior::HalfNormal {
                    scale: priors.alpha_hn_scale,
                },
            )
            .block(
                "alpha_z",
                n_interventions * c,
                Transform::Identity,
                STD_NORMAL,
            )
            .block(
                "cp_delay",
                n_interventions,
                Transform::Identity,
                Prior::Normal {
                    loc: 0.0,
                    scale: priors.cp_delay_scale,
                },
            )
            .block(
                "cp_length",
                n_interventions,
                Transform::Exp,
                Prior::Normal {
                    loc: priors.cp_length_loc.ln(),
                    scale: priors.cp_length_scale,
                },
            );
    }

    builder = builder
        .block(
            "gen_mu_log",
            1,
            Transform::Identity,
            Prior::Normal {
                loc: priors.gen_mu_loc.ln(),
                scale: priors.gen_mu_scale,
            },
        )
        .block("gen_mu_z", c, Transform::Identity, STD_NORMAL)
        .block(
            "gen_theta",
            1,
            Transform::Exp,
            Prior::Normal {
                loc: priors.gen_theta_loc.ln(),
                scale: priors.gen_theta_scale,
            },
        )
        .block(
            "I_0",
            c * a,
            Transform::Exp,
            Prior::Normal {
                loc: priors.i0_loc,
                scale: priors.i0_scale,
            },
        );

    let per = CorrCholesky::unconstrained_len(a);
    if per > 0 {
        builder = builder.block(
            "contact_chol",
            c * per,
            Transform::Identity,
            Prior::CorrCholeskyLkj {
                dim: a,
                count: c,
                eta: priors.contact_eta,
            },
        );
    }

    builder = builder
        .block(
            "phi_plus",
            c,
            Transform::Sigmoid,
            Prior::Normal {
                loc: logit(priors.phi_plus_loc),
                scale: priors.phi_plus_scale,
            },
        )
        .block(
            "eta_test",
            c,
            Transform::Exp,
            Prior::Normal {
                loc: priors.eta_test_loc.ln(),
                scale: priors.eta_test_scale,
            },
        )
        .block(
            "test_delay_mu",
            c,
            Transform::Exp,
            Prior::Normal {
                loc: priors.test_delay_loc.ln(),
                scale: priors.test_delay_scale,
            },
        )
        .block(
            "test_delay_theta",
            1,
            Transform::Exp,
            Prior::Normal {
                loc: priors.test_delay_theta_loc.ln(),
                scale: priors.test_delay_theta_scale,
            },
        )
        .block("ifr_z", c * a, Transform::Identity, STD_NORMAL)
        .block(
            "death_delay_mu",
            c,
            Transform::Exp,
            Prior::Normal {
                loc: priors.death_delay_loc.ln(),
                scale: priors.death_delay_scale,
            },
        )
        .block(
            "death_delay_theta",
            1,
            Transform::Exp,
            Prior::Normal {
                loc: priors.death_delay_theta_loc.ln(),
                scale: priors.death_delay_theta_scale,
            },
        );

    if with_modulation {
        builder = builder
            .block(
                "weekend_factor_log",
                1,
                Transform::Identity,
                Prior::Normal {
                    loc: priors.weekend_factor_loc.ln(),
                    scale: priors.weekend_factor_scale,
                },
            )
            .block("weekend_factor_z", c, Transform::Identity, STD_NORMAL)
            .block(
                "weekend_offset",
                c,
                Transform::Identity,
                Prior::VonMises {
                    kappa: priors.weekend_offset_kappa,
                },
            );
    }

    builder
        .block(
            "sigma_positive",
            c,
            Transform::Softplus,
            Prior::HalfCauchy {
                scale: priors.sigma_scale,
            },
        )
        .block(
            "sigma_total",
            c,
            Transform::Softplus,
            Prior::HalfCauchy {
                scale: priors.sigma_scale,
            },
        )
        .block(
            "sigma_deaths",
            c,
            Transform::Softplus,
            Prior::HalfCauchy {
                scale: priors.sigma_scale,
            },
        )
        .build()
}

const STD_NORMAL: Prior = Prior::Normal {
    loc: 0.0,
    scale: 1.0,
};
