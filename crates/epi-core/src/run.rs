//! The fit / simulate / check workflows.

use crate::config::RunConfig;
use crate::output;
use crate::{data, CoreError, Result};
use epi_model::{ChainTrace, ModelState, PriorConfig, RenewalModel};
use epi_sampler::diagnostics::summarize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Fit the model to a dataset and persist the posterior trace.
pub fn fit(data_dir: &Path, out_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    config.validate()?;

    let dataset = data::load_dataset(data_dir)?;
    info!(
        countries = dataset.countries.len(),
        age_groups = dataset.age_groups.len(),
        days = dataset.num_days(),
        "dataset loaded"
    );
    let params = dataset.into_model_params(config.priors.clone())?;
    let model = match config.modulation() {
        Some(kind) => RenewalModel::with_modulation(params, kind),
        None => RenewalModel::new(params),
    };
    info!(dim = model.space().dim(), "model built");

    let result = epi_sampler::run(&model, &config.sampler_config())?;

    // One evaluation per kept draw records every declared tensor.
    let mut traces = Vec::with_capacity(result.chains.len());
    for chain_result in &result.chains {
        let mut chain = ChainTrace::new();
        for q in &chain_result.draws {
            model.evaluate(q)?.record_into(&mut chain)?;
        }
        chain.divergences = chain_result.divergences;
        chain.accept_rate = chain_result.accept_rate;
        chain.step_size = chain_result.step_size;
        traces.push(chain);
    }

    let report = summarize(
        &output::scalar_traces(model.params(), &traces),
        result.total_divergences(),
    );
    println!("{}", report.to_table());

    output::write_trace(out_dir, model.params(), &config, &traces)?;
    Ok(())
}

/// Draw once from the priors and emit a synthetic dataset shaped like the
/// template, ready to be re-fit.
pub fn simulate(data_dir: &Path, out_dir: &Path, seed: u64) -> Result<()> {
    let dataset = data::load_dataset(data_dir)?;
    let template = dataset.clone();
    let params = dataset.into_model_params(PriorConfig::default())?;
    let model = RenewalModel::new(params);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let state = prior_predictive(&model, &mut rng)?;
    info!(lp = state.lp(), "prior draw evaluated");

    write_synthetic(out_dir, &template, &state)?;
    println!("synthetic dataset written to {}", out_dir.display());
    Ok(())
}

fn prior_predictive(model: &RenewalModel, rng: &mut ChaCha8Rng) -> Result<ModelState> {
    // The prior is wide; retry past the rare draw that evaluates to a
    // non-finite density.
    for _ in 0..50 {
        let q = model.sample_prior(rng);
        if let Ok(state) = model.evaluate(&q) {
            if state.lp().is_finite() {
                return Ok(state);
            }
        }
    }
    Err(CoreError::Config(
        "no finite prior-predictive draw after 50 attempts; check prior overrides".into(),
    ))
}

fn write_synthetic(out_dir: &Path, template: &data::Dataset, state: &ModelState) -> Result<()> {
    for (ci, country) in template.countries.iter().enumerate() {
        let dir = out_dir.join(country);
        std::fs::create_dir_all(&dir)?;

        for (file, tensor) in [
            (data::POSITIVE_FILE, &state.positive),
            (data::TESTS_FILE, &state.total),
            (data::DEATHS_FILE, &state.deaths),
        ] {
            let mut out = std::fs::File::create(dir.join(file))?;
            writeln!(out, "date,{}", template.age_groups.join(","))?;
            for t in 0..tensor.shape()[0] {
                let date = template.begin + chrono::Duration::days(t as i64);
                let cells: Vec<String> = (0..template.age_groups.len())
                    .map(|ai| format!("{:.4}", tensor[[t, ci, ai]]))
                    .collect();
                writeln!(out, "{date},{}", cells.join(","))?;
            }
        }

        let mut population = std::fs::File::create(dir.join(data::POPULATION_FILE))?;
        writeln!(population, "age_group,population")?;
        for (ai, group) in template.age_groups.iter().enumerate() {
            writeln!(population, "{group},{}", template.population[[ci, ai]])?;
        }

        let mut interventions = std::fs::File::create(dir.join(data::INTERVENTIONS_FILE))?;
        writeln!(interventions, "intervention,date,kind")?;
        for intervention in &template.interventions {
            if let Some(day) = intervention.day[ci] {
                let date = template.begin + chrono::Duration::days(day as i64);
                let kind = match intervention.kind {
                    epi_model::ChangePointKind::Step => "step",
                    epi_model::ChangePointKind::Sigmoid => "sigmoid",
                };
                writeln!(interventions, "{},{date},{kind}", intervention.name)?;
            }
        }
    }
    Ok(())
}

/// Validate a dataset and print its shape; errors exit non-zero.
pub fn check(data_dir: &Path) -> Result<()> {
    let dataset = data::load_dataset(data_dir)?;
    let countries = dataset.countries.join(", ");
    let age_groups = dataset.age_groups.join(", ");
    let days = dataset.num_days();
    let begin = dataset.begin;
    let missing = dataset.missing_fraction();
    let interventions = dataset.interventions.len();

    // Full model-parameter validation, not just file parsing.
    dataset.into_model_params(PriorConfig::default())?;

    println!("dataset ok");
    println!("  countries:     {countries}");
    println!("  age groups:    {age_groups}");
    println!("  window:        {days} days from {begin}");
    println!("  interventions: {interventions}");
    println!("  missing:       {:.1}%", missing * 100.0);
    Ok(())
}
