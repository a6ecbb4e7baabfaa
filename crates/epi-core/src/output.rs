//! Trace persistence and diagnostic flattening.
//!
//! The posterior trace lands in a directory: one JSON file per named
//! variable (`chain x draw x ...` nesting) plus `meta.json` with labels,
//! shapes, and sampler statistics — the shape external plotting expects.

use crate::config::RunConfig;
use crate::Result;
use epi_model::{ChainTrace, ModelParams};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
struct VarFile<'a> {
    name: &'a str,
    /// Tensor shape of a single draw.
    shape: &'a [usize],
    /// chains[chain][draw] -> flattened row-major tensor.
    chains: Vec<&'a [Vec<f64>]>,
}

#[derive(Debug, Serialize)]
struct Meta<'a> {
    countries: &'a [String],
    age_groups: &'a [String],
    begin: String,
    num_days: usize,
    variables: Vec<String>,
    chains: usize,
    draws_per_chain: usize,
    divergences: Vec<usize>,
    accept_rates: Vec<f64>,
    step_sizes: Vec<f64>,
    config: &'a RunConfig,
}

/// Write all chain traces under `out`.
pub fn write_trace(
    out: &Path,
    params: &ModelParams,
    config: &RunConfig,
    chains: &[ChainTrace],
) -> Result<()> {
    std::fs::create_dir_all(out)?;

    let variables: Vec<String> = chains
        .first()
        .map(|chain| chain.vars.keys().cloned().collect())
        .unwrap_or_default();

    for name in &variables {
        let var = VarFile {
            name: name.as_str(),
            shape: chains[0].vars[name].shape.as_slice(),
            chains: chains
                .iter()
                .map(|chain| chain.vars[name].draws.as_slice())
                .collect(),
        };
        let path = out.join(format!("{name}.json"));
        std::fs::write(&path, serde_json::to_vec(&var)?)?;
    }

    // lp is recorded alongside the named variables.
    let lp_draws: Vec<Vec<Vec<f64>>> = chains
        .iter()
        .map(|chain| chain.lp.iter().map(|&v| vec![v]).collect())
        .collect();
    let lp_file = VarFile {
        name: "lp",
        shape: &[1],
        chains: lp_draws.iter().map(|c| c.as_slice()).collect(),
    };
    std::fs::write(out.join("lp.json"), serde_json::to_vec(&lp_file)?)?;

    let meta = Meta {
        countries: params.countries(),
        age_groups: params.age_groups(),
        begin: params.begin().to_string(),
        num_days: params.num_days(),
        variables,
        chains: chains.len(),
        draws_per_chain: chains.first().map_or(0, |c| c.len()),
        divergences: chains.iter().map(|c| c.divergences).collect(),
        accept_rates: chains.iter().map(|c| c.accept_rate).collect(),
        step_sizes: chains.iter().map(|c| c.step_size).collect(),
        config,
    };
    std::fs::write(out.join("meta.json"), serde_json::to_vec_pretty(&meta)?)?;

    info!(path = %out.display(), "trace written");
    Ok(())
}

/// Flatten the small recorded variables into named scalar traces for the
/// diagnostics table. The big time tensors are deliberately skipped.
pub fn scalar_traces(
    params: &ModelParams,
    chains: &[ChainTrace],
) -> Vec<(String, Vec<Vec<f64>>)> {
    let mut out = Vec::new();

    let labelled: &[(&str, LabelKind)] = &[
        ("R_0", LabelKind::CountryAge),
        ("g_mu", LabelKind::Country),
        ("sigma_positive", LabelKind::Country),
        ("sigma_total", LabelKind::Country),
        ("sigma_deaths", LabelKind::Country),
    ];

    for (name, kind) in labelled {
        let Some(var) = chains.first().and_then(|c| c.vars.get(*name)) else {
            continue;
        };
        let flat_len: usize = var.shape.iter().product();
        for index in 0..flat_len {
            let label = kind.label(params, &var.shape, index);
            let per_chain: Vec<Vec<f64>> = chains
                .iter()
                .map(|chain| {
                    chain.vars[*name]
                        .draws
                        .iter()
                        .map(|draw| draw[index])
                        .collect()
                })
                .collect();
            out.push((format!("{name}[{label}]"), per_chain));
        }
    }

    let lp: Vec<Vec<f64>> = chains.iter().map(|chain| chain.lp.clone()).collect();
    out.push(("lp".to_string(), lp));
    out
}

enum LabelKind {
    Country,
    CountryAge,
}

impl LabelKind {
    fn label(&self, params: &ModelParams, shape: &[usize], index: usize) -> String {
        match self {
            LabelKind::Country => params.countries()[index].clone(),
            LabelKind::CountryAge => {
                let a = shape[1];
                format!(
                    "{},{}",
                    params.countries()[index / a],
                    params.age_groups()[index % a]
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epi_model::RenewalModel;

    fn fixture_chains() -> (epi_model::ModelParams, Vec<ChainTrace>) {
        let params = crate::fixtures::small_params(8);
        let model = RenewalModel::new(params.clone());
        let q = vec![0.0; model.space().dim()];
        let state = model.evaluate(&q).unwrap();

        let mut chains = Vec::new();
        for _ in 0..2 {
            let mut chain = ChainTrace::new();
            state.record_into(&mut chain).unwrap();
            state.record_into(&mut chain).unwrap();
            chains.push(chain);
        }
        (params, chains)
    }

    #[test]
    fn scalar_traces_carry_labels_and_lp() {
        let (params, chains) = fixture_chains();
        let traces = scalar_traces(&params, &chains);

        let names: Vec<&str> = traces.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.iter().any(|n| n.starts_with("R_0[")));
        assert!(names.contains(&"lp"));
        // 2 chains x 2 draws everywhere.
        for (_, chain_draws) in &traces {
            assert_eq!(chain_draws.len(), 2);
            assert_eq!(chain_draws[0].len(), 2);
        }
    }

    #[test]
    fn write_trace_emits_one_file_per_variable() {
        let (params, chains) = fixture_chains();
        let dir = tempfile::tempdir().unwrap();
        write_trace(dir.path(), &params, &RunConfig::default(), &chains).unwrap();

        assert!(dir.path().join("meta.json").exists());
        assert!(dir.path().join("R_0.json").exists());
        assert!(dir.path().join("new_E_t.json").exists());
        assert!(dir.path().join("lp.json").exists());

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("meta.json")).unwrap())
                .unwrap();
        assert_eq!(meta["chains"], 2);
        assert_eq!(meta["draws_per_chain"], 2);
    }
}
