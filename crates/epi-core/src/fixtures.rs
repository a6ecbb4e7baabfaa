//! Synthetic datasets for tests, demos, and quick smoke runs.

use chrono::NaiveDate;
use epi_model::{
    default_ifr_means, ChangePointKind, Intervention, ModelParams, ObservedData, PriorConfig,
};
use ndarray::{Array2, Array3};
use std::io::Write;
use std::path::Path;

const COUNTRIES: [&str; 2] = ["alphaland", "betaland"];
const AGE_GROUPS: [&str; 2] = ["0-39", "40+"];
const BEGIN: (i32, u32, u32) = (2020, 3, 2);

/// In-memory parameter set: 2 countries x 2 age groups x `days` days with
/// a plausible epidemic curve and one sigmoid intervention.
pub fn small_params(days: usize) -> ModelParams {
    let c = COUNTRIES.len();
    let a = AGE_GROUPS.len();
    let mut positive = Array3::zeros((days, c, a));
    let mut total = Array3::zeros((days, c, a));
    let mut deaths = Array3::zeros((days, c, a));
    for t in 0..days {
        for ci in 0..c {
            for ai in 0..a {
                let level = curve(t, ci, ai);
                positive[[t, ci, ai]] = level;
                total[[t, ci, ai]] = level * 12.0;
                deaths[[t, ci, ai]] = (level * 0.01).max(0.0);
            }
        }
    }
    // A short missing stretch exercises the likelihood mask.
    positive[[0, 0, 0]] = f64::NAN;
    if days > 1 {
        positive[[1, 0, 0]] = f64::NAN;
    }

    let (y, m, d) = BEGIN;
    ModelParams::new(
        COUNTRIES.iter().map(|s| s.to_string()).collect(),
        AGE_GROUPS.iter().map(|s| s.to_string()).collect(),
        NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date"),
        ObservedData {
            positive,
            total,
            deaths,
        },
        Array2::from_elem((c, a), 2e6),
        default_ifr_means(a),
        vec![Intervention {
            name: "distancing".into(),
            kind: ChangePointKind::Sigmoid,
            day: vec![Some(days as f64 * 0.4), Some(days as f64 * 0.5)],
        }],
        PriorConfig::default(),
    )
    .expect("fixture parameters are valid")
}

fn curve(t: usize, ci: usize, ai: usize) -> f64 {
    let growth = 30.0 * (1.0 + 0.08 * ci as f64);
    let phase = t as f64 / 10.0;
    growth * (1.0 + phase).min(4.0) * (1.0 + 0.3 * ai as f64)
}

/// Write the same fixture as an on-disk dataset directory.
pub fn write_demo_dataset(root: &Path, days: usize) -> std::io::Result<()> {
    let (y, m, d) = BEGIN;
    let begin = NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date");

    for (ci, country) in COUNTRIES.iter().enumerate() {
        let dir = root.join(country);
        std::fs::create_dir_all(&dir)?;

        for (file, scale) in [("positive.csv", 1.0), ("tests.csv", 12.0), ("deaths.csv", 0.01)] {
            let mut out = std::fs::File::create(dir.join(file))?;
            writeln!(out, "date,{}", AGE_GROUPS.join(","))?;
            for t in 0..days {
                let date = begin + chrono::Duration::days(t as i64);
                let cells: Vec<String> = (0..AGE_GROUPS.len())
                    .map(|ai| {
                        // Mirror the in-memory fixture's missing stretch.
                        if file == "positive.csv" && ci == 0 && ai == 0 && t < 2 {
                            String::new()
                        } else {
                            format!("{:.3}", curve(t, ci, ai) * scale)
                        }
                    })
                    .collect();
                writeln!(out, "{date},{}", cells.join(","))?;
            }
        }

        let mut population = std::fs::File::create(dir.join("population.csv"))?;
        writeln!(population, "age_group,population")?;
        for group in AGE_GROUPS {
            writeln!(population, "{group},2000000")?;
        }

        let mut interventions = std::fs::File::create(dir.join("interventions.csv"))?;
        writeln!(interventions, "intervention,date,kind")?;
        let cp = begin + chrono::Duration::days((days as f64 * (0.4 + 0.1 * ci as f64)) as i64);
        writeln!(interventions, "distancing,{cp},sigmoid")?;
    }
    Ok(())
}
