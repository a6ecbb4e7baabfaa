//! Dataset loading.
//!
//! A dataset directory holds one sub-directory per country:
//!
//! ```text
//! dataset/
//!   germany/
//!     positive.csv        date,<age group>,...   (empty cell = missing)
//!     tests.csv
//!     deaths.csv
//!     population.csv      age_group,population
//!     interventions.csv   intervention,date[,kind]
//!     ifr.csv             age_group,ifr          (optional)
//!   portugal/
//!     ...
//! ```
//!
//! All countries must agree on age groups and on a gap-free daily date
//! range; disagreement is a [`DataError`], never silent alignment.

use chrono::NaiveDate;
use epi_model::{
    default_ifr_means, ChangePointKind, Intervention, ModelParams, ObservedData, PriorConfig,
};
use ndarray::{Array2, Array3};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const POSITIVE_FILE: &str = "positive.csv";
pub const TESTS_FILE: &str = "tests.csv";
pub const DEATHS_FILE: &str = "deaths.csv";
pub const POPULATION_FILE: &str = "population.csv";
pub const INTERVENTIONS_FILE: &str = "interventions.csv";
pub const IFR_FILE: &str = "ifr.csv";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while reading a dataset directory.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("dataset inconsistency: {0}")]
    Inconsistent(String),

    #[error("no country directories found under {0}")]
    Empty(PathBuf),
}

type Result<T> = std::result::Result<T, DataError>;

/// One channel of one country: a dense daily table.
#[derive(Debug, Clone)]
struct SeriesTable {
    age_groups: Vec<String>,
    begin: NaiveDate,
    /// rows[day][age_group], NaN for missing cells.
    rows: Vec<Vec<f64>>,
}

/// The loaded dataset, ready to become [`ModelParams`].
#[derive(Debug, Clone)]
pub struct Dataset {
    pub countries: Vec<String>,
    pub age_groups: Vec<String>,
    pub begin: NaiveDate,
    pub observed: ObservedData,
    pub population: Array2<f64>,
    pub ifr_means: Vec<f64>,
    pub interventions: Vec<Intervention>,
}

impl Dataset {
    /// Number of days in the observed window.
    pub fn num_days(&self) -> usize {
        self.observed.positive.shape()[0]
    }

    /// Fraction of missing entries across all three channels.
    pub fn missing_fraction(&self) -> f64 {
        let tensors = [
            &self.observed.positive,
            &self.observed.total,
            &self.observed.deaths,
        ];
        let total: usize = tensors.iter().map(|t| t.len()).sum();
        let missing: usize = tensors
            .iter()
            .map(|t| t.iter().filter(|v| !v.is_finite()).count())
            .sum();
        missing as f64 / total as f64
    }

    /// Convert into model parameters with the given priors.
    pub fn into_model_params(self, priors: PriorConfig) -> crate::Result<ModelParams> {
        Ok(ModelParams::new(
            self.countries,
            self.age_groups,
            self.begin,
            self.observed,
            self.population,
            self.ifr_means,
            self.interventions,
            priors,
        )?)
    }
}

/// Load a dataset directory.
pub fn load_dataset(root: &Path) -> Result<Dataset> {
    let mut country_dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(|source| DataError::Io {
            path: root.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    country_dirs.sort();

    if country_dirs.is_empty() {
        return Err(DataError::Empty(root.to_path_buf()));
    }

    let countries: Vec<String> = country_dirs
        .iter()
        .map(|dir| {
            dir.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();
    info!(countries = countries.len(), "loading dataset");

    // First country fixes age groups and the date range.
    let mut positive_tables = Vec::new();
    let mut total_tables = Vec::new();
    let mut death_tables = Vec::new();
    for dir in &country_dirs {
        positive_tables.push(read_series(&dir.join(POSITIVE_FILE))?);
        total_tables.push(read_series(&dir.join(TESTS_FILE))?);
        death_tables.push(read_series(&dir.join(DEATHS_FILE))?);
    }

    let reference = &positive_tables[0];
    let age_groups = reference.age_groups.clone();
    let begin = reference.begin;
    let days = reference.rows.len();

    for (country, tables) in countries.iter().zip(
        positive_tables
            .iter()
            .zip(total_tables.iter())
            .zip(death_tables.iter())
            .map(|((p, t), d)| [p, t, d]),
    ) {
        for table in tables {
            if table.age_groups != age_groups {
                return Err(DataError::Inconsistent(format!(
                    "{country}: age groups {:?} do not match {:?}",
                    table.age_groups, age_groups
                )));
            }
            if table.begin != begin || table.rows.len() != days {
                return Err(DataError::Inconsistent(format!(
                    "{country}: date range does not match the first country"
                )));
            }
        }
    }

    let c = countries.len();
    let a = age_groups.len();
    let observed = ObservedData {
        positive: stack_tables(&positive_tables, days, c, a),
        total: stack_tables(&total_tables, days, c, a),
        deaths: stack_tables(&death_tables, days, c, a),
    };

    let mut population = Array2::zeros((c, a));
    for (ci, dir) in country_dirs.iter().enumerate() {
        let by_group = read_population(&dir.join(POPULATION_FILE))?;
        for (ai, group) in age_groups.iter().enumerate() {
            let n = by_group.get(group).copied().ok_or_else(|| {
                DataError::Inconsistent(format!(
                    "{}: population file lacks age group '{group}'",
                    countries[ci]
                ))
            })?;
            population[[ci, ai]] = n;
        }
    }

    let interventions = read_interventions(&country_dirs, &countries, begin)?;
    let ifr_means = read_ifr(&country_dirs[0].join(IFR_FILE), &age_groups)?
        .unwrap_or_else(|| default_ifr_means(a));

    debug!(days, countries = c, age_groups = a, "dataset loaded");
    Ok(Dataset {
        countries,
        age_groups,
        begin,
        observed,
        population,
        ifr_means,
        interventions,
    })
}

fn stack_tables(tables: &[SeriesTable], days: usize, c: usize, a: usize) -> Array3<f64> {
    let mut out = Array3::from_elem((days, c, a), f64::NAN);
    for (ci, table) in tables.iter().enumerate() {
        for (t, row) in table.rows.iter().enumerate() {
            for (ai, &value) in row.iter().enumerate() {
                out[[t, ci, ai]] = value;
            }
        }
    }
    out
}

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::Reader::from_path(path).map_err(|source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn read_series(path: &Path) -> Result<SeriesTable> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    if headers.len() < 2 || headers.get(0) != Some("date") {
        return Err(DataError::Parse {
            path: path.to_path_buf(),
            message: "first column must be 'date' followed by age-group columns".into(),
        });
    }
    let age_groups: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let date_field = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_field, DATE_FORMAT).map_err(|err| {
            DataError::Parse {
                path: path.to_path_buf(),
                message: format!("bad date '{date_field}': {err}"),
            }
        })?;

        let mut row = Vec::with_capacity(age_groups.len());
        for field in record.iter().skip(1) {
            row.push(parse_cell(field, path)?);
        }
        if row.len() != age_groups.len() {
            return Err(DataError::Parse {
                path: path.to_path_buf(),
                message: format!("row for {date} has {} cells", row.len()),
            });
        }
        dates.push(date);
        rows.push(row);
    }

    if dates.is_empty() {
        return Err(DataError::Parse {
            path: path.to_path_buf(),
            message: "no data rows".into(),
        });
    }

    let begin = dates[0];
    for (i, date) in dates.iter().enumerate() {
        let expected = begin + chrono::Duration::days(i as i64);
        if *date != expected {
            return Err(DataError::Parse {
                path: path.to_path_buf(),
                message: format!("dates must be daily without gaps; expected {expected}, got {date}"),
            });
        }
    }

    Ok(SeriesTable {
        age_groups,
        begin,
        rows,
    })
}

/// Empty cells and the literal `nan` are missing values; anything else
/// must parse as a number.
fn parse_cell(field: &str, path: &Path) -> Result<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    trimmed.parse().map_err(|_| DataError::Parse {
        path: path.to_path_buf(),
        message: format!("not a number: '{trimmed}'"),
    })
}

fn read_population(path: &Path) -> Result<BTreeMap<String, f64>> {
    let mut reader = open_csv(path)?;
    let mut out = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let group = record.get(0).unwrap_or_default().trim().to_string();
        let count: f64 = record
            .get(1)
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| DataError::Parse {
                path: path.to_path_buf(),
                message: format!("bad population for '{group}'"),
            })?;
        out.insert(group, count);
    }
    Ok(out)
}

/// Interventions are merged across countries by name; a country without a
/// row for an intervention has no change point for it.
fn read_interventions(
    country_dirs: &[PathBuf],
    countries: &[String],
    begin: NaiveDate,
) -> Result<Vec<Intervention>> {
    let mut merged: BTreeMap<String, (ChangePointKind, Vec<Option<f64>>)> = BTreeMap::new();

    for (ci, dir) in country_dirs.iter().enumerate() {
        let path = dir.join(INTERVENTIONS_FILE);
        if !path.exists() {
            continue;
        }
        let mut reader = open_csv(&path)?;
        for record in reader.records() {
            let record = record.map_err(|source| DataError::Csv {
                path: path.clone(),
                source,
            })?;
            let name = record.get(0).unwrap_or_default().trim().to_string();
            let date_field = record.get(1).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_field, DATE_FORMAT).map_err(|err| {
                DataError::Parse {
                    path: path.clone(),
                    message: format!("bad date '{date_field}' for '{name}': {err}"),
                }
            })?;
            let kind = match record.get(2).map(str::trim) {
                None | Some("") | Some("sigmoid") => ChangePointKind::Sigmoid,
                Some("step") => ChangePointKind::Step,
                Some(other) => {
                    return Err(DataError::Parse {
                        path: path.clone(),
                        message: format!("unknown change-point kind '{other}'"),
                    })
                }
            };

            let entry = merged
                .entry(name)
                .or_insert_with(|| (kind, vec![None; countries.len()]));
            entry.1[ci] = Some((date - begin).num_days() as f64);
        }
    }

    Ok(merged
        .into_iter()
        .map(|(name, (kind, day))| Intervention { name, kind, day })
        .collect())
}

fn read_ifr(path: &Path, age_groups: &[String]) -> Result<Option<Vec<f64>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = open_csv(path)?;
    let mut by_group = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let group = record.get(0).unwrap_or_default().trim().to_string();
        let ifr: f64 = record
            .get(1)
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| DataError::Parse {
                path: path.to_path_buf(),
                message: format!("bad IFR for '{group}'"),
            })?;
        by_group.insert(group, ifr);
    }

    let mut out = Vec::with_capacity(age_groups.len());
    for group in age_groups {
        let ifr = by_group.get(group).copied().ok_or_else(|| {
            DataError::Inconsistent(format!("ifr file lacks age group '{group}'"))
        })?;
        out.push(ifr);
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cell_treats_blank_and_nan_as_missing() {
        let path = Path::new("x.csv");
        assert!(parse_cell("", path).unwrap().is_nan());
        assert!(parse_cell("  NaN ", path).unwrap().is_nan());
        assert!((parse_cell("12.5", path).unwrap() - 12.5).abs() < 1e-12);
        assert!(parse_cell("abc", path).is_err());
    }
}
