//! Dataset loading against real files on disk.

use epi_core::data::{self, DataError};
use epi_core::fixtures;
use std::fs;

#[test]
fn demo_dataset_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_demo_dataset(dir.path(), 25).unwrap();

    let dataset = data::load_dataset(dir.path()).unwrap();
    assert_eq!(dataset.countries, vec!["alphaland", "betaland"]);
    assert_eq!(dataset.age_groups, vec!["0-39", "40+"]);
    assert_eq!(dataset.num_days(), 25);
    assert_eq!(dataset.interventions.len(), 1);

    // The fixture's blank cells surface as NaN, nothing else does.
    assert!(dataset.observed.positive[[0, 0, 0]].is_nan());
    assert!(dataset.observed.positive[[1, 0, 0]].is_nan());
    assert!(dataset.observed.positive[[2, 0, 0]].is_finite());
    assert!(dataset.observed.total.iter().all(|v| v.is_finite()));

    // Both countries picked up the intervention with different days.
    let intervention = &dataset.interventions[0];
    assert_eq!(intervention.name, "distancing");
    assert!(intervention.day[0].unwrap() < intervention.day[1].unwrap());
}

#[test]
fn mismatched_age_groups_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_demo_dataset(dir.path(), 10).unwrap();

    // Rewrite one channel of one country with a different header.
    let path = dir.path().join("betaland").join("deaths.csv");
    let original = fs::read_to_string(&path).unwrap();
    let mangled = original.replacen("0-39", "0-49", 1);
    fs::write(&path, mangled).unwrap();

    let err = data::load_dataset(dir.path()).unwrap_err();
    assert!(matches!(err, DataError::Inconsistent(_)), "{err}");
}

#[test]
fn date_gaps_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_demo_dataset(dir.path(), 10).unwrap();

    let path = dir.path().join("alphaland").join("positive.csv");
    let original = fs::read_to_string(&path).unwrap();
    let mut lines: Vec<&str> = original.lines().collect();
    lines.remove(3); // drop one day in the middle
    fs::write(&path, lines.join("\n")).unwrap();

    let err = data::load_dataset(dir.path()).unwrap_err();
    assert!(matches!(err, DataError::Parse { .. }), "{err}");
}

#[test]
fn empty_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = data::load_dataset(dir.path()).unwrap_err();
    assert!(matches!(err, DataError::Empty(_)));
}

#[test]
fn loaded_dataset_builds_model_params() {
    let dir = tempfile::tempdir().unwrap();
    fixtures::write_demo_dataset(dir.path(), 15).unwrap();

    let dataset = data::load_dataset(dir.path()).unwrap();
    let params = dataset
        .into_model_params(epi_model::PriorConfig::default())
        .unwrap();
    assert_eq!(params.num_countries(), 2);
    assert_eq!(params.num_age_groups(), 2);
    assert_eq!(params.num_days(), 15);
}
