//! Posterior trace recording.
//!
//! Every named tensor the model declares is appended here once per kept
//! draw, shape-checked against the first recording. Chains stay separate
//! until serialization, where the writer stacks `chain x draw x ...`.

use crate::error::{ModelError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Draws of one named variable, flattened row-major per draw.
#[derive(Debug, Clone, Serialize)]
pub struct TraceVar {
    pub shape: Vec<usize>,
    pub draws: Vec<Vec<f64>>,
}

/// All recorded variables of a single chain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainTrace {
    pub vars: BTreeMap<String, TraceVar>,
    /// Log-density per kept draw.
    pub lp: Vec<f64>,
    pub divergences: usize,
    pub accept_rate: f64,
    pub step_size: f64,
}

impl ChainTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one draw of `name`. The first recording fixes the shape.
    pub fn record(&mut self, name: &str, shape: &[usize], values: Vec<f64>) -> Result<()> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(ModelError::shape(name, shape, &[values.len()]));
        }
        match self.vars.get_mut(name) {
            Some(var) => {
                if var.shape != shape {
                    return Err(ModelError::shape(name, &var.shape, shape));
                }
                var.draws.push(values);
            }
            None => {
                self.vars.insert(
                    name.to_string(),
                    TraceVar {
                        shape: shape.to_vec(),
                        draws: vec![values],
                    },
                );
            }
        }
        Ok(())
    }

    /// Number of recorded draws (0 if nothing recorded yet).
    pub fn len(&self) -> usize {
        self.vars.values().next().map_or(0, |v| v.draws.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_counts_draws() {
        let mut trace = ChainTrace::new();
        trace.record("R_0", &[2, 2], vec![1.0; 4]).unwrap();
        trace.record("R_0", &[2, 2], vec![2.0; 4]).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.vars["R_0"].shape, vec![2, 2]);
    }

    #[test]
    fn rejects_wrong_value_count() {
        let mut trace = ChainTrace::new();
        let err = trace.record("R_0", &[2, 2], vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, ModelError::Shape { .. }));
    }

    #[test]
    fn rejects_shape_change_between_draws() {
        let mut trace = ChainTrace::new();
        trace.record("C", &[2, 2], vec![0.0; 4]).unwrap();
        let err = trace.record("C", &[4], vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, ModelError::Shape { .. }));
    }
}
