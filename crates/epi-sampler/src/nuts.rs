//! No-U-Turn Sampler with multinomial trajectory sampling.
//!
//! Hoffman & Gelman (2014) tree doubling with the refinements used by
//! Stan and PyMC: generalized U-turn criterion, multinomial candidate
//! selection weighted by exp(-H), divergence detection on the energy
//! error, diagonal mass-matrix estimation during the middle warmup
//! window, and dual-averaging step-size adaptation.

use crate::adapt::{DualAveraging, RunningMoments};
use crate::chains::ChainResult;
use crate::gradient::GradientTarget;
use crate::LogDensity;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Energy error beyond which a leaf is divergent.
const MAX_ENERGY_ERROR: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct NutsConfig {
    /// 0.0 requests automatic initialization.
    pub step_size: f64,
    pub max_tree_depth: usize,
    pub draws: usize,
    pub warmup: usize,
    pub target_accept: f64,
}

impl Default for NutsConfig {
    fn default() -> Self {
        Self {
            step_size: 0.0,
            max_tree_depth: 10,
            draws: 1000,
            warmup: 1000,
            target_accept: 0.8,
        }
    }
}

/// A point on the trajectory with its cached gradient and density.
#[derive(Clone)]
struct State {
    position: Vec<f64>,
    momentum: Vec<f64>,
    grad: Vec<f64>,
    logp: f64,
}

impl State {
    fn hamiltonian(&self, inv_mass: &[f64]) -> f64 {
        let kinetic: f64 = self
            .momentum
            .iter()
            .zip(inv_mass.iter())
            .map(|(&p, &im)| 0.5 * p * p * im)
            .sum();
        -self.logp + kinetic
    }
}

/// Outcome of building a (sub)tree.
struct Tree {
    leftmost: State,
    rightmost: State,
    candidate: State,
    log_weight: f64,
    leapfrogs: usize,
    sum_accept: f64,
    turning: bool,
    diverging: bool,
}

struct Workspace<'a, 't, T: LogDensity + ?Sized> {
    gt: &'a mut GradientTarget<'t, T>,
    inv_mass: &'a [f64],
    h0: f64,
}

/// Run one NUTS chain from `init`.
pub fn run_chain<T: LogDensity + ?Sized>(
    target: &T,
    config: &NutsConfig,
    rng: &mut ChaCha8Rng,
    init: Vec<f64>,
) -> ChainResult {
    let dim = target.dim();
    let mut gt = GradientTarget::new(target);

    let mut inv_mass = vec![1.0f64; dim];
    let mut mass_sqrt = vec![1.0f64; dim];

    let mut current = {
        let mut grad = vec![0.0; dim];
        let logp = gt.logp_and_grad(&init, &mut grad);
        State {
            position: init,
            momentum: vec![0.0; dim],
            grad,
            logp,
        }
    };

    let mut step_size = if config.step_size > 0.0 {
        config.step_size
    } else {
        heuristic_step_size(&mut gt, &current, &inv_mass, &mass_sqrt, rng)
    };
    let mut da = DualAveraging::new(step_size, config.target_accept);

    // Warmup windows: early step-size tuning, middle mass estimation,
    // late re-tuning with the adapted metric.
    let phase1_end = config.warmup * 15 / 100;
    let phase2_end = config.warmup * 90 / 100;
    let mut moments = RunningMoments::new(dim);

    let total_iters = config.warmup + config.draws;
    let mut draws = Vec::with_capacity(config.draws);
    let mut divergences = 0usize;
    let mut sum_accept = 0.0f64;

    for iter in 0..total_iters {
        let warming = iter < config.warmup;

        for (pi, ms) in current.momentum.iter_mut().zip(mass_sqrt.iter()) {
            let z: f64 = StandardNormal.sample(rng);
            *pi = z * ms;
        }
        let h0 = current.hamiltonian(&inv_mass);

        let mut ws = Workspace {
            gt: &mut gt,
            inv_mass: &inv_mass,
            h0,
        };
        let (proposal, accept_stat, diverging) =
            sample_trajectory(&mut ws, &current, step_size, config.max_tree_depth, rng);

        if !diverging {
            current.position.copy_from_slice(&proposal.position);
            current.grad.copy_from_slice(&proposal.grad);
            current.logp = proposal.logp;
        } else {
            divergences += 1;
        }
        sum_accept += accept_stat;

        if warming {
            step_size = da.update(accept_stat);

            if iter >= phase1_end && iter < phase2_end {
                moments.push(&current.position);
            }

            if iter == phase2_end {
                if let Some(var) = moments.variance() {
                    for i in 0..dim {
                        if var[i] > 1e-8 {
                            inv_mass[i] = 1.0 / var[i];
                            mass_sqrt[i] = var[i].sqrt();
                        }
                    }
                }
                // The metric changed; re-derive the step size scale.
                step_size = heuristic_step_size(&mut gt, &current, &inv_mass, &mass_sqrt, rng);
                da.restart(step_size);
            }

            if iter + 1 == config.warmup {
                step_size = da.finalized();
            }
        } else {
            draws.push(current.position.clone());
        }
    }

    ChainResult {
        draws,
        accept_rate: sum_accept / total_iters as f64,
        step_size,
        divergences,
    }
}

/// One NUTS transition: repeatedly double the trajectory until a U-turn,
/// divergence, or the depth cap.
fn sample_trajectory<T: LogDensity + ?Sized>(
    ws: &mut Workspace<'_, '_, T>,
    initial: &State,
    step_size: f64,
    max_depth: usize,
    rng: &mut ChaCha8Rng,
) -> (State, f64, bool) {
    let mut leftmost = initial.clone();
    let mut rightmost = initial.clone();
    let mut candidate = initial.clone();
    let mut log_weight = 0.0f64;
    let mut sum_accept = 0.0f64;
    let mut leapfrogs = 0usize;
    let mut diverging = false;

    for depth in 0..max_depth {
        let forward = rng.gen::<bool>();
        let subtree = if forward {
            build_tree(ws, &rightmost, step_size, depth, rng)
        } else {
            build_tree(ws, &leftmost, -step_size, depth, rng)
        };

        sum_accept += subtree.sum_accept;
        leapfrogs += subtree.leapfrogs;

        if subtree.diverging {
            diverging = true;
            break;
        }
        if subtree.turning {
            break;
        }

        // Multinomial selection between the old tree and the new half.
        let accept_new = (subtree.log_weight - log_weight).min(0.0).exp();
        if rng.gen::<f64>() < accept_new {
            candidate = subtree.candidate;
        }
        log_weight = log_add(log_weight, subtree.log_weight);

        if forward {
            rightmost = subtree.rightmost;
        } else {
            leftmost = subtree.leftmost;
        }

        if is_turning(&leftmost, &rightmost, ws.inv_mass) {
            break;
        }
    }

    let mean_accept = if leapfrogs > 0 {
        (sum_accept / leapfrogs as f64).min(1.0)
    } else {
        0.0
    };
    (candidate, mean_accept, diverging)
}

/// Build a balanced subtree of `depth` doublings starting at `from`,
/// stepping in the direction of `step`'s sign.
fn build_tree<T: LogDensity + ?Sized>(
    ws: &mut Workspace<'_, '_, T>,
    from: &State,
    step: f64,
    depth: usize,
    rng: &mut ChaCha8Rng,
) -> Tree {
    if depth == 0 {
        let next = leapfrog(ws, from, step);
        let energy_error = next.hamiltonian(ws.inv_mass) - ws.h0;
        let diverging = !energy_error.is_finite() || energy_error > MAX_ENERGY_ERROR;
        let log_weight = if diverging {
            f64::NEG_INFINITY
        } else {
            -energy_error
        };
        let accept = if energy_error.is_finite() {
            (-energy_error).min(0.0).exp()
        } else {
            0.0
        };
        return Tree {
            leftmost: next.clone(),
            rightmost: next.clone(),
            candidate: next,
            log_weight,
            leapfrogs: 1,
            sum_accept: accept,
            turning: false,
            diverging,
        };
    }

    let first = build_tree(ws, from, step, depth - 1, rng);
    if first.diverging || first.turning {
        return first;
    }

    let grow_from = if step > 0.0 {
        &first.rightmost
    } else {
        &first.leftmost
    };
    let second = build_tree(ws, grow_from, step, depth - 1, rng);

    let leapfrogs = first.leapfrogs + second.leapfrogs;
    let sum_accept = first.sum_accept + second.sum_accept;

    if second.diverging {
        return Tree {
            leapfrogs,
            sum_accept,
            diverging: true,
            ..first
        };
    }

    let log_weight = log_add(first.log_weight, second.log_weight);
    let candidate = if rng.gen::<f64>() < (second.log_weight - log_weight).exp() {
        second.candidate
    } else {
        first.candidate
    };

    let (leftmost, rightmost) = if step > 0.0 {
        (first.leftmost, second.rightmost)
    } else {
        (second.leftmost, first.rightmost)
    };
    let turning = second.turning || is_turning(&leftmost, &rightmost, ws.inv_mass);

    Tree {
        leftmost,
        rightmost,
        candidate,
        log_weight,
        leapfrogs,
        sum_accept,
        turning,
        diverging: false,
    }
}

/// Single leapfrog step; the sign of `step` sets the direction.
fn leapfrog<T: LogDensity + ?Sized>(
    ws: &mut Workspace<'_, '_, T>,
    from: &State,
    step: f64,
) -> State {
    let dim = from.position.len();
    let mut momentum = vec![0.0; dim];
    let mut position = vec![0.0; dim];

    for i in 0..dim {
        momentum[i] = from.momentum[i] + 0.5 * step * from.grad[i];
    }
    for i in 0..dim {
        position[i] = from.position[i] + step * ws.inv_mass[i] * momentum[i];
    }
    let mut grad = vec![0.0; dim];
    let logp = ws.gt.logp_and_grad(&position, &mut grad);
    for i in 0..dim {
        momentum[i] += 0.5 * step * grad[i];
    }

    State {
        position,
        momentum,
        grad,
        logp,
    }
}

/// Generalized U-turn criterion across the endpoints of a trajectory.
fn is_turning(left: &State, right: &State, inv_mass: &[f64]) -> bool {
    let mut dot_left = 0.0f64;
    let mut dot_right = 0.0f64;
    for i in 0..left.position.len() {
        let dq = right.position[i] - left.position[i];
        dot_left += dq * inv_mass[i] * left.momentum[i];
        dot_right += dq * inv_mass[i] * right.momentum[i];
    }
    dot_left < 0.0 || dot_right < 0.0
}

fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY && b == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Double/halve the step size until one leapfrog step crosses 50%
/// acceptance, starting from 1.0 (Hoffman & Gelman algorithm 4).
fn heuristic_step_size<T: LogDensity + ?Sized>(
    gt: &mut GradientTarget<'_, T>,
    current: &State,
    inv_mass: &[f64],
    mass_sqrt: &[f64],
    rng: &mut ChaCha8Rng,
) -> f64 {
    let mut probe = current.clone();
    for (pi, ms) in probe.momentum.iter_mut().zip(mass_sqrt.iter()) {
        let z: f64 = StandardNormal.sample(rng);
        *pi = z * ms;
    }
    let h0 = probe.hamiltonian(inv_mass);
    let threshold = (0.5f64).ln();

    let mut step = 1.0f64;
    let mut ws = Workspace { gt, inv_mass, h0 };

    let first = leapfrog(&mut ws, &probe, step);
    let mut log_ratio = h0 - first.hamiltonian(inv_mass);
    if !log_ratio.is_finite() {
        log_ratio = f64::NEG_INFINITY;
    }
    let direction: f64 = if log_ratio > threshold { 1.0 } else { -1.0 };

    for _ in 0..50 {
        let trial = leapfrog(&mut ws, &probe, step);
        let lr = h0 - trial.hamiltonian(inv_mass);
        if !lr.is_finite() {
            step *= 0.5;
            continue;
        }
        if (direction > 0.0 && lr < threshold) || (direction < 0.0 && lr > threshold) {
            break;
        }
        step *= 2.0f64.powf(direction);
    }

    step.clamp(1e-10, 1e3)
}
