//! Warmup adaptation: dual-averaging step size and diagonal mass matrix.

/// Nesterov dual averaging on the log step size (Hoffman & Gelman 2014,
/// section 3.2), driving the acceptance statistic toward a target.
pub(crate) struct DualAveraging {
    mu: f64,
    target_accept: f64,
    gamma: f64,
    t0: f64,
    kappa: f64,
    log_step_bar: f64,
    h_bar: f64,
    count: u64,
}

impl DualAveraging {
    pub fn new(initial_step: f64, target_accept: f64) -> Self {
        Self {
            mu: (10.0 * initial_step).ln(),
            target_accept,
            gamma: 0.05,
            t0: 10.0,
            kappa: 0.75,
            log_step_bar: initial_step.ln(),
            h_bar: 0.0,
            count: 0,
        }
    }

    /// Feed one acceptance statistic; returns the step size for the next
    /// iteration.
    pub fn update(&mut self, accept_prob: f64) -> f64 {
        self.count += 1;
        let m = self.count as f64;
        let w = 1.0 / (m + self.t0);
        self.h_bar = (1.0 - w) * self.h_bar + w * (self.target_accept - accept_prob);
        let log_step = self.mu - (m.sqrt() / self.gamma) * self.h_bar;
        let m_pow = m.powf(-self.kappa);
        self.log_step_bar = m_pow * log_step + (1.0 - m_pow) * self.log_step_bar;
        log_step.exp()
    }

    /// Averaged step size to freeze after warmup.
    pub fn finalized(&self) -> f64 {
        self.log_step_bar.exp()
    }

    /// Restart averaging around a new step size (after a mass-matrix
    /// change invalidates the old scale).
    pub fn restart(&mut self, step: f64) {
        self.mu = (10.0 * step).ln();
        self.log_step_bar = step.ln();
        self.h_bar = 0.0;
        self.count = 0;
    }
}

/// Streaming mean/variance accumulator for the diagonal mass matrix.
pub(crate) struct RunningMoments {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    count: usize,
}

impl RunningMoments {
    pub fn new(dim: usize) -> Self {
        Self {
            sum: vec![0.0; dim],
            sum_sq: vec![0.0; dim],
            count: 0,
        }
    }

    pub fn push(&mut self, position: &[f64]) {
        for (i, &x) in position.iter().enumerate() {
            self.sum[i] += x;
            self.sum_sq[i] += x * x;
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Per-coordinate sample variance, None until enough draws accumulated.
    pub fn variance(&self) -> Option<Vec<f64>> {
        if self.count < 10 {
            return None;
        }
        let n = self.count as f64;
        Some(
            self.sum
                .iter()
                .zip(self.sum_sq.iter())
                .map(|(&s, &s2)| (s2 / n - (s / n) * (s / n)).max(0.0))
                .collect(),
        )
    }
}
