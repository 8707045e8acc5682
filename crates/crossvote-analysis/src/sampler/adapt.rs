//! Warm-up adaptation: dual-averaging step size and a windowed diagonal
//! metric estimate.

/// Dual-averaging shrinkage.
const GAMMA: f64 = 0.05;
/// Dual-averaging iteration offset.
const T0: f64 = 10.0;
/// Dual-averaging decay exponent.
const KAPPA: f64 = 0.75;

/// Metric windows: fast step-size-only phase, slow windows, final fast phase.
const INIT_BUFFER: usize = 75;
const TERM_BUFFER: usize = 50;
const BASE_WINDOW: usize = 25;
/// Below this many warm-up iterations only the step size adapts.
const MIN_METRIC_WARMUP: usize = 20;

/// Nesterov dual averaging of `ln step` toward a mean acceptance statistic.
#[derive(Debug, Clone)]
pub struct StepSizeAdaptation {
    target: f64,
    mu: f64,
    log_step: f64,
    log_step_bar: f64,
    h_bar: f64,
    iteration: usize,
}

impl StepSizeAdaptation {
    pub fn new(target: f64, initial_step: f64) -> Self {
        let mut adaptation = Self {
            target,
            mu: 0.0,
            log_step: 0.0,
            log_step_bar: 0.0,
            h_bar: 0.0,
            iteration: 0,
        };
        adaptation.restart(initial_step);
        adaptation
    }

    /// Forget the history and shrink toward `10 * initial_step`.
    pub fn restart(&mut self, initial_step: f64) {
        self.mu = (10.0 * initial_step).ln();
        self.log_step = initial_step.ln();
        self.log_step_bar = 0.0;
        self.h_bar = 0.0;
        self.iteration = 0;
    }

    /// Feed one transition's acceptance statistic; returns the next step size.
    pub fn update(&mut self, accept_stat: f64) -> f64 {
        self.iteration += 1;
        let t = self.iteration as f64;
        let eta = 1.0 / (t + T0);
        self.h_bar = (1.0 - eta) * self.h_bar + eta * (self.target - accept_stat.min(1.0));
        self.log_step = self.mu - t.sqrt() / GAMMA * self.h_bar;
        let weight = t.powf(-KAPPA);
        self.log_step_bar = weight * self.log_step + (1.0 - weight) * self.log_step_bar;
        self.log_step.exp()
    }

    /// The step size to keep once warm-up ends.
    pub fn adapted(&self) -> f64 {
        if self.iteration == 0 {
            self.log_step.exp()
        } else {
            self.log_step_bar.exp()
        }
    }
}

/// Welford estimate of per-coordinate variance.
#[derive(Debug, Clone)]
struct Welford {
    count: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl Welford {
    fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    fn add(&mut self, x: &[f64]) {
        self.count += 1;
        let n = self.count as f64;
        for ((m, s), &v) in self.mean.iter_mut().zip(&mut self.m2).zip(x) {
            let delta = v - *m;
            *m += delta / n;
            *s += delta * (v - *m);
        }
    }

    /// Sample variance shrunk toward `1e-3`.
    fn regularized_variance(&self) -> Vec<f64> {
        let n = self.count as f64;
        self.m2
            .iter()
            .map(|s| {
                let var = if self.count > 1 { s / (n - 1.0) } else { 0.0 };
                (n / (n + 5.0)) * var + 1e-3 * (5.0 / (n + 5.0))
            })
            .collect()
    }

    fn reset(&mut self) {
        self.count = 0;
        self.mean.iter_mut().for_each(|m| *m = 0.0);
        self.m2.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// Diagonal inverse metric learned over doubling windows of warm-up.
///
/// For 1000 warm-up iterations the windows close after iterations
/// 99, 149, 249, 449 and 949 (0-based).
#[derive(Debug, Clone)]
pub struct MetricAdaptation {
    warmup: usize,
    init_buffer: usize,
    term_buffer: usize,
    window_size: usize,
    next_window: usize,
    counter: usize,
    estimator: Welford,
    enabled: bool,
}

impl MetricAdaptation {
    pub fn new(dim: usize, warmup: usize) -> Self {
        let (init_buffer, term_buffer, base_window) =
            if INIT_BUFFER + TERM_BUFFER + BASE_WINDOW > warmup {
                let init = (0.15 * warmup as f64) as usize;
                let term = (0.1 * warmup as f64) as usize;
                (init, term, warmup - init - term)
            } else {
                (INIT_BUFFER, TERM_BUFFER, BASE_WINDOW)
            };
        Self {
            warmup,
            init_buffer,
            term_buffer,
            window_size: base_window,
            next_window: (init_buffer + base_window).saturating_sub(1),
            counter: 0,
            estimator: Welford::new(dim),
            enabled: warmup >= MIN_METRIC_WARMUP,
        }
    }

    /// Feed the position after one warm-up transition. Returns a new
    /// inverse metric when a window closes.
    pub fn observe(&mut self, position: &[f64]) -> Option<Vec<f64>> {
        if !self.enabled || self.counter >= self.warmup {
            self.counter += 1;
            return None;
        }
        let slow_end = self.warmup - self.term_buffer;
        if self.counter >= self.init_buffer && self.counter < slow_end {
            self.estimator.add(position);
        }
        let closing = self.counter == self.next_window;
        let update = if closing {
            self.compute_next_window();
            let variance = self.estimator.regularized_variance();
            self.estimator.reset();
            Some(variance)
        } else {
            None
        };
        self.counter += 1;
        update
    }

    fn compute_next_window(&mut self) {
        let last = self.warmup - self.term_buffer - 1;
        if self.next_window == last {
            return;
        }
        self.window_size *= 2;
        self.next_window = self.counter + self.window_size;
        // A window too short to double again absorbs the rest of the slow phase.
        if self.next_window != last && self.next_window + 2 * self.window_size >= last + 1 {
            self.next_window = last;
        }
    }
}
