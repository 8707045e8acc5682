//! Multi-chain effective sample size.

use super::rhat::{is_diagnosable, mean_and_variance, split_halves};

/// Effective sample size over split chains, with autocorrelations pooled
/// across chains and truncated by Geyer's initial monotone sequence.
///
/// NaN for input [`super::rhat::split_rhat`] rejects. A parameter with
/// zero total variance reports the raw draw count.
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    if !is_diagnosable(chains) {
        return f64::NAN;
    }
    let halves = split_halves(chains);
    let m = halves.len();
    let n = halves[0].len();
    let total = (m * n) as f64;

    let stats: Vec<(f64, f64)> = halves.iter().map(|h| mean_and_variance(h)).collect();
    let mean_var = stats.iter().map(|(_, v)| v).sum::<f64>() / m as f64;
    let means: Vec<f64> = stats.iter().map(|(mean, _)| *mean).collect();
    let between = if m > 1 { mean_and_variance(&means).1 } else { 0.0 };
    let var_plus = mean_var * (n as f64 - 1.0) / n as f64 + between;
    if var_plus <= 0.0 || !var_plus.is_finite() {
        return total;
    }

    let rho = |lag: usize| -> f64 {
        let pooled = halves
            .iter()
            .zip(&stats)
            .map(|(h, (mean, _))| autocovariance(h, *mean, lag))
            .sum::<f64>()
            / m as f64;
        1.0 - (mean_var - pooled) / var_plus
    };

    // Sum of adjacent-lag pairs, stopped at the first negative pair and
    // forced non-increasing.
    let mut tau = -1.0;
    let mut previous = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair < 0.0 {
            break;
        }
        let pair = pair.min(previous);
        tau += 2.0 * pair;
        previous = pair;
        lag += 2;
    }
    let tau = tau.max(1.0 / total.log10());
    total / tau
}

/// Biased lag-`lag` autocovariance of one chain (divides by its length).
fn autocovariance(xs: &[f64], mean: f64, lag: usize) -> f64 {
    let n = xs.len();
    let sum: f64 = xs[..n - lag]
        .iter()
        .zip(&xs[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_independent_draws_near_draw_count() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|_| (0..1000).map(|_| rng.sample(StandardNormal)).collect())
            .collect();
        let ess = effective_sample_size(&chains);
        assert!(ess > 3000.0 && ess < 5500.0, "ess {ess}");
    }

    #[test]
    fn test_autocorrelated_draws_lose_information() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let chains: Vec<Vec<f64>> = (0..4)
            .map(|_| {
                let mut x = 0.0_f64;
                (0..1000)
                    .map(|_| {
                        let z: f64 = rng.sample(StandardNormal);
                        x = 0.95 * x + z;
                        x
                    })
                    .collect()
            })
            .collect();
        // AR(1) with coefficient 0.95 has ESS ratio (1 - 0.95) / (1 + 0.95).
        let ess = effective_sample_size(&chains);
        assert!(ess < 400.0, "ess {ess}");
        assert!(ess > 20.0, "ess {ess}");
    }

    #[test]
    fn test_unusable_input_is_nan() {
        assert!(effective_sample_size(&[]).is_nan());
        assert!(effective_sample_size(&[vec![1.0]]).is_nan());
        assert!(effective_sample_size(&[vec![0.5; 4], vec![0.5; 5]]).is_nan());
    }

    #[test]
    fn test_constant_parameter() {
        let ess = effective_sample_size(&[vec![0.2; 8], vec![0.2; 8]]);
        assert_eq!(ess, 16.0);
    }
}
