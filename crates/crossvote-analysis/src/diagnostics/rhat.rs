//! Split R-hat (potential scale reduction) across chains.

use crossvote_core::constants::MIN_DRAWS_FOR_DIAGNOSTICS;

/// Split every chain into halves (dropping the middle draw of odd-length
/// chains) and compare between-half to within-half variance.
///
/// Returns NaN unless there is at least one chain and every chain has the
/// same length of at least `MIN_DRAWS_FOR_DIAGNOSTICS` draws. Returns 1.0
/// for a parameter that is constant everywhere and `+inf` when every half
/// is constant but halves disagree.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    if !is_diagnosable(chains) {
        return f64::NAN;
    }
    let halves = split_halves(chains);
    let n = halves[0].len() as f64;
    let m = halves.len() as f64;

    let stats: Vec<(f64, f64)> = halves.iter().map(|h| mean_and_variance(h)).collect();
    let grand_mean = stats.iter().map(|(mean, _)| mean).sum::<f64>() / m;
    let within = stats.iter().map(|(_, var)| var).sum::<f64>() / m;
    let between = n * stats
        .iter()
        .map(|(mean, _)| (mean - grand_mean).powi(2))
        .sum::<f64>()
        / (m - 1.0);

    if within <= 0.0 {
        return if between <= f64::EPSILON * grand_mean.abs().max(1.0) {
            1.0
        } else {
            f64::INFINITY
        };
    }
    let var_plus = (n - 1.0) / n * within + between / n;
    (var_plus / within).sqrt()
}

/// Non-empty, equal-length chains long enough to split.
pub(crate) fn is_diagnosable(chains: &[Vec<f64>]) -> bool {
    match chains.first() {
        Some(first) => {
            first.len() >= MIN_DRAWS_FOR_DIAGNOSTICS
                && chains.iter().all(|c| c.len() == first.len())
        }
        None => false,
    }
}

/// First and last halves of every chain, as slices.
pub(crate) fn split_halves(chains: &[Vec<f64>]) -> Vec<&[f64]> {
    chains
        .iter()
        .flat_map(|chain| {
            let half = chain.len() / 2;
            [&chain[..half], &chain[chain.len() - half..]]
        })
        .collect()
}

/// Sample mean and unbiased sample variance.
pub(crate) fn mean_and_variance(xs: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = if xs.len() > 1 {
        xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, var)
}
