//! Additive log-ratio (ALR) transform between a C-simplex and R^(C-1).
//!
//! `y_c = ln(v_c / v_C)` for `c < C`; the inverse is a softmax over
//! `[y, 0]`. The log-Jacobian of the inverse is `sum_c ln v_c` over all
//! `C` components.

/// Map ALR coordinates to a simplex, writing both the probabilities and
/// their logs. `y.len() + 1 == v.len() == log_v.len()`.
pub fn alr_to_simplex(y: &[f64], v: &mut [f64], log_v: &mut [f64]) {
    debug_assert_eq!(y.len() + 1, v.len());
    debug_assert_eq!(v.len(), log_v.len());
    let max = y.iter().copied().fold(0.0_f64, f64::max);
    let mut total = (-max).exp();
    for &yc in y {
        total += (yc - max).exp();
    }
    let log_norm = max + total.ln();
    let last = v.len() - 1;
    for (c, &yc) in y.iter().enumerate() {
        log_v[c] = yc - log_norm;
        v[c] = log_v[c].exp();
    }
    log_v[last] = -log_norm;
    v[last] = log_v[last].exp();
}

/// Map a strictly positive simplex to ALR coordinates.
pub fn simplex_to_alr(v: &[f64], y: &mut [f64]) {
    debug_assert_eq!(y.len() + 1, v.len());
    let log_last = v[v.len() - 1].ln();
    for (yc, &vc) in y.iter_mut().zip(v) {
        *yc = vc.ln() - log_last;
    }
}

/// Log-Jacobian of `alr_to_simplex` given the simplex logs.
pub fn log_jacobian(log_v: &[f64]) -> f64 {
    log_v.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let v = [0.9, 0.05, 0.05];
        let mut y = [0.0; 2];
        simplex_to_alr(&v, &mut y);
        let mut back = [0.0; 3];
        let mut log_back = [0.0; 3];
        alr_to_simplex(&y, &mut back, &mut log_back);
        for (a, b) in v.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
        for (lv, b) in log_back.iter().zip(&back) {
            assert!((lv.exp() - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_origin_is_uniform() {
        let mut v = [0.0; 4];
        let mut log_v = [0.0; 4];
        alr_to_simplex(&[0.0; 3], &mut v, &mut log_v);
        for p in v {
            assert!((p - 0.25).abs() < 1e-12);
        }
        assert!((log_jacobian(&log_v) - 4.0 * 0.25_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_coordinates_stay_finite() {
        let mut v = [0.0; 3];
        let mut log_v = [0.0; 3];
        alr_to_simplex(&[800.0, -800.0], &mut v, &mut log_v);
        assert!(log_v.iter().all(|l| l.is_finite()));
        assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((v[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_jacobian_matches_finite_difference() {
        // One free coordinate: v_0 = 1 / (1 + e^-y), dv_0/dy = v_0 v_1.
        let y = 0.7;
        let h = 1e-6;
        let mut v = [0.0; 2];
        let mut lv = [0.0; 2];
        alr_to_simplex(&[y + h], &mut v, &mut lv);
        let hi = v[0];
        alr_to_simplex(&[y - h], &mut v, &mut lv);
        let lo = v[0];
        alr_to_simplex(&[y], &mut v, &mut lv);
        let numeric = ((hi - lo) / (2.0 * h)).ln();
        assert!((numeric - log_jacobian(&lv)).abs() < 1e-6);
    }
}
