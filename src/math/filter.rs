//! Centered moving-average filters.

/// Weights of the centered moving average for a seasonal `period`.
///
/// Odd periods use a plain `period`-wide mean. Even periods use the `2×period`
/// filter: `period + 1` taps with half weight on both ends, so the window stays
/// centered on an observation.
pub fn centered_weights(period: usize) -> Vec<f64> {
    let p = period as f64;
    if period % 2 == 0 {
        let mut w = vec![1.0 / p; period + 1];
        w[0] = 0.5 / p;
        w[period] = 0.5 / p;
        w
    } else {
        vec![1.0 / p; period]
    }
}

/// Apply a centered filter; positions where the window does not fit are `None`.
pub fn centered_convolve(values: &[f64], weights: &[f64]) -> Vec<Option<f64>> {
    let n = values.len();
    let half = weights.len() / 2;
    let mut out = vec![None; n];
    if weights.is_empty() || n < weights.len() {
        return out;
    }
    for (i, slot) in out.iter_mut().enumerate().take(n - half).skip(half) {
        let window = &values[i - half..i - half + weights.len()];
        *slot = Some(window.iter().zip(weights).map(|(v, w)| v * w).sum());
    }
    out
}
