//! Binary cross-entropy objective

/// Keeps the initial log-odds finite when one class is (almost) absent
const PROB_EPS: f64 = 1e-15;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Log-odds of the positive rate, the starting score of every row
pub fn init_score(labels: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let positive_rate = labels.iter().sum::<f64>() / labels.len() as f64;
    let p = positive_rate.clamp(PROB_EPS, 1.0 - PROB_EPS);
    (p / (1.0 - p)).ln()
}

/// Gradient and hessian of log-loss with respect to the raw score
/// gradient = p - y, hessian = p * (1 - p)
pub fn gradients_hessians(
    labels: &[f64],
    raw_scores: &[f64],
    gradients: &mut [f64],
    hessians: &mut [f64],
) {
    for (i, (&y, &raw)) in labels.iter().zip(raw_scores).enumerate() {
        let p = sigmoid(raw);
        gradients[i] = p - y;
        hessians[i] = p * (1.0 - p);
    }
}
