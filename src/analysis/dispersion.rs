/// Dispersion assigned to teams without votes. Sorts after every real
/// dispersion: scores are `u8`, so a population standard deviation never
/// exceeds 127.5. Finite and exact in decimal so payloads round-trip.
pub const DISPERSION_SENTINEL: f64 = 1.0e9;

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    total as f64 / scores.len() as f64
}

/// Population standard deviation, or `DISPERSION_SENTINEL` when there are no scores.
pub fn population_std_dev(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return DISPERSION_SENTINEL;
    }
    let avg = mean(scores);
    let variance = scores
        .iter()
        .map(|&s| {
            let diff = f64::from(s) - avg;
            diff * diff
        })
        .sum::<f64>()
        / scores.len() as f64;
    variance.sqrt()
}
