//! Numeric helpers shared by the strategies and classifiers.
//!
//! Every function here degrades to a neutral value instead of producing
//! NaN or panicking on short or flat input.

/// Neutral RSI reading, used when gains and losses are both absent.
pub const RSI_NEUTRAL: f64 = 50.0;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Mean of the last `period` values, if there are that many.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(mean(&values[values.len() - period..]))
}

/// Relative Strength Index, one value per input bar.
///
/// Gains and losses are averaged over a rolling `period`-change window:
/// `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`. Bars without a full window
/// read 50, a window with neither gains nor losses reads 50, and a window
/// with gains but no losses reads 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![RSI_NEUTRAL; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    for i in period..closes.len() {
        // changes[k] is the move into bar k + 1
        let window = &changes[i - period..i];
        if window.iter().any(|c| !c.is_finite()) {
            continue;
        }
        let avg_gain = window.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
        let avg_loss = -window.iter().filter(|c| **c < 0.0).sum::<f64>() / period as f64;

        out[i] = if avg_loss == 0.0 && avg_gain == 0.0 {
            RSI_NEUTRAL
        } else if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
    }
    out
}

/// Latest RSI reading, neutral when the series is too short.
pub fn last_rsi(closes: &[f64], period: usize) -> f64 {
    rsi(closes, period).last().copied().unwrap_or(RSI_NEUTRAL)
}

/// Pearson correlation. Zero when lengths differ or either side is flat.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let ma = mean(a);
    let mb = mean(b);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - ma;
        let dy = y - mb;
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }
    let denom = (va * vb).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Simple bar-over-bar returns. A zero previous close yields a zero return.
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { (w[1] - w[0]) / w[0] })
        .collect()
}

/// Guarded division.
pub fn ratio(num: f64, denom: f64) -> Option<f64> {
    if denom == 0.0 || !denom.is_finite() || !num.is_finite() {
        None
    } else {
        Some(num / denom)
    }
}
