use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Time-ordered (oldest first) bars for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Bar `n` positions from the end; `from_back(1)` is the latest bar.
    pub fn from_back(&self, n: usize) -> Option<&Candle> {
        if n == 0 || n > self.candles.len() {
            return None;
        }
        self.candles.get(self.candles.len() - n)
    }

    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        CandleSeries::new(self.candles[start..].to_vec())
    }

    pub fn slice(&self, start: usize, end: usize) -> CandleSeries {
        let s = start.min(self.candles.len());
        let e = end.min(self.candles.len()).max(s);
        CandleSeries::new(self.candles[s..e].to_vec())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn highs_max(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn lows_min(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn all_finite(&self) -> bool {
        self.candles.iter().all(Candle::is_finite)
    }

    pub fn push(&mut self, candle: Candle) {
        self.candles.push(candle);
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.candles[index]
    }
}

impl IntoIterator for CandleSeries {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

impl FromIterator<Candle> for CandleSeries {
    fn from_iter<I: IntoIterator<Item = Candle>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::make_candles;

    #[test]
    fn from_back_indexes_latest_first() {
        let s = make_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 112.0, 104.0, 110.0),
        ]);
        assert!((s.from_back(1).unwrap().close - 110.0).abs() < 1e-9);
        assert!((s.from_back(3).unwrap().close - 102.0).abs() < 1e-9);
        assert!(s.from_back(0).is_none());
        assert!(s.from_back(4).is_none());
    }

    #[test]
    fn tail_and_slice_clamp_to_bounds() {
        let s = make_candles(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
        ]);
        assert_eq!(s.tail(10).len(), 2);
        assert_eq!(s.slice(1, 10).len(), 1);
        assert!(s.slice(5, 2).is_empty());
    }

    #[test]
    fn series_highs_max_lows_min() {
        let s = make_candles(&[
            (100.0, 200.0, 50.0, 150.0),
            (150.0, 300.0, 80.0, 250.0),
            (250.0, 280.0, 60.0, 270.0),
        ]);
        assert!((s.highs_max() - 300.0).abs() < 1e-9);
        assert!((s.lows_min() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_bar_is_detected() {
        let mut s = make_candles(&[(100.0, 105.0, 95.0, 102.0)]);
        assert!(s.all_finite());
        let mut bad = s[0].clone();
        bad.close = f64::NAN;
        s.push(bad);
        assert!(!s.all_finite());
    }
}
