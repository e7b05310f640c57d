//! Daily close-price history for a single ticker.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Chronologically ascending closes with unique dates.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Builds a series from points in any order. When a date repeats, the
    /// point that appeared last in `points` wins.
    pub fn new(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        // stable sort keeps input order within equal dates
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self {
            ticker: ticker.into(),
            points: deduped,
        }
    }

    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            points: Vec::new(),
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// (first date, last date, point count), or `None` for an empty series.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate, usize)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, self.points.len())),
            _ => None,
        }
    }

    /// Keeps only points on or after `start`.
    pub fn since(mut self, start: NaiveDate) -> Self {
        self.points.retain(|p| p.date >= start);
        self
    }
}
