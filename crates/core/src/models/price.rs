use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::CoreError;

/// A single price data point (date → price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// Daily closing prices of one asset, strictly ascending by date.
///
/// A series may start later than its peers (the asset did not exist yet),
/// but once it starts there is one point per recorded date and no date
/// appears twice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting unsorted or duplicated dates.
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, CoreError> {
        let ticker = ticker.into();
        if let Some(pair) = points.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(CoreError::InvalidSeries(format!(
                "{ticker}: dates must be strictly ascending ({} followed by {})",
                pair[0].date, pair[1].date
            )));
        }
        Ok(Self { ticker, points })
    }

    /// Build a series from points in any order. Sorts by date and rejects duplicates.
    pub fn from_unsorted(
        ticker: impl Into<String>,
        mut points: Vec<PricePoint>,
    ) -> Result<Self, CoreError> {
        points.sort_by_key(|p| p.date);
        Self::new(ticker, points)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Price on an exact date. Binary search (O(log n)).
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].price)
    }

    /// Points with `from <= date <= to`.
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> &[PricePoint] {
        let start = self
            .points
            .binary_search_by_key(&from, |p| p.date)
            .unwrap_or_else(|pos| pos);
        let end = self
            .points
            .binary_search_by_key(&to, |p| p.date)
            .map(|pos| pos + 1)
            .unwrap_or_else(|pos| pos);
        if start >= end {
            return &[];
        }
        &self.points[start..end]
    }

    /// Same points under a different ticker.
    pub fn renamed(self, ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            points: self.points,
        }
    }
}

/// Price columns sharing one ascending date index.
///
/// Every column holds exactly one value per date of the index.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl PriceMatrix {
    /// Build a matrix from an index and columns, validating the shape.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, CoreError> {
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(CoreError::InvalidSeries(format!(
                "matrix index must be strictly ascending ({} followed by {})",
                pair[0], pair[1]
            )));
        }
        for (ticker, values) in &columns {
            if values.len() != dates.len() {
                return Err(CoreError::InvalidSeries(format!(
                    "column {ticker} has {} values for {} dates",
                    values.len(),
                    dates.len()
                )));
            }
        }
        Ok(Self { dates, columns })
    }

    /// Align series on the dates present in every one of them (inner join).
    pub fn align(series: &[PriceSeries]) -> Result<Self, CoreError> {
        let mut iter = series.iter();
        let Some(first) = iter.next() else {
            return Err(CoreError::InsufficientData(
                "no price series to align".into(),
            ));
        };

        let mut common: BTreeSet<NaiveDate> = first.dates().into_iter().collect();
        for s in iter {
            let dates: BTreeSet<NaiveDate> = s.dates().into_iter().collect();
            common = common.intersection(&dates).copied().collect();
        }

        let dates: Vec<NaiveDate> = common.into_iter().collect();
        let mut columns = BTreeMap::new();
        for s in series {
            if columns.contains_key(s.ticker()) {
                return Err(CoreError::InvalidSeries(format!(
                    "ticker {} appears twice",
                    s.ticker()
                )));
            }
            let values: Vec<f64> = s
                .range(
                    dates.first().copied().unwrap_or(NaiveDate::MIN),
                    dates.last().copied().unwrap_or(NaiveDate::MIN),
                )
                .iter()
                .filter(|p| dates.binary_search(&p.date).is_ok())
                .map(|p| p.price)
                .collect();
            columns.insert(s.ticker().to_string(), values);
        }

        Self::new(dates, columns)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.columns
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.columns.get(ticker).map(Vec::as_slice)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.columns.contains_key(ticker)
    }

    /// Number of dates in the index.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Extract one column as a standalone series.
    pub fn series(&self, ticker: &str) -> Result<PriceSeries, CoreError> {
        let values = self
            .column(ticker)
            .ok_or_else(|| CoreError::UnknownAsset(ticker.to_string()))?;
        let points = self
            .dates
            .iter()
            .zip(values)
            .map(|(&date, &price)| PricePoint { date, price })
            .collect();
        PriceSeries::new(ticker, points)
    }

    /// A matrix with only the requested columns, in the same date index.
    pub fn select(&self, tickers: &[&str]) -> Result<Self, CoreError> {
        let mut columns = BTreeMap::new();
        for ticker in tickers {
            let values = self
                .columns
                .get(*ticker)
                .ok_or_else(|| CoreError::UnknownAsset((*ticker).to_string()))?;
            columns.insert((*ticker).to_string(), values.clone());
        }
        Ok(Self {
            dates: self.dates.clone(),
            columns,
        })
    }

    /// Inner join of two matrices on their date index. Column names must not overlap.
    pub fn join(&self, other: &PriceMatrix) -> Result<Self, CoreError> {
        if let Some(dup) = other.tickers().find(|t| self.contains(t)) {
            return Err(CoreError::InvalidSeries(format!(
                "ticker {dup} appears in both matrices"
            )));
        }

        let mut dates = Vec::new();
        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for (i, date) in self.dates.iter().enumerate() {
            if let Ok(j) = other.dates.binary_search(date) {
                dates.push(*date);
                left_rows.push(i);
                right_rows.push(j);
            }
        }

        let mut columns = BTreeMap::new();
        for (ticker, values) in &self.columns {
            columns.insert(ticker.clone(), left_rows.iter().map(|&i| values[i]).collect());
        }
        for (ticker, values) in &other.columns {
            columns.insert(ticker.clone(), right_rows.iter().map(|&j| values[j]).collect());
        }
        Self::new(dates, columns)
    }

    /// Trailing rolling mean over `window` rows, counting partial windows at the start.
    pub fn rolling_mean(&self, window: usize) -> Self {
        if window <= 1 {
            return self.clone();
        }
        let columns = self
            .columns
            .iter()
            .map(|(ticker, values)| {
                let mut smoothed = Vec::with_capacity(values.len());
                let mut sum = 0.0;
                for (i, v) in values.iter().enumerate() {
                    sum += v;
                    if i >= window {
                        sum -= values[i - window];
                    }
                    let count = (i + 1).min(window);
                    smoothed.push(sum / count as f64);
                }
                (ticker.clone(), smoothed)
            })
            .collect();
        Self {
            dates: self.dates.clone(),
            columns,
        }
    }

    /// Rename columns per `aliases` (old → new). Unlisted columns keep their name.
    pub fn rename(self, aliases: &HashMap<String, String>) -> Result<Self, CoreError> {
        let mut columns = BTreeMap::new();
        for (ticker, values) in self.columns {
            let name = aliases.get(&ticker).cloned().unwrap_or(ticker);
            if columns.insert(name.clone(), values).is_some() {
                return Err(CoreError::InvalidSeries(format!(
                    "renaming produces duplicate ticker {name}"
                )));
            }
        }
        Ok(Self {
            dates: self.dates,
            columns,
        })
    }
}
