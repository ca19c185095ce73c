use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::price::{PriceMatrix, PricePoint, PriceSeries};

/// Default minimum number of training rows for a regression fit.
pub const DEFAULT_MIN_TRAINING_ROWS: usize = 100;

/// Result of an imputation request.
#[derive(Debug)]
pub struct ImputedSeries {
    /// The target series, extended backwards with predicted points when imputed
    pub series: PriceSeries,

    /// Number of leading points that were predicted
    pub imputed_days: usize,

    /// Recovered problems: clamped dates (`DateRange`) and skipped fits
    /// (`InsufficientData`). Each one was also logged.
    pub warnings: Vec<CoreError>,
}

impl ImputedSeries {
    pub fn is_imputed(&self) -> bool {
        self.imputed_days > 0
    }

    fn unchanged(series: &PriceSeries, warnings: Vec<CoreError>) -> Self {
        Self {
            series: series.clone(),
            imputed_days: 0,
            warnings,
        }
    }
}

/// Fills in history for young assets with an OLS fit against reference assets.
pub struct SeriesImputer {
    min_training_rows: usize,
}

impl SeriesImputer {
    pub fn new(min_training_rows: usize) -> Self {
        Self { min_training_rows }
    }

    pub fn min_training_rows(&self) -> usize {
        self.min_training_rows
    }

    /// Extend `target` back to `start_date` using `reference` as regressors.
    ///
    /// The model is trained on reference rows in `[target.first, training_end_date)`
    /// that have a target value, and predicts every reference row in
    /// `[start_date, target.first)`. Predictions are clipped to two standard
    /// deviations around the training mean. Original target points are never
    /// modified.
    ///
    /// Date problems are clamped and too-small training sets leave the series
    /// unchanged; both are reported in [`ImputedSeries::warnings`]. Empty inputs
    /// fail with `InsufficientData`.
    pub fn impute(
        &self,
        reference: &PriceMatrix,
        target: &PriceSeries,
        start_date: NaiveDate,
        training_end_date: NaiveDate,
    ) -> Result<ImputedSeries, CoreError> {
        let (Some(x_first), Some(y_first), Some(y_last)) =
            (reference.first_date(), target.first_date(), target.last_date())
        else {
            return Err(CoreError::InsufficientData(format!(
                "cannot impute {}: reference or target series is empty",
                target.ticker()
            )));
        };
        let ticker = target.ticker();
        let mut warnings = Vec::new();

        let mut training_end = training_end_date;
        if training_end < y_first || training_end < x_first {
            let err = CoreError::DateRange(format!(
                "{ticker}: training end date {training_end} precedes available data, \
                 training on all data up to {y_last}"
            ));
            warn!("{err}");
            warnings.push(err);
            training_end = y_last;
        }

        let mut start = start_date;
        if start < x_first {
            let err = CoreError::DateRange(format!(
                "{ticker}: impute start date {start} precedes reference data, using {x_first}"
            ));
            warn!("{err}");
            warnings.push(err);
            start = x_first;
        }

        if y_first <= start {
            return Ok(ImputedSeries::unchanged(target, warnings));
        }

        let mut train_rows = Vec::new();
        let mut labels = Vec::new();
        for (row, date) in reference.dates().iter().enumerate() {
            if *date >= y_first && *date < training_end {
                if let Some(label) = target.get(*date) {
                    train_rows.push(row);
                    labels.push(label);
                }
            }
        }

        if train_rows.len() < self.min_training_rows {
            let err = CoreError::InsufficientData(format!(
                "{ticker}: {} training rows, at least {} required; not imputing",
                train_rows.len(),
                self.min_training_rows
            ));
            warn!("{err}");
            warnings.push(err);
            return Ok(ImputedSeries::unchanged(target, warnings));
        }

        let test_rows: Vec<usize> = reference
            .dates()
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d < y_first)
            .map(|(row, _)| row)
            .collect();

        let columns: Vec<&[f64]> = reference.columns().values().map(Vec::as_slice).collect();
        let coefficients = fit_ols(&columns, &train_rows, &labels)?;

        let n = labels.len() as f64;
        let mean = labels.iter().sum::<f64>() / n;
        let std = (labels.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n).sqrt();
        if !(mean.is_finite() && std.is_finite()) {
            return Err(CoreError::Regression(format!(
                "{ticker}: training labels contain non-finite values"
            )));
        }
        let (low, high) = (mean - 2.0 * std, mean + 2.0 * std);

        let mut points: Vec<PricePoint> = test_rows
            .iter()
            .map(|&row| {
                let predicted = coefficients[0]
                    + columns
                        .iter()
                        .enumerate()
                        .map(|(c, col)| coefficients[c + 1] * col[row])
                        .sum::<f64>();
                PricePoint {
                    date: reference.dates()[row],
                    price: predicted.clamp(low, high),
                }
            })
            .collect();
        let imputed_days = points.len();
        points.extend_from_slice(target.points());

        debug!(
            ticker,
            training_rows = train_rows.len(),
            imputed_days,
            "imputed leading history"
        );

        Ok(ImputedSeries {
            series: PriceSeries::new(ticker, points)?,
            imputed_days,
            warnings,
        })
    }
}

impl Default for SeriesImputer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TRAINING_ROWS)
    }
}

/// Least-squares fit with intercept. Returns `[intercept, beta_1, .., beta_k]`.
fn fit_ols(columns: &[&[f64]], rows: &[usize], labels: &[f64]) -> Result<Vec<f64>, CoreError> {
    let k = columns.len();
    let design = DMatrix::from_fn(rows.len(), k + 1, |r, c| {
        if c == 0 {
            1.0
        } else {
            columns[c - 1][rows[r]]
        }
    });
    let y = DVector::from_column_slice(labels);

    // Singular values below the usual rank tolerance are treated as zero,
    // so collinear regressors get a minimum-norm solution.
    let tolerance = rows.len().max(k + 1) as f64 * f64::EPSILON;
    let svd = design.svd(true, true);
    let max_singular = svd.singular_values.max();
    let beta = svd
        .solve(&y, max_singular * tolerance)
        .map_err(|e| CoreError::Regression(e.to_string()))?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(CoreError::Regression(
            "least squares produced non-finite coefficients".into(),
        ));
    }
    Ok(beta.iter().copied().collect())
}
