use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Starting value of every simulated portfolio.
pub const INITIAL_INVESTMENT: f64 = 100.0;

/// Daily value of a simulated portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Date index of the matrix the simulation ran on
    pub dates: Vec<NaiveDate>,

    /// Portfolio value per date, starting at [`INITIAL_INVESTMENT`]
    pub values: Vec<f64>,
}

impl ValuationResult {
    /// Return on the initial investment per date (`value - 100`).
    pub fn roi(&self) -> Vec<f64> {
        self.values.iter().map(|v| v - INITIAL_INVESTMENT).collect()
    }

    pub fn final_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn final_roi(&self) -> Option<f64> {
        self.final_value().map(|v| v - INITIAL_INVESTMENT)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
