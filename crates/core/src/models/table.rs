use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CoreError;

use super::price::PriceMatrix;

/// Date-indexed table with one nullable column per entity ("wide" layout).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "WideTableFields")]
pub struct WideTable {
    index: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

/// Unchecked wire form of [`WideTable`].
#[derive(Deserialize)]
struct WideTableFields {
    index: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl TryFrom<WideTableFields> for WideTable {
    type Error = CoreError;

    fn try_from(fields: WideTableFields) -> Result<Self, Self::Error> {
        Self::new(fields.index, fields.columns)
    }
}

impl WideTable {
    /// Build a table, validating an ascending unique index and column lengths.
    pub fn new(
        index: Vec<NaiveDate>,
        columns: BTreeMap<String, Vec<Option<f64>>>,
    ) -> Result<Self, CoreError> {
        if let Some(pair) = index.windows(2).find(|w| w[0] >= w[1]) {
            return Err(CoreError::InvalidSeries(format!(
                "table index must be strictly ascending ({} followed by {})",
                pair[0], pair[1]
            )));
        }
        if let Some((name, col)) = columns.iter().find(|(_, c)| c.len() != index.len()) {
            return Err(CoreError::InvalidSeries(format!(
                "column {name} has {} values for {} index entries",
                col.len(),
                index.len()
            )));
        }
        Ok(Self { index, columns })
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<Option<f64>>> {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}

impl From<&PriceMatrix> for WideTable {
    fn from(matrix: &PriceMatrix) -> Self {
        Self {
            index: matrix.dates().to_vec(),
            columns: matrix
                .columns()
                .iter()
                .map(|(t, v)| (t.clone(), v.iter().copied().map(Some).collect()))
                .collect(),
        }
    }
}

impl TryFrom<&WideTable> for PriceMatrix {
    type Error = CoreError;

    /// Fails if any cell is null: a price matrix has no gaps.
    fn try_from(table: &WideTable) -> Result<Self, Self::Error> {
        let mut columns = BTreeMap::new();
        for (name, values) in &table.columns {
            let filled: Option<Vec<f64>> = values.iter().copied().collect();
            let filled = filled.ok_or_else(|| {
                CoreError::InsufficientData(format!("column {name} contains missing values"))
            })?;
            columns.insert(name.clone(), filled);
        }
        PriceMatrix::new(table.index.clone(), columns)
    }
}

/// One `(timestamp, entity, value)` row of a long table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    pub timestamp: NaiveDate,
    pub entity: String,
    pub value: Option<f64>,
}

/// Row-per-observation table ("long" layout).
///
/// `entity_column` and `value_column` name the two non-timestamp columns the
/// way they are stored (e.g., "asset_ticker" and "closing_price").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    pub entity_column: String,
    pub value_column: String,
    pub rows: Vec<LongRow>,
}

impl LongTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
