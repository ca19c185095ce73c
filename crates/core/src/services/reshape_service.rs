use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use crate::models::table::{LongRow, LongTable, WideTable};

/// Converts between wide (column per entity) and long (row per observation) tables.
///
/// Pure transforms, no I/O.
pub struct ReshapeService;

impl ReshapeService {
    pub fn new() -> Self {
        Self
    }

    /// Melt a wide table into `(timestamp, entity, value)` rows.
    ///
    /// Every cell becomes a row, nulls included. Rows come out sorted by
    /// `(timestamp, entity)`.
    pub fn to_long(&self, wide: &WideTable, entity_column: &str, value_column: &str) -> LongTable {
        let mut rows = Vec::with_capacity(wide.index().len() * wide.columns().len());
        for (i, timestamp) in wide.index().iter().enumerate() {
            // BTreeMap iteration keeps entities sorted within a timestamp
            for (entity, values) in wide.columns() {
                rows.push(LongRow {
                    timestamp: *timestamp,
                    entity: entity.clone(),
                    value: values[i],
                });
            }
        }
        LongTable {
            entity_column: entity_column.to_string(),
            value_column: value_column.to_string(),
            rows,
        }
    }

    /// Pivot a long table back into a wide one.
    ///
    /// The index is the sorted set of timestamps, one column per entity.
    /// Pairs absent from the long table become nulls. A `(timestamp, entity)`
    /// pair appearing twice is rejected with `DuplicateKey`.
    pub fn to_wide(&self, long: &LongTable) -> Result<WideTable, CoreError> {
        let mut cells: BTreeMap<(NaiveDate, &str), Option<f64>> = BTreeMap::new();
        let mut index = BTreeSet::new();
        let mut entities = BTreeSet::new();

        for row in &long.rows {
            if cells
                .insert((row.timestamp, row.entity.as_str()), row.value)
                .is_some()
            {
                return Err(CoreError::DuplicateKey {
                    timestamp: row.timestamp,
                    entity: row.entity.clone(),
                });
            }
            index.insert(row.timestamp);
            entities.insert(row.entity.as_str());
        }

        let index: Vec<NaiveDate> = index.into_iter().collect();
        let columns = entities
            .into_iter()
            .map(|entity| {
                let values = index
                    .iter()
                    .map(|ts| cells.get(&(*ts, entity)).copied().flatten())
                    .collect();
                (entity.to_string(), values)
            })
            .collect();

        WideTable::new(index, columns)
    }
}

impl Default for ReshapeService {
    fn default() -> Self {
        Self::new()
    }
}
