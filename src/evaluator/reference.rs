use tracing::{info, warn};

use crate::error::EvalError;
use crate::harness::QueryEngine;
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    table: Table,
    event_column: String,
    column_labels: Vec<String>,
    event_labels: Vec<String>,
}

impl ReferenceDataset {
    pub fn from_table(table: Table, event_column: &str) -> Result<Self, EvalError> {
        if !table.has_column(event_column) {
            return Err(EvalError::configuration(format!(
                "reference dataset has no event column `{event_column}` (columns: {})",
                table.columns().join(", ")
            )));
        }

        let column_labels = table.column_labels();
        let event_labels = table.distinct_values(event_column)?;
        Ok(Self {
            table,
            event_column: event_column.to_string(),
            column_labels,
            event_labels,
        })
    }

    pub fn load(engine: &dyn QueryEngine, query: &str, event_column: &str) -> Result<Self, EvalError> {
        let table = engine.execute(query)?;
        let dataset = Self::from_table(table, event_column)?;
        if dataset.event_labels.is_empty() {
            warn!(
                event_column = %dataset.event_column,
                "reference event column has no values; event comparisons will be rejected"
            );
        }
        info!(
            rows = dataset.row_count(),
            columns = dataset.column_labels.len(),
            events = dataset.event_labels.len(),
            event_column = %dataset.event_column,
            "reference dataset loaded"
        );
        Ok(dataset)
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn event_column(&self) -> &str {
        &self.event_column
    }

    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    pub fn event_labels(&self) -> &[String] {
        &self.event_labels
    }
}
