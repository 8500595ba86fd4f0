use serde::Serialize;

use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn as_label(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(value.to_string()),
            Self::Real(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
            Self::Blob(bytes) => Some(bytes.iter().map(|byte| format!("{byte:02x}")).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, EvalError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EvalError::invalid_input(format!(
                "row {index} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_labels(&self) -> Vec<String> {
        let mut labels = Vec::<String>::with_capacity(self.columns.len());
        for column in &self.columns {
            if !labels.contains(column) {
                labels.push(column.clone());
            }
        }
        labels
    }

    pub fn distinct_values(&self, column: &str) -> Result<Vec<String>, EvalError> {
        let index = self.column_index(column).ok_or_else(|| {
            EvalError::invalid_input(format!("table has no column named `{column}`"))
        })?;

        let mut seen = std::collections::HashSet::<String>::new();
        let mut values = Vec::<String>::new();
        for row in &self.rows {
            if let Some(label) = row[index].as_label() {
                if seen.insert(label.clone()) {
                    values.push(label);
                }
            }
        }
        Ok(values)
    }
}
