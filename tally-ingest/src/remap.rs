//! Column remapping from a handler's raw names to the canonical schema.

use std::collections::BTreeMap;
use std::path::Path;

use tally_core::{Category, Classifier, Column, NO_CHECK_NUMBER, Transaction, Value};

use crate::error::{IngestError, Result};

/// Converted rows, still keyed by the source format's column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedTable {
    names: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ConvertedTable {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.names.len());
        self.rows.push(row);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of a raw column, if it exists.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| r[idx].clone()).collect())
    }
}

/// A column-major table holding every canonical column.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    len: usize,
    columns: BTreeMap<Column, Vec<Value>>,
}

impl Frame {
    /// Canonical columns, always [`Column::ALL`] in order.
    pub fn columns(&self) -> Vec<Column> {
        self.columns.keys().copied().collect()
    }

    pub fn column(&self, column: Column) -> &[Value] {
        self.columns.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell(&self, column: Column, row: usize) -> &Value {
        &self.columns[&column][row]
    }

    /// Overwrite a whole column with one value.
    pub fn fill(&mut self, column: Column, value: Value) {
        self.columns.insert(column, vec![value; self.len]);
    }

    /// Classify every row whose category is missing or `UNKNOWN` from its
    /// description.
    pub fn classify(&mut self, classifier: &Classifier) {
        let descriptions = self.column(Column::Description).to_vec();
        let Some(categories) = self.columns.get_mut(&Column::Category) else {
            return;
        };
        for (cat, desc) in categories.iter_mut().zip(descriptions) {
            let known = cat.as_category().filter(|c| !c.is_unknown());
            if known.is_none() {
                let text = desc.as_text().unwrap_or("");
                *cat = Value::Category(classifier.classify(text));
            }
        }
    }

    /// Lift the frame into typed rows.
    ///
    /// Date and amount were anchors during conversion, so a missing one here
    /// means the handler mapped them inconsistently. The `row` of such an
    /// error is the 1-based position among the rows kept after filtering,
    /// not a line of the source file.
    pub fn into_transactions(self, path: &Path) -> Result<Vec<Transaction>> {
        let mut out = Vec::with_capacity(self.len);
        for row in 0..self.len {
            let get = |c: Column| self.cell(c, row);
            let anchor_err = |c: Column| IngestError::AnchorField {
                path: path.to_path_buf(),
                row: row + 1,
                column: c.name().to_string(),
                raw: String::new(),
            };

            let date = get(Column::Date).as_date().ok_or_else(|| anchor_err(Column::Date))?;
            let amount = get(Column::Amount).as_money().ok_or_else(|| anchor_err(Column::Amount))?;

            out.push(Transaction {
                date,
                amount,
                description: get(Column::Description).as_text().unwrap_or("").to_string(),
                category: get(Column::Category).as_category().unwrap_or(Category::Unknown),
                check_no: get(Column::CheckNo).as_int().unwrap_or(NO_CHECK_NUMBER),
                bank: get(Column::Bank).as_text().unwrap_or("").to_string(),
                account: get(Column::Account)
                    .as_int()
                    .and_then(|a| u32::try_from(a).ok())
                    .unwrap_or(0),
                posted_balance: get(Column::PostedBalance).as_money(),
            });
        }
        Ok(out)
    }
}

/// Rename mapped raw columns to canonical ones, drop unmapped raw columns and
/// add every canonical column the source did not report as all-null.
pub fn remap(table: &ConvertedTable, mapping: &[(String, Column)]) -> Frame {
    let mut columns: BTreeMap<Column, Vec<Value>> = BTreeMap::new();
    for (raw, canonical) in mapping {
        if let Some(values) = table.column(raw) {
            columns.insert(*canonical, values);
        }
    }
    for column in Column::ALL {
        columns
            .entry(column)
            .or_insert_with(|| vec![Value::Null; table.len()]);
    }
    Frame {
        len: table.len(),
        columns,
    }
}
