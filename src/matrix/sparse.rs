//! Sparse matrices with row and column labels attached

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{LciError, Result};

/// One stored cell, addressed by labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub row: String,
    pub col: String,
    pub value: f64,
}

/// Coordinate-format matrix with labelled axes.
///
/// Absent cells are structural zeros. A column whose normalizing divisor
/// was zero or missing is marked undefined: every cell of it reads as NaN
/// until [`LabelledMatrix::replace_undefined`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledMatrix {
    name: String,
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    row_index: FxHashMap<String, usize>,
    col_index: FxHashMap<String, usize>,
    entries: BTreeMap<(usize, usize), f64>,
    undefined_cols: BTreeSet<usize>,
}

impl LabelledMatrix {
    /// Create an empty matrix; labels must be unique per axis
    pub fn new(name: impl Into<String>, row_labels: Vec<String>, col_labels: Vec<String>) -> Result<Self> {
        let name = name.into();
        let row_index = index_labels(&name, "row", &row_labels)?;
        let col_index = index_labels(&name, "column", &col_labels)?;
        Ok(Self {
            name,
            row_labels,
            col_labels,
            row_index,
            col_index,
            entries: BTreeMap::new(),
            undefined_cols: BTreeSet::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    #[must_use]
    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    /// Number of stored cells
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn row_position(&self, label: &str) -> Option<usize> {
        self.row_index.get(label).copied()
    }

    #[must_use]
    pub fn col_position(&self, label: &str) -> Option<usize> {
        self.col_index.get(label).copied()
    }

    /// Add `value` to the cell at (`row`, `col`)
    pub fn add(&mut self, row: &str, col: &str, value: f64) -> Result<()> {
        let (r, c) = self.position(row, col)?;
        self.add_at(r, c, value);
        Ok(())
    }

    pub fn add_at(&mut self, row: usize, col: usize, value: f64) {
        *self.entries.entry((row, col)).or_insert(0.0) += value;
    }

    pub fn set_at(&mut self, row: usize, col: usize, value: f64) {
        self.entries.insert((row, col), value);
    }

    /// Value of a cell; NaN in undefined columns, 0.0 when not stored
    #[must_use]
    pub fn get_at(&self, row: usize, col: usize) -> f64 {
        if self.undefined_cols.contains(&col) {
            return f64::NAN;
        }
        self.entries.get(&(row, col)).copied().unwrap_or(0.0)
    }

    /// Value of a cell addressed by labels
    #[must_use]
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let (r, c) = self.position(row, col).ok()?;
        Some(self.get_at(r, c))
    }

    /// Stored cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.entries.iter().map(|(&(r, c), &v)| (r, c, v))
    }

    /// Stored cells addressed by labels, in row-major order
    #[must_use]
    pub fn triplets(&self) -> Vec<Triplet> {
        self.iter()
            .map(|(r, c, value)| Triplet {
                row: self.row_labels[r].clone(),
                col: self.col_labels[c].clone(),
                value,
            })
            .collect()
    }

    /// Cells as read through [`LabelledMatrix::get_at`]: stored cells of
    /// defined columns plus every cell of undefined columns as NaN
    #[must_use]
    pub fn cells(&self) -> Vec<(usize, usize, f64)> {
        let mut cells: Vec<(usize, usize, f64)> = self
            .iter()
            .filter(|(_, c, _)| !self.undefined_cols.contains(c))
            .collect();
        for &c in &self.undefined_cols {
            cells.extend((0..self.row_labels.len()).map(|r| (r, c, f64::NAN)));
        }
        cells.sort_by_key(|&(r, c, _)| (r, c));
        cells
    }

    /// Rewrite every stored cell in place
    pub fn map_values(&mut self, mut f: impl FnMut(usize, usize, f64) -> f64) {
        for (&(r, c), value) in &mut self.entries {
            *value = f(r, c, *value);
        }
    }

    /// Mark a column undefined
    pub fn mark_undefined(&mut self, col: usize) {
        self.undefined_cols.insert(col);
    }

    pub fn undefined_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.undefined_cols.iter().copied()
    }

    /// True if any cell reads as NaN
    #[must_use]
    pub fn has_undefined(&self) -> bool {
        (!self.undefined_cols.is_empty() && !self.row_labels.is_empty())
            || self.entries.values().any(|v| v.is_nan())
    }

    /// Replace every undefined cell by `value`. Undefined columns become
    /// plain columns and NaN cells are overwritten.
    pub fn replace_undefined(&mut self, value: f64) {
        let undefined = std::mem::take(&mut self.undefined_cols);
        for col in undefined {
            self.entries.retain(|&(_, c), _| c != col);
            if value != 0.0 {
                for row in 0..self.row_labels.len() {
                    self.entries.insert((row, col), value);
                }
            }
        }
        if value == 0.0 {
            self.entries.retain(|_, v| !v.is_nan());
        } else {
            for v in self.entries.values_mut().filter(|v| v.is_nan()) {
                *v = value;
            }
        }
    }

    /// Dense row-major copy
    #[must_use]
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let (rows, cols) = self.shape();
        let mut dense = vec![vec![0.0; cols]; rows];
        for (r, c, v) in self.iter() {
            dense[r][c] = v;
        }
        for &c in &self.undefined_cols {
            for row in &mut dense {
                row[c] = f64::NAN;
            }
        }
        dense
    }

    /// Copy with the same labels and stored cells under a new name
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    fn position(&self, row: &str, col: &str) -> Result<(usize, usize)> {
        let r = self.row_position(row).ok_or_else(|| {
            LciError::Matrix(format!("'{row}' is not a row of {}", self.name))
        })?;
        let c = self.col_position(col).ok_or_else(|| {
            LciError::Matrix(format!("'{col}' is not a column of {}", self.name))
        })?;
        Ok((r, c))
    }
}

fn index_labels(name: &str, axis: &str, labels: &[String]) -> Result<FxHashMap<String, usize>> {
    let mut index = FxHashMap::default();
    for (i, label) in labels.iter().enumerate() {
        if index.insert(label.clone(), i).is_some() {
            return Err(LciError::Matrix(format!(
                "duplicate {axis} label '{label}' in {name}"
            )));
        }
    }
    Ok(index)
}
