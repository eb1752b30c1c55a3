//! In-memory tabular data
//!
//! Tables are loaded once by the store and never mutated afterwards. Every
//! query derives new, request-scoped tables from them.
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, Result};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the value. Booleans count as 1/0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Null | Scalar::Str(_) => None,
        }
    }

    /// Integer view, accepting floats that hold a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Bool(b) => Some(i64::from(*b)),
            Scalar::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Equality used by filters: numbers compare by value across
    /// int/float/bool, strings compare exactly, null matches nothing.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => false,
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Str(_), _) | (_, Scalar::Str(_)) => false,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Whole-number floats collapse to ints so `2001.0` groups with `2001`.
    pub(crate) fn normalized(&self) -> Scalar {
        match self {
            Scalar::Float(f) if f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15 => {
                Scalar::Int(*f as i64)
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Ordered rows sharing one column schema
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Arc<Vec<String>>,
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        Self::with_schema(Arc::new(columns), rows)
    }

    pub(crate) fn with_schema(columns: Arc<Vec<String>>, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(AppError::SchemaMismatch(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Same schema, no rows
    pub fn empty_like(&self) -> Self {
        Self {
            columns: Arc::clone(&self.columns),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn schema(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, `SchemaMismatch` if absent
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| {
                AppError::SchemaMismatch(format!(
                    "column '{}' not found (available: {})",
                    name,
                    self.columns.join(", ")
                ))
            })
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.column_index(name)?;
        }
        Ok(())
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    /// Values of one column, in row order
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &Scalar>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |r| &r[idx]))
    }
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Scalar],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Scalar> {
        let values = self.values;
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(move |idx| values.get(idx))
    }
}
