use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{EtlError, Result};

pub mod csv_io;

/// A single cell. Every column holds one kind of value plus missing markers.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
}

/// The uniform type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl Value {
    /// Missing markers and NaN floats both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Parse a raw cell as an integer first, then as a float.
    /// Returns `None` for anything that is not a usable number.
    pub fn parse_numeric(raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Some(Value::Integer(i));
        }
        match trimmed.parse::<f64>() {
            Ok(f) if !f.is_nan() => Some(Value::Float(f)),
            _ => None,
        }
    }

    /// Text form used in the CSV artifact: missing cells are empty fields.
    pub fn to_field(&self) -> String {
        match self {
            v if v.is_missing() => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => s.clone(),
            Value::Missing => String::new(),
        }
    }

    fn hash_tag(&self) -> u8 {
        match self {
            v if v.is_missing() => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Missing => 0,
        }
    }
}

/// Integral floats keep a trailing `.0` so the column reads back as floating point.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn canonical_bits(f: f64) -> u64 {
    if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_missing() || other.is_missing() {
            return self.is_missing() && other.is_missing();
        }
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_tag().hash(state);
        match self {
            v if v.is_missing() => {}
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => canonical_bits(*f).hash(state),
            Value::Text(s) => s.hash(state),
            Value::Missing => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            v if v.is_missing() => write!(f, "NaN"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => write!(f, "NaN"),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "int64",
            ColumnKind::Float => "float64",
            ColumnKind::Text => "text",
        };
        write!(f, "{name}")
    }
}

/// An ordered table: column order and row order are both significant.
///
/// Column names are unique and every row carries exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Create an empty dataset with the given header
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(EtlError::InvalidDataset(format!(
                    "duplicate column name '{name}'"
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut dataset = Self::new(columns)?;
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    /// Same header, no rows
    pub fn empty_like(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::InvalidDataset(format!(
                "row {} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, in row order
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    /// Kind of the column at `idx`. Columns with no rows report `Text`,
    /// entirely missing columns report `Float`.
    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        if self.rows.is_empty() {
            return ColumnKind::Text;
        }
        let mut all_integer = true;
        for cell in self.rows.iter().filter_map(|row| row.get(idx)) {
            match cell {
                Value::Text(_) => return ColumnKind::Text,
                Value::Integer(_) => {}
                _ => all_integer = false,
            }
        }
        if all_integer {
            ColumnKind::Integer
        } else {
            ColumnKind::Float
        }
    }

    pub fn column_kinds(&self) -> Vec<(String, ColumnKind)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), self.column_kind(idx)))
            .collect()
    }

    /// Same rows under a new header of equal width.
    pub fn with_columns(self, columns: Vec<String>) -> Result<Self> {
        if columns.len() != self.columns.len() {
            return Err(EtlError::InvalidDataset(format!(
                "header has {} names, dataset has {} columns",
                columns.len(),
                self.columns.len()
            )));
        }
        let renamed = Self::new(columns)?;
        Ok(Self {
            columns: renamed.columns,
            rows: self.rows,
        })
    }

    /// First `n` rows under the same header
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Replace every cell of the column at `idx` with `f(cell)`. Shape is preserved.
    pub fn map_column(mut self, idx: usize, mut f: impl FnMut(&Value) -> Value) -> Self {
        for cell in self.rows.iter_mut().filter_map(|row| row.get_mut(idx)) {
            *cell = f(cell);
        }
        self
    }
}

impl fmt::Display for Dataset {
    /// Index column on the left, right-aligned cells, header first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "Empty dataset");
        }
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(String::len)
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (name, width) in self.columns.iter().zip(widths.iter().copied()) {
            write!(f, "  {name:>width$}")?;
        }
        writeln!(f)?;
        if cells.is_empty() {
            return writeln!(f, "(0 rows)");
        }
        for (i, row) in cells.iter().enumerate() {
            write!(f, "{i:>index_width$}")?;
            for (cell, width) in row.iter().zip(widths.iter().copied()) {
                write!(f, "  {cell:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
