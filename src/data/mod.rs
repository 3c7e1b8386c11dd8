//! Numeric input data: the rectangular matrix every procedure consumes.

use crate::error::ValidationError;

/// Rectangular, non-empty table of numbers stored row by row.
///
/// Non-finite cells are allowed here; whether they are rejected, dropped or treated
/// as missing is a per-procedure decision made by [`crate::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataMatrix {
    rows: Vec<Vec<f64>>,
    ncols: usize,
    names: Vec<String>,
}

impl DataMatrix {
    /// Build from rows; every row must have the same, non-zero length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        let label = "data";
        let ncols = match rows.first() {
            None => return Err(ValidationError::EmptyDataset { label: label.into() }),
            Some(first) if first.is_empty() => {
                return Err(ValidationError::EmptyDataset { label: label.into() })
            }
            Some(first) => first.len(),
        };
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(ValidationError::RaggedRows {
                label: label.into(),
                row: i + 1,
                expected: ncols,
                found: row.len(),
            });
        }
        let names = default_names(ncols);
        Ok(Self { rows, ncols, names })
    }

    /// Build from columns of equal length.
    pub fn from_columns(columns: Vec<Vec<f64>>) -> Result<Self, ValidationError> {
        let nrows = columns.first().map(Vec::len).unwrap_or(0);
        if let Some((j, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != nrows) {
            return Err(ValidationError::LengthMismatch {
                label: "data".into(),
                left: "column 1".into(),
                left_len: nrows,
                right: format!("column {}", j + 1),
                right_len: col.len(),
            });
        }
        let rows = (0..nrows)
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect();
        Self::from_rows(rows)
    }

    /// Attach column names; the count must match the column count.
    pub fn with_names<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self, ValidationError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != self.ncols {
            return Err(ValidationError::LengthMismatch {
                label: "data".into(),
                left: "column names".into(),
                left_len: names.len(),
                right: "columns".into(),
                right_len: self.ncols,
            });
        }
        self.names = names;
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }

    /// Human label for column `j`, used in error messages.
    pub fn column_label(&self, j: usize) -> String {
        self.names
            .get(j)
            .cloned()
            .unwrap_or_else(|| format!("column {}", j + 1))
    }

    /// Values in row-major order.
    pub fn flat(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().flat_map(|r| r.iter().copied())
    }

    /// Copy keeping only rows where every cell is finite. Returns the copy and the
    /// number of dropped rows. May leave zero rows.
    pub fn complete_rows(&self) -> (Self, usize) {
        let kept: Vec<Vec<f64>> = self
            .rows
            .iter()
            .filter(|r| r.iter().all(|v| v.is_finite()))
            .cloned()
            .collect();
        let dropped = self.rows.len() - kept.len();
        (
            Self {
                rows: kept,
                ncols: self.ncols,
                names: self.names.clone(),
            },
            dropped,
        )
    }

    /// Copy with every cell passed through `f`.
    pub fn map(&self, f: impl Fn(usize, f64) -> f64) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|r| r.iter().enumerate().map(|(j, &v)| f(j, v)).collect())
            .collect();
        Self {
            rows,
            ncols: self.ncols,
            names: self.names.clone(),
        }
    }
}

fn default_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("V{i}")).collect()
}

/// Declared bounds of a rating scale (e.g. a 1–5 Likert item).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min < max).then_some(Self { min, max })
    }

    /// Clamp into the scale; non-finite values pass through untouched.
    pub fn clamp(&self, v: f64) -> f64 {
        if v.is_finite() {
            v.clamp(self.min, self.max)
        } else {
            v
        }
    }
}
