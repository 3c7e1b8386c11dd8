//! Decoding of the nested values R hands back.
//!
//! [`Fields`] is the name-indexed view over one returned named list. Lookups that
//! miss yield `None`; the typed accessors turn a miss into
//! [`DecodeError::MissingField`] so each decoder states which fields must exist.
//! Nested lists are not decoded automatically: callers wrap sub-values in a new
//! [`Fields`] (see [`Fields::nested`] and [`Fields::records`]).

use serde::Serialize;

use crate::{
    error::DecodeError,
    execution::{RValue, Scalar},
};

/// How a matrix was flattened before it crossed the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOrder {
    /// Row after row (`as.vector(t(m))` on the R side).
    RowMajor,
    /// Column after column (R's native `as.vector(m)`).
    ColumnMajor,
}

/// Dense matrix held row-major. Serializes as an array of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "Vec<Vec<f64>>")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }

    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for j in 0..self.cols {
            for i in 0..self.rows {
                data.push(self.get(i, j));
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }
}

impl From<Matrix> for Vec<Vec<f64>> {
    fn from(m: Matrix) -> Self {
        m.to_rows()
    }
}

/// Rebuild a `rows`-row matrix from `flat` read in `order`.
pub fn reshape(flat: &[f64], rows: usize, order: MatrixOrder, field: &str) -> Result<Matrix, DecodeError> {
    if rows == 0 || flat.len() % rows != 0 {
        return Err(DecodeError::DimensionMismatch {
            field: field.to_string(),
            len: flat.len(),
            rows,
        });
    }
    let cols = flat.len() / rows;
    let data = match order {
        MatrixOrder::RowMajor => flat.to_vec(),
        MatrixOrder::ColumnMajor => {
            let mut data = Vec::with_capacity(flat.len());
            for i in 0..rows {
                for j in 0..cols {
                    data.push(flat[j * rows + i]);
                }
            }
            data
        }
    };
    Ok(Matrix { rows, cols, data })
}

/// Inverse of [`reshape`] under the same `order`.
pub fn flatten(m: &Matrix, order: MatrixOrder) -> Vec<f64> {
    match order {
        MatrixOrder::RowMajor => m.data.clone(),
        MatrixOrder::ColumnMajor => m.transpose().data,
    }
}

/// Name-indexed view over a returned named list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a> {
    entries: &'a [(String, RValue)],
}

const EMPTY: &[(String, RValue)] = &[];

impl<'a> Fields<'a> {
    /// Decode the top-level value. Anything but a named list is a shape error.
    pub fn decode(raw: &'a RValue) -> Result<Self, DecodeError> {
        match raw {
            RValue::Record(entries) => Ok(Self { entries }),
            // An empty named list arrives as `[]`.
            other if other.is_empty() => Ok(Self { entries: EMPTY }),
            _ => Err(DecodeError::UnexpectedShape {
                field: "<result>".into(),
                expected: "a named list",
            }),
        }
    }

    /// Raw lookup; `None` when the name is absent.
    pub fn get(&self, name: &str) -> Option<&'a RValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .filter(|v| !matches!(v, RValue::Null))
    }

    fn require(&self, name: &str) -> Result<&'a RValue, DecodeError> {
        self.get(name)
            .ok_or_else(|| DecodeError::MissingField(name.to_string()))
    }

    /// Required numeric scalar. NA decodes as NaN.
    pub fn number(&self, name: &str) -> Result<f64, DecodeError> {
        match self.opt_number(name)? {
            Some(v) => Ok(v),
            None if self.get(name).is_some() => Ok(f64::NAN),
            None => Err(DecodeError::MissingField(name.to_string())),
        }
    }

    /// Optional numeric scalar: absent or NA both give `None`.
    pub fn opt_number(&self, name: &str) -> Result<Option<f64>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => match first_scalar(value, name)? {
                Scalar::Na => Ok(None),
                Scalar::Number(v) if v.is_nan() => Ok(None),
                s => s.as_f64().map(Some).ok_or_else(|| DecodeError::UnexpectedShape {
                    field: name.to_string(),
                    expected: "a number",
                }),
            },
        }
    }

    pub fn count(&self, name: &str) -> Result<usize, DecodeError> {
        let v = self.number(name)?;
        if v.is_finite() && v >= 0.0 {
            Ok(v.round() as usize)
        } else {
            Err(DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a non-negative count",
            })
        }
    }

    /// Required numeric vector; NA elements become NaN.
    pub fn numbers(&self, name: &str) -> Result<Vec<f64>, DecodeError> {
        match self.require(name)? {
            RValue::Vector(items) => items
                .iter()
                .map(|s| match s {
                    Scalar::Na => Ok(f64::NAN),
                    other => other.as_f64().ok_or_else(|| DecodeError::UnexpectedShape {
                        field: name.to_string(),
                        expected: "a numeric vector",
                    }),
                })
                .collect(),
            _ => Err(DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a numeric vector",
            }),
        }
    }

    pub fn text(&self, name: &str) -> Result<String, DecodeError> {
        first_scalar(self.require(name)?, name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a string",
            })
    }

    /// String vector; numbers are rendered so numeric factor levels survive.
    pub fn texts(&self, name: &str) -> Result<Vec<String>, DecodeError> {
        match self.require(name)? {
            RValue::Vector(items) => Ok(items
                .iter()
                .map(|s| match s {
                    Scalar::Text(t) => t.clone(),
                    Scalar::Number(n) => format!("{n}"),
                    Scalar::Logical(b) => b.to_string(),
                    Scalar::Na => "NA".to_string(),
                })
                .collect()),
            _ => Err(DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a character vector",
            }),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, DecodeError> {
        first_scalar(self.require(name)?, name)?
            .as_bool()
            .ok_or_else(|| DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a logical",
            })
    }

    /// Flat numeric field reshaped to `rows` rows under `order`.
    pub fn matrix(&self, name: &str, rows: usize, order: MatrixOrder) -> Result<Matrix, DecodeError> {
        reshape(&self.numbers(name)?, rows, order, name)
    }

    /// Sub-list as its own [`Fields`].
    pub fn nested(&self, name: &str) -> Result<Fields<'a>, DecodeError> {
        match self.require(name)? {
            RValue::Record(entries) => Ok(Fields { entries }),
            _ => Err(DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a named list",
            }),
        }
    }

    /// Unnamed list of named lists (one per row of a table). Empty when absent.
    pub fn records(&self, name: &str) -> Result<Vec<Fields<'a>>, DecodeError> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(RValue::List(items)) => items
                .iter()
                .map(|item| match item {
                    RValue::Record(entries) => Ok(Fields { entries }),
                    _ => Err(DecodeError::UnexpectedShape {
                        field: name.to_string(),
                        expected: "a list of named lists",
                    }),
                })
                .collect(),
            Some(v) if v.is_empty() => Ok(Vec::new()),
            Some(_) => Err(DecodeError::UnexpectedShape {
                field: name.to_string(),
                expected: "a list of named lists",
            }),
        }
    }
}

fn first_scalar<'v>(value: &'v RValue, name: &str) -> Result<&'v Scalar, DecodeError> {
    match value {
        RValue::Vector(items) => items.first().ok_or_else(|| DecodeError::MissingField(name.to_string())),
        _ => Err(DecodeError::UnexpectedShape {
            field: name.to_string(),
            expected: "a scalar",
        }),
    }
}
