//! Host-side pre-flight validation and cleaning.
//!
//! Every procedure runs through here before a program is generated. Each one declares
//! its [`Requirements`]; [`prepare`] returns the matrix that will actually be embedded
//! (with incomplete rows removed under [`NonFinitePolicy::DropRows`]).

use tracing::debug;

use crate::{data::DataMatrix, error::ValidationError};

/// What to do with NaN / infinite cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFinitePolicy {
    /// Fail with [`ValidationError::NonFiniteValue`] naming the first offending cell.
    Reject,
    /// Remove every row containing a non-finite cell, then check what remains.
    DropRows,
    /// Pass through as missing values; only all-missing columns are rejected.
    Tolerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub min_columns: usize,
    pub max_columns: Option<usize>,
    pub min_rows: usize,
    pub non_finite: NonFinitePolicy,
    pub require_variance: bool,
    /// Models that estimate one parameter per variable need n > p.
    pub more_rows_than_columns: bool,
}

impl Requirements {
    pub const fn new(min_columns: usize) -> Self {
        Self {
            min_columns,
            max_columns: None,
            min_rows: 1,
            non_finite: NonFinitePolicy::Reject,
            require_variance: true,
            more_rows_than_columns: false,
        }
    }

    pub const fn min_rows(mut self, n: usize) -> Self {
        self.min_rows = n;
        self
    }

    pub const fn max_columns(mut self, n: usize) -> Self {
        self.max_columns = Some(n);
        self
    }

    pub const fn non_finite(mut self, policy: NonFinitePolicy) -> Self {
        self.non_finite = policy;
        self
    }

    pub const fn allow_constant(mut self) -> Self {
        self.require_variance = false;
        self
    }

    pub const fn more_rows_than_columns(mut self) -> Self {
        self.more_rows_than_columns = true;
        self
    }
}

/// Basic check: non-empty, at least `min_columns` variables, every cell finite, no
/// constant column.
pub fn validate(matrix: &DataMatrix, min_columns: usize, label: &str) -> Result<(), ValidationError> {
    prepare(matrix, &Requirements::new(min_columns), label).map(|_| ())
}

/// Validate against `req` and return the matrix to embed.
pub fn prepare(
    matrix: &DataMatrix,
    req: &Requirements,
    label: &str,
) -> Result<DataMatrix, ValidationError> {
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(ValidationError::EmptyDataset { label: label.into() });
    }
    if matrix.ncols() < req.min_columns {
        return Err(ValidationError::InsufficientVariables {
            label: label.into(),
            required: req.min_columns,
            found: matrix.ncols(),
        });
    }
    if let Some(max) = req.max_columns {
        if matrix.ncols() > max {
            return Err(ValidationError::InvalidParameter {
                label: label.into(),
                name: "columns".into(),
                reason: format!("expected at most {max} variables, got {}", matrix.ncols()),
            });
        }
    }

    let cleaned = match req.non_finite {
        NonFinitePolicy::Reject => {
            if let Some((row, col)) = first_non_finite(matrix) {
                return Err(ValidationError::NonFiniteValue {
                    label: label.into(),
                    column: matrix.column_label(col),
                    row: row + 1,
                });
            }
            matrix.clone()
        }
        NonFinitePolicy::DropRows => {
            let (clean, dropped) = matrix.complete_rows();
            if dropped > 0 {
                debug!(label, dropped, kept = clean.nrows(), "dropped incomplete rows");
            }
            clean
        }
        NonFinitePolicy::Tolerate => {
            for j in 0..matrix.ncols() {
                if !matrix.rows().iter().any(|r| r[j].is_finite()) {
                    return Err(ValidationError::NonFiniteValue {
                        label: label.into(),
                        column: matrix.column_label(j),
                        row: 1,
                    });
                }
            }
            matrix.clone()
        }
    };

    let needed = if req.more_rows_than_columns {
        req.min_rows.max(cleaned.ncols() + 1)
    } else {
        req.min_rows
    };
    if cleaned.nrows() < needed {
        return Err(ValidationError::InsufficientObservations {
            label: label.into(),
            required: needed,
            found: cleaned.nrows(),
        });
    }

    if req.require_variance {
        if let Some(j) = (0..cleaned.ncols()).find(|&j| is_constant(&cleaned.column(j))) {
            return Err(ValidationError::ZeroVarianceColumn {
                label: label.into(),
                column: cleaned.column_label(j),
            });
        }
    }

    Ok(cleaned)
}

/// Validate one sample of a group comparison.
pub fn validate_sample(
    values: &[f64],
    name: &str,
    min_len: usize,
    label: &str,
) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::EmptyDataset { label: format!("{label} ({name})") });
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::NonFiniteValue {
            label: label.into(),
            column: name.into(),
            row: i + 1,
        });
    }
    if values.len() < min_len {
        return Err(ValidationError::InsufficientObservations {
            label: format!("{label} ({name})"),
            required: min_len,
            found: values.len(),
        });
    }
    Ok(())
}

/// Validate a set of independent groups: at least `min_groups`, each a valid sample,
/// and not all of them constant.
pub fn validate_groups(
    groups: &[Vec<f64>],
    min_groups: usize,
    min_len: usize,
    label: &str,
) -> Result<(), ValidationError> {
    if groups.len() < min_groups {
        return Err(ValidationError::InsufficientVariables {
            label: label.into(),
            required: min_groups,
            found: groups.len(),
        });
    }
    for (i, g) in groups.iter().enumerate() {
        validate_sample(g, &group_name(i), min_len, label)?;
    }
    if groups.iter().all(|g| is_constant(g)) {
        return Err(ValidationError::ZeroVarianceColumn {
            label: label.into(),
            column: "all groups".into(),
        });
    }
    Ok(())
}

/// Longest model description accepted.
pub const MAX_MODEL_LEN: usize = 10_000;

/// Check free-form model syntax before it is embedded as a string literal: non-empty,
/// bounded, no control characters besides line breaks and tabs, and containing at
/// least one of `operators`.
pub fn validate_model_syntax(
    model: &str,
    operators: &[&str],
    label: &str,
) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidParameter {
        label: label.into(),
        name: "model".into(),
        reason,
    };
    if model.trim().is_empty() {
        return Err(invalid("the model is empty".into()));
    }
    if model.chars().count() > MAX_MODEL_LEN {
        return Err(invalid(format!("longer than {MAX_MODEL_LEN} characters")));
    }
    if let Some(c) = model
        .chars()
        .find(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(invalid(format!("contains control character U+{:04X}", c as u32)));
    }
    if !operators.iter().any(|op| model.contains(op)) {
        return Err(invalid(format!("expected at least one of {}", operators.join(" "))));
    }
    Ok(())
}

pub(crate) fn group_name(i: usize) -> String {
    format!("group {}", i + 1)
}

fn first_non_finite(matrix: &DataMatrix) -> Option<(usize, usize)> {
    matrix.rows().iter().enumerate().find_map(|(i, row)| {
        row.iter().position(|v| !v.is_finite()).map(|j| (i, j))
    })
}

fn is_constant(values: &[f64]) -> bool {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    match finite.next() {
        None => true,
        Some(first) => finite.all(|v| v == first),
    }
}
