use serde::Serialize;

use super::check_len;
use crate::{
    error::DecodeError,
    execution::RValue,
    marshal::{Fields, Matrix, MatrixOrder},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChiSquareResult {
    pub row_variable: String,
    pub column_variable: String,
    pub chi_square: f64,
    pub df: f64,
    pub p_value: f64,
    pub cramers_v: f64,
    pub n: usize,
    pub row_levels: Vec<String>,
    pub column_levels: Vec<String>,
    /// Counts, rows are levels of the first variable.
    pub observed: Matrix,
    pub expected: Matrix,
    /// Cells with an expected count below 5.
    pub low_expected_cells: usize,
    /// Fisher's exact test, 2×2 tables only.
    pub fisher_p: Option<f64>,
}

pub(crate) fn decode(raw: &RValue) -> Result<ChiSquareResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let row_levels = f.texts("row_levels")?;
    let column_levels = f.texts("column_levels")?;
    let observed = f.matrix("observed", row_levels.len(), MatrixOrder::RowMajor)?;
    let expected = f.matrix("expected", row_levels.len(), MatrixOrder::RowMajor)?;
    check_len("observed", observed.ncols(), column_levels.len())?;
    check_len("expected", expected.ncols(), column_levels.len())?;

    Ok(ChiSquareResult {
        row_variable: f.text("row_variable")?,
        column_variable: f.text("column_variable")?,
        chi_square: f.number("chi_square")?,
        df: f.number("df")?,
        p_value: f.number("p_value")?,
        cramers_v: f.number("cramers_v")?,
        n: f.count("n")?,
        row_levels,
        column_levels,
        observed,
        expected,
        low_expected_cells: f.count("low_expected_cells")?,
        fisher_p: f.opt_number("fisher_p")?,
    })
}
