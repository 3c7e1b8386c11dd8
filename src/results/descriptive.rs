use serde::Serialize;

use super::check_len;
use crate::{error::DecodeError, execution::RValue, marshal::Fields};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub variable: String,
    pub mean: f64,
    pub sd: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub skew: Option<f64>,
    pub kurtosis: Option<f64>,
    pub standard_error: Option<f64>,
    pub n_valid: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveResult {
    /// Rows in the input, including those with missing cells.
    pub n: usize,
    pub columns: Vec<ColumnSummary>,
}

pub(crate) fn decode(raw: &RValue) -> Result<DescriptiveResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let variables = f.texts("variables")?;
    let records = f.records("columns")?;
    check_len("columns", records.len(), variables.len())?;

    let columns = variables
        .into_iter()
        .zip(&records)
        .map(|(variable, c)| {
            Ok(ColumnSummary {
                variable,
                mean: c.number("mean")?,
                sd: c.opt_number("sd")?,
                min: c.number("min")?,
                max: c.number("max")?,
                median: c.number("median")?,
                skew: c.opt_number("skew")?,
                kurtosis: c.opt_number("kurtosis")?,
                standard_error: c.opt_number("se")?,
                n_valid: c.count("n_valid")?,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;
    Ok(DescriptiveResult {
        n: f.count("n")?,
        columns,
    })
}
