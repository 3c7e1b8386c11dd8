use serde::Serialize;

use crate::{
    codegen::correlation::CorrelationMethod,
    error::DecodeError,
    execution::RValue,
    marshal::{Fields, Matrix, MatrixOrder},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub method: CorrelationMethod,
    pub n_observations: usize,
    pub variables: Vec<String>,
    pub correlation_matrix: Matrix,
    /// Unadjusted two-sided p-values; the diagonal is 0.
    pub p_values: Matrix,
}

pub(crate) fn decode(raw: &RValue) -> Result<CorrelationResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let variables = f.texts("variables")?;
    let n = variables.len();
    let method = f
        .text("method")?
        .parse()
        .map_err(|_| DecodeError::UnexpectedShape {
            field: "method".into(),
            expected: "pearson or spearman",
        })?;
    Ok(CorrelationResult {
        method,
        n_observations: f.count("n_obs")?,
        correlation_matrix: f.matrix("r", n, MatrixOrder::RowMajor)?,
        p_values: f.matrix("p", n, MatrixOrder::RowMajor)?,
        variables,
    })
}
