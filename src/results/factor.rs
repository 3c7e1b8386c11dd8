use serde::Serialize;

use super::check_len;
use crate::{
    codegen::factor::{EfaParams, Extraction, Rotation},
    error::DecodeError,
    execution::RValue,
    marshal::{Fields, Matrix, MatrixOrder},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfaResult {
    pub n_factors: usize,
    pub n_observations: usize,
    pub rotation: Rotation,
    pub extraction: Extraction,
    pub variables: Vec<String>,
    /// Overall Kaiser-Meyer-Olkin measure of sampling adequacy.
    pub kmo: f64,
    pub kmo_per_item: Vec<f64>,
    pub bartlett_chi_square: f64,
    pub bartlett_df: f64,
    pub bartlett_p: f64,
    pub eigenvalues: Vec<f64>,
    /// Variables × factors.
    pub loadings: Matrix,
    pub communalities: Vec<f64>,
    pub uniquenesses: Vec<f64>,
    pub ss_loadings: Vec<f64>,
    pub proportion_variance: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
}

pub(crate) fn decode(raw: &RValue, params: &EfaParams) -> Result<EfaResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let variables = f.texts("variables")?;
    let n_factors = f.count("n_factors")?;
    let loadings = f.matrix("loadings", variables.len(), MatrixOrder::ColumnMajor)?;
    check_len("loadings", loadings.ncols(), n_factors)?;

    let ss_loadings = f.numbers("ss_loadings")?;
    check_len("ss_loadings", ss_loadings.len(), n_factors)?;
    let communalities = f.numbers("communalities")?;
    check_len("communalities", communalities.len(), variables.len())?;

    Ok(EfaResult {
        n_factors,
        n_observations: f.count("n_obs")?,
        rotation: params.rotation,
        extraction: params.extraction,
        kmo: f.number("kmo")?,
        kmo_per_item: f.numbers("kmo_per_item")?,
        bartlett_chi_square: f.number("bartlett_chisq")?,
        bartlett_df: f.number("bartlett_df")?,
        bartlett_p: f.number("bartlett_p")?,
        eigenvalues: f.numbers("eigenvalues")?,
        loadings,
        communalities,
        uniquenesses: f.numbers("uniquenesses")?,
        ss_loadings,
        proportion_variance: f.numbers("proportion_variance")?,
        cumulative_variance: f.numbers("cumulative_variance")?,
        variables,
    })
}
