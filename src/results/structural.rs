use serde::Serialize;

use super::{check_len, each};
use crate::{
    codegen::structural::ModelKind, error::DecodeError, execution::RValue, marshal::Fields,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitMeasures {
    pub chisq: Option<f64>,
    pub df: Option<f64>,
    pub pvalue: Option<f64>,
    pub cfi: Option<f64>,
    pub tli: Option<f64>,
    pub rmsea: Option<f64>,
    pub rmsea_lower: Option<f64>,
    pub rmsea_upper: Option<f64>,
    pub srmr: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
}

/// One row of lavaan's parameter table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEstimate {
    pub lhs: String,
    pub op: String,
    pub rhs: String,
    pub est: f64,
    pub se: Option<f64>,
    pub z: Option<f64>,
    pub pvalue: Option<f64>,
    pub std_all: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RSquared {
    pub variable: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralResult {
    pub kind: ModelKind,
    pub n_observations: usize,
    pub fit_measures: FitMeasures,
    /// CFI/TLI were computed from a baseline model rather than reported by lavaan.
    pub fit_approximated: bool,
    pub estimates: Vec<ParameterEstimate>,
    pub r_squared: Vec<RSquared>,
}

pub(crate) fn decode(raw: &RValue, kind: ModelKind) -> Result<StructuralResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let fit = f.nested("fit")?;
    let fit_measures = FitMeasures {
        chisq: fit.opt_number("chisq")?,
        df: fit.opt_number("df")?,
        pvalue: fit.opt_number("pvalue")?,
        cfi: fit.opt_number("cfi")?,
        tli: fit.opt_number("tli")?,
        rmsea: fit.opt_number("rmsea")?,
        rmsea_lower: fit.opt_number("rmsea_lower")?,
        rmsea_upper: fit.opt_number("rmsea_upper")?,
        srmr: fit.opt_number("srmr")?,
        aic: fit.opt_number("aic")?,
        bic: fit.opt_number("bic")?,
    };

    let estimates = each(&f, "estimates", |e| {
        Ok(ParameterEstimate {
            lhs: e.text("lhs")?,
            op: e.text("op")?,
            rhs: e.text("rhs")?,
            est: e.number("est")?,
            se: e.opt_number("se")?,
            z: e.opt_number("z")?,
            pvalue: e.opt_number("pvalue")?,
            std_all: e.opt_number("std_all")?,
        })
    })?;

    let names = f.texts("r_squared_names")?;
    let values = f.numbers("r_squared")?;
    check_len("r_squared", values.len(), names.len())?;
    let r_squared = names
        .into_iter()
        .zip(values)
        .map(|(variable, value)| RSquared { variable, value })
        .collect();

    Ok(StructuralResult {
        kind,
        n_observations: f.count("n_obs")?,
        fit_measures,
        fit_approximated: f.flag("fit_approximated")?,
        estimates,
        r_squared,
    })
}
