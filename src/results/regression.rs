use serde::Serialize;

use super::{check_len, each};
use crate::{error::DecodeError, execution::RValue, marshal::Fields};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFit {
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub df_model: f64,
    pub df_residual: f64,
    pub p_value: f64,
    pub residual_standard_error: f64,
    pub durbin_watson: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
    /// Absent for the intercept.
    pub standardized_beta: Option<f64>,
    /// Absent for the intercept; capped at [`VIF_CEILING`](crate::codegen::regression::VIF_CEILING).
    pub vif: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionChart {
    pub observed: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionResult {
    pub dependent: String,
    pub n_observations: usize,
    pub model_fit: ModelFit,
    pub coefficients: Vec<Coefficient>,
    pub equation: String,
    pub chart: RegressionChart,
}

pub(crate) fn decode(raw: &RValue) -> Result<RegressionResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let dependent = f.text("dependent")?;
    let coefficients = each(&f, "coefficients", |c| {
        Ok(Coefficient {
            term: c.text("term")?,
            estimate: c.number("estimate")?,
            std_error: c.number("std_error")?,
            t_value: c.number("t_value")?,
            p_value: c.number("p_value")?,
            standardized_beta: c.opt_number("std_beta")?,
            vif: c.opt_number("vif")?,
        })
    })?;
    if coefficients.is_empty() {
        return Err(DecodeError::MissingField("coefficients".into()));
    }

    let chart = RegressionChart {
        observed: f.numbers("observed")?,
        fitted: f.numbers("fitted")?,
        residuals: f.numbers("residuals")?,
    };
    check_len("fitted", chart.fitted.len(), chart.observed.len())?;
    check_len("residuals", chart.residuals.len(), chart.observed.len())?;

    Ok(RegressionResult {
        n_observations: f.count("n_obs")?,
        model_fit: ModelFit {
            r_squared: f.number("r_squared")?,
            adj_r_squared: f.number("adj_r_squared")?,
            f_statistic: f.number("f_statistic")?,
            df_model: f.number("df_model")?,
            df_residual: f.number("df_residual")?,
            p_value: f.number("p_value")?,
            residual_standard_error: f.number("residual_se")?,
            durbin_watson: f.number("durbin_watson")?,
        },
        equation: equation(&dependent, &coefficients),
        dependent,
        coefficients,
        chart,
    })
}

/// `y = b0 + b1 × x1 - b2 × x2`, three decimals.
pub(crate) fn equation(dependent: &str, coefficients: &[Coefficient]) -> String {
    let mut out = format!("{dependent} = ");
    for (i, c) in coefficients.iter().enumerate() {
        let value = if i == 0 {
            format!("{:.3}", c.estimate)
        } else {
            let sign = if c.estimate < 0.0 { '-' } else { '+' };
            format!(" {sign} {:.3} × {}", c.estimate.abs(), c.term)
        };
        out.push_str(&value);
    }
    out
}
