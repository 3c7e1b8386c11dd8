use serde::Serialize;

use super::check_len;
use crate::{error::DecodeError, execution::RValue, marshal::Fields};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndependentTTestResult {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
    pub mean1: f64,
    pub mean2: f64,
    pub sd1: f64,
    pub sd2: f64,
    pub n1: usize,
    pub n2: usize,
    pub mean_diff: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Cohen's d with the pooled standard deviation.
    pub effect_size: f64,
    /// p-value of the variance-equality check.
    pub var_test_p: Option<f64>,
    /// Whether the pooled-variance test was used (otherwise Welch).
    pub equal_variance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedTTestResult {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
    pub mean_before: f64,
    pub mean_after: f64,
    /// Mean of `before - after`.
    pub mean_diff: f64,
    pub sd_diff: f64,
    pub n: usize,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// d_z: mean difference over the standard deviation of the differences.
    pub effect_size: f64,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnovaResult {
    pub f: f64,
    pub df_between: f64,
    pub df_within: f64,
    pub p_value: f64,
    pub eta_squared: f64,
    pub group_means: Vec<f64>,
    pub group_sds: Vec<f64>,
    pub group_sizes: Vec<usize>,
    pub grand_mean: f64,
    pub var_test_p: Option<f64>,
    pub welch_f: Option<f64>,
    pub welch_df: Option<f64>,
    pub welch_p: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MannWhitneyResult {
    pub u_statistic: f64,
    pub p_value: f64,
    /// Rank-biserial correlation, positive when group 1 tends to be larger.
    pub effect_size: f64,
    pub median1: f64,
    pub median2: f64,
    pub n1: usize,
    pub n2: usize,
}

pub(crate) fn decode_independent_t(raw: &RValue) -> Result<IndependentTTestResult, DecodeError> {
    let f = Fields::decode(raw)?;
    Ok(IndependentTTestResult {
        t: f.number("t")?,
        df: f.number("df")?,
        p_value: f.number("p_value")?,
        mean1: f.number("mean1")?,
        mean2: f.number("mean2")?,
        sd1: f.number("sd1")?,
        sd2: f.number("sd2")?,
        n1: f.count("n1")?,
        n2: f.count("n2")?,
        mean_diff: f.number("mean_diff")?,
        ci_lower: f.number("ci_lower")?,
        ci_upper: f.number("ci_upper")?,
        effect_size: f.number("cohens_d")?,
        var_test_p: f.opt_number("var_test_p")?,
        equal_variance: f.flag("equal_variance")?,
    })
}

pub(crate) fn decode_paired_t(raw: &RValue) -> Result<PairedTTestResult, DecodeError> {
    let f = Fields::decode(raw)?;
    Ok(PairedTTestResult {
        t: f.number("t")?,
        df: f.number("df")?,
        p_value: f.number("p_value")?,
        mean_before: f.number("mean_before")?,
        mean_after: f.number("mean_after")?,
        mean_diff: f.number("mean_diff")?,
        sd_diff: f.number("sd_diff")?,
        n: f.count("n")?,
        ci_lower: f.number("ci_lower")?,
        ci_upper: f.number("ci_upper")?,
        effect_size: f.number("cohens_dz")?,
        correlation: f.opt_number("correlation")?,
    })
}

pub(crate) fn decode_anova(raw: &RValue) -> Result<AnovaResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let group_means = f.numbers("group_means")?;
    let group_sds = f.numbers("group_sds")?;
    let group_sizes: Vec<usize> = f
        .numbers("group_sizes")?
        .into_iter()
        .map(|n| n as usize)
        .collect();
    check_len("group_sds", group_sds.len(), group_means.len())?;
    check_len("group_sizes", group_sizes.len(), group_means.len())?;

    Ok(AnovaResult {
        f: f.number("f")?,
        df_between: f.number("df_between")?,
        df_within: f.number("df_within")?,
        p_value: f.number("p_value")?,
        eta_squared: f.number("eta_squared")?,
        group_means,
        group_sds,
        group_sizes,
        grand_mean: f.number("grand_mean")?,
        var_test_p: f.opt_number("var_test_p")?,
        welch_f: f.opt_number("welch_f")?,
        welch_df: f.opt_number("welch_df")?,
        welch_p: f.opt_number("welch_p")?,
    })
}

pub(crate) fn decode_mann_whitney(raw: &RValue) -> Result<MannWhitneyResult, DecodeError> {
    let f = Fields::decode(raw)?;
    Ok(MannWhitneyResult {
        u_statistic: f.number("u_statistic")?,
        p_value: f.number("p_value")?,
        effect_size: f.number("rank_biserial")?,
        median1: f.number("median1")?,
        median2: f.number("median2")?,
        n1: f.count("n1")?,
        n2: f.count("n2")?,
    })
}
