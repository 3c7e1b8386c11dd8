use serde::Serialize;

use super::{check_len, each};
use crate::{error::DecodeError, execution::RValue, marshal::Fields};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatistics {
    pub item: String,
    pub scale_mean_if_deleted: f64,
    pub scale_variance_if_deleted: f64,
    pub corrected_item_total_correlation: f64,
    pub alpha_if_item_deleted: f64,
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityResult {
    pub n_items: usize,
    pub n_observations: usize,
    /// Raw Cronbach's alpha after reversal.
    pub alpha: f64,
    pub standardized_alpha: f64,
    pub average_inter_item_correlation: f64,
    /// One-factor omega total; absent below three items or when it cannot be fitted.
    pub omega_total: Option<f64>,
    /// Zero-based indices of reversed items.
    pub reversed_items: Vec<usize>,
    pub item_total_stats: Vec<ItemStatistics>,
}

pub(crate) fn decode(raw: &RValue) -> Result<ReliabilityResult, DecodeError> {
    let f = Fields::decode(raw)?;
    let n_items = f.count("n_items")?;
    let item_total_stats = each(&f, "items", |r| {
        Ok(ItemStatistics {
            item: r.text("item")?,
            scale_mean_if_deleted: r.number("scale_mean_if_deleted")?,
            scale_variance_if_deleted: r.number("scale_variance_if_deleted")?,
            corrected_item_total_correlation: r.number("corrected_item_total")?,
            alpha_if_item_deleted: r.number("alpha_if_deleted")?,
            reversed: r.flag("reversed")?,
        })
    })?;
    check_len("items", item_total_stats.len(), n_items)?;

    Ok(ReliabilityResult {
        n_items,
        n_observations: f.count("n_obs")?,
        alpha: f.number("raw_alpha")?,
        standardized_alpha: f.number("std_alpha")?,
        average_inter_item_correlation: f.number("average_r")?,
        omega_total: f.opt_number("omega_total")?,
        reversed_items: f
            .numbers("reversed")?
            .into_iter()
            .map(|i| (i as usize).saturating_sub(1))
            .collect(),
        item_total_stats,
    })
}
