//! Cronbach's alpha with automatic reversal of negatively keyed items.

use super::{complete_cases_guard, embed_matrix, number, render};
use crate::data::{DataMatrix, ScaleBounds};

pub const MIN_ITEMS: usize = 2;
pub const MIN_OBSERVATIONS: usize = 3;

const TEMPLATE: &str = r#"
{{DATA}}
{{GUARD}}
.lo <- {{SCALE_MIN}}
.hi <- {{SCALE_MAX}}
if (is.na(.lo) || is.na(.hi)) {
  .lo <- min(data)
  .hi <- max(data)
}
.load <- stats::prcomp(data, scale. = TRUE)$rotation[, 1]
if (sum(.load) < 0) .load <- -.load
.reversed <- unname(which(.load < 0))
scored <- data
if (length(.reversed) > 0) scored[, .reversed] <- (.lo + .hi) - scored[, .reversed]
.a <- psych::alpha(as.data.frame(scored), check.keys = FALSE, warnings = FALSE)
.total <- rowSums(scored)
.items <- lapply(seq_len(ncol(scored)), function(j) {
  .rest <- .total - scored[, j]
  list(
    item = colnames(scored)[j],
    scale_mean_if_deleted = mean(.rest),
    scale_variance_if_deleted = stats::var(.rest),
    corrected_item_total = .a$item.stats$r.drop[j],
    alpha_if_deleted = .a$alpha.drop$raw_alpha[j],
    reversed = j %in% .reversed
  )
})
.omega <- NA_real_
if (ncol(scored) >= 3) {
  .omega <- tryCatch(
    suppressMessages(suppressWarnings(psych::omega(scored, nfactors = 1, plot = FALSE)))$omega.tot,
    error = function(e) NA_real_
  )
}
list(
  n_items = ncol(scored),
  n_obs = nrow(scored),
  raw_alpha = .a$total$raw_alpha,
  std_alpha = .a$total$std.alpha,
  average_r = .a$total$average_r,
  omega_total = .omega,
  reversed = as.integer(.reversed),
  items = .items
)
"#;

/// `data` with every cell clamped into `scale`, or unchanged without bounds.
pub fn clamped(data: &DataMatrix, scale: Option<ScaleBounds>) -> DataMatrix {
    match scale {
        Some(bounds) => data.map(|_, v| bounds.clamp(v)),
        None => data.clone(),
    }
}

/// Program for `data`, with every cell clamped into `scale` when bounds are declared.
/// Reversal uses the declared bounds, or the observed range without them.
pub fn program(data: &DataMatrix, scale: Option<ScaleBounds>) -> String {
    let data = clamped(data, scale);
    render(
        TEMPLATE,
        &[
            ("DATA", embed_matrix(&data)),
            ("GUARD", complete_cases_guard(MIN_OBSERVATIONS, MIN_ITEMS, false)),
            ("SCALE_MIN", number(scale.map_or(f64::NAN, |s| s.min))),
            ("SCALE_MAX", number(scale.map_or(f64::NAN, |s| s.max))),
        ],
    )
}
