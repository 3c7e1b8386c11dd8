use super::{embed_matrix, render};
use crate::data::DataMatrix;

// Non-finite cells arrive as NA and are skipped column by column.
const TEMPLATE: &str = r#"
{{DATA}}
.describe <- function(x) {
  x <- x[is.finite(x)]
  n <- length(x)
  list(
    mean = mean(x),
    sd = if (n > 1) stats::sd(x) else NA_real_,
    min = min(x),
    max = max(x),
    median = stats::median(x),
    skew = if (n > 2) psych::skew(x) else NA_real_,
    kurtosis = if (n > 3) psych::kurtosi(x) else NA_real_,
    se = if (n > 1) stats::sd(x) / sqrt(n) else NA_real_,
    n_valid = n
  )
}
list(
  n = nrow(data),
  variables = colnames(data),
  columns = lapply(seq_len(ncol(data)), function(j) .describe(data[, j]))
)
"#;

pub fn program(data: &DataMatrix) -> String {
    render(TEMPLATE, &[("DATA", embed_matrix(data))])
}
