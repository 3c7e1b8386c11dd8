//! Multiple linear regression; the dependent variable is column 0.

use super::{complete_cases_guard, embed_matrix, number, render};
use crate::data::DataMatrix;

/// Substituted for a VIF when a predictor is (numerically) a perfect linear
/// combination of the others.
pub const VIF_CEILING: f64 = 1e6;
pub const MIN_COLUMNS: usize = 2;
pub const MIN_OBSERVATIONS: usize = 3;

// Predictors are renamed x1..xk internally so user names never reach a formula.
const TEMPLATE: &str = r#"
{{DATA}}
{{GUARD}}
.k <- ncol(data) - 1L
.labels <- colnames(data)
.df <- as.data.frame(data)
colnames(.df) <- c("y", paste0("x", seq_len(.k)))
.fit <- stats::lm(y ~ ., data = .df)
if (any(is.na(stats::coef(.fit)))) stop("Model matrix is singular: a predictor is a perfect linear combination of the others")
.s <- summary(.fit)
.cf <- .s$coefficients
.fs <- .s$fstatistic
.sd_y <- stats::sd(.df$y)
.preds <- .df[, -1, drop = FALSE]
.vif <- function(j) {
  if (.k < 2) return(1)
  .r2 <- summary(stats::lm(stats::reformulate(".", response = paste0("x", j)), data = .preds))$r.squared
  if (.r2 >= 1 - 1e-12) {{VIF_CEILING}} else 1 / (1 - .r2)
}
.terms <- lapply(seq_len(nrow(.cf)), function(i) {
  .j <- i - 1L
  list(
    term = if (.j == 0L) "(Intercept)" else .labels[.j + 1L],
    estimate = .cf[i, 1],
    std_error = .cf[i, 2],
    t_value = .cf[i, 3],
    p_value = .cf[i, 4],
    std_beta = if (.j == 0L) NA_real_ else .cf[i, 1] * stats::sd(.df[[.j + 1L]]) / .sd_y,
    vif = if (.j == 0L) NA_real_ else .vif(.j)
  )
})
.res <- unname(stats::residuals(.fit))
list(
  dependent = .labels[1],
  n_obs = nrow(.df),
  r_squared = .s$r.squared,
  adj_r_squared = .s$adj.r.squared,
  f_statistic = unname(.fs[1]),
  df_model = unname(.fs[2]),
  df_residual = unname(.fs[3]),
  p_value = unname(stats::pf(.fs[1], .fs[2], .fs[3], lower.tail = FALSE)),
  residual_se = .s$sigma,
  durbin_watson = sum(diff(.res)^2) / sum(.res^2),
  coefficients = .terms,
  observed = .df$y,
  fitted = unname(stats::fitted(.fit)),
  residuals = .res
)
"#;

pub fn program(data: &DataMatrix) -> String {
    render(
        TEMPLATE,
        &[
            ("DATA", embed_matrix(data)),
            (
                "GUARD",
                complete_cases_guard(MIN_OBSERVATIONS, MIN_COLUMNS, true),
            ),
            ("VIF_CEILING", number(VIF_CEILING)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_names_stay_out_of_formulas() {
        let m = DataMatrix::from_rows(vec![
            vec![1.0, 2.0, 0.5],
            vec![2.0, 3.0, 0.1],
            vec![3.0, 5.0, 0.7],
            vec![4.0, 4.0, 0.2],
        ])
        .unwrap()
        .with_names(["score ~ .", "hours); stop(\"x", "age"])
        .unwrap();
        let p = program(&m);
        assert!(p.contains(r#"colnames(data) <- c("score ~ .", "hours); stop(\"x", "age")"#));
        assert!(p.contains("stats::lm(y ~ ., data = .df)"));
        assert!(p.contains("1000000 else 1 / (1 - .r2)"));
        assert!(!p.contains("{{"));
    }
}
