//! Confirmatory factor analysis and structural equation models via lavaan.

use serde::Serialize;

use super::{complete_cases_guard, embed_matrix, render, string};
use crate::data::DataMatrix;

pub const MIN_VARIABLES: usize = 3;
pub const MIN_OBSERVATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Cfa,
    Sem,
}

impl ModelKind {
    /// lavaan entry point.
    fn function(&self) -> &'static str {
        match self {
            Self::Cfa => "cfa",
            Self::Sem => "sem",
        }
    }

    /// Operators at least one of which a model of this kind must use.
    pub fn operators(&self) -> &'static [&'static str] {
        match self {
            Self::Cfa => &["=~"],
            Self::Sem => &["=~", "~"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cfa => "CFA",
            Self::Sem => "SEM",
        }
    }
}

// When lavaan omits CFI/TLI they are approximated from the baseline model, or from
// the independence model -(n-1) log|R| with p(p-1)/2 df when that is missing too.
const TEMPLATE: &str = r#"
{{DATA}}
{{GUARD}}
.df <- as.data.frame(data)
.model <- {{MODEL}}
.fit <- lavaan::{{FUNCTION}}(.model, data = .df)
if (!isTRUE(lavaan::lavInspect(.fit, "converged"))) stop("The model did not converge")
.fm <- lavaan::fitMeasures(.fit)
.get <- function(name) if (name %in% names(.fm)) unname(.fm[[name]]) else NA_real_
.chisq <- .get("chisq")
.df_m <- .get("df")
.cfi <- .get("cfi")
.tli <- .get("tli")
.approx <- FALSE
if (is.na(.cfi) || is.na(.tli)) {
  .approx <- TRUE
  .bchisq <- .get("baseline.chisq")
  .bdf <- .get("baseline.df")
  if (is.na(.bchisq) || is.na(.bdf)) {
    .vars <- intersect(colnames(.df), lavaan::lavNames(.fit, "ov"))
    .p <- length(.vars)
    .bchisq <- -(nrow(.df) - 1) * log(det(stats::cor(.df[, .vars, drop = FALSE])))
    .bdf <- .p * (.p - 1) / 2
  }
  .d_m <- max(.chisq - .df_m, 0)
  .d_b <- max(.bchisq - .bdf, 0)
  .cfi <- if (max(.d_m, .d_b) == 0) 1 else 1 - .d_m / max(.d_m, .d_b)
  .tli <- if (.bdf > 0 && .df_m > 0) ((.bchisq / .bdf) - (.chisq / .df_m)) / ((.bchisq / .bdf) - 1) else NA_real_
}
.pe <- lavaan::parameterEstimates(.fit, standardized = TRUE)
.estimates <- lapply(seq_len(nrow(.pe)), function(i) list(
  lhs = .pe$lhs[i],
  op = .pe$op[i],
  rhs = .pe$rhs[i],
  est = .pe$est[i],
  se = .pe$se[i],
  z = .pe$z[i],
  pvalue = .pe$pvalue[i],
  std_all = .pe$std.all[i]
))
.r2 <- tryCatch(unlist(lavaan::lavInspect(.fit, "rsquare")), error = function(e) numeric(0))
list(
  n_obs = lavaan::lavInspect(.fit, "nobs"),
  fit = list(
    chisq = .chisq,
    df = .df_m,
    pvalue = .get("pvalue"),
    cfi = .cfi,
    tli = .tli,
    rmsea = .get("rmsea"),
    rmsea_lower = .get("rmsea.ci.lower"),
    rmsea_upper = .get("rmsea.ci.upper"),
    srmr = .get("srmr"),
    aic = .get("aic"),
    bic = .get("bic")
  ),
  fit_approximated = .approx,
  estimates = .estimates,
  r_squared_names = as.character(names(.r2)),
  r_squared = as.numeric(unname(.r2))
)
"#;

/// `model` must already have passed
/// [`validate_model_syntax`](crate::validate::validate_model_syntax).
pub fn program(data: &DataMatrix, model: &str, kind: ModelKind) -> String {
    render(
        TEMPLATE,
        &[
            ("DATA", embed_matrix(data)),
            (
                "GUARD",
                complete_cases_guard(MIN_OBSERVATIONS, MIN_VARIABLES, false),
            ),
            ("MODEL", string(model)),
            ("FUNCTION", kind.function().to_string()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> DataMatrix {
        DataMatrix::from_rows((0..10).map(|i| vec![i as f64, 1.0 + i as f64, (i % 3) as f64]).collect())
            .unwrap()
            .with_names(["Q1", "Q2", "Q3"])
            .unwrap()
    }

    #[test]
    fn model_text_is_a_single_string_literal() {
        let model = "F1 =~ Q1 + Q2 + Q3\n\"); quit(); (\"";
        let p = program(&data(), model, ModelKind::Cfa);
        assert!(p.contains(r#".model <- "F1 =~ Q1 + Q2 + Q3\n\"); quit(); (\"""#));
        assert!(p.contains("lavaan::cfa(.model"));
        assert!(!p.contains("{{"));
    }

    #[test]
    fn sem_uses_sem_entry_point() {
        let p = program(&data(), "F1 =~ Q1 + Q2\nQ3 ~ F1", ModelKind::Sem);
        assert!(p.contains("lavaan::sem(.model"));
        assert!(p.contains("baseline.chisq"));
    }
}
