//! Chi-square test of independence on two columns of category codes.

use super::{complete_cases_guard, embed_matrix, render};
use crate::data::DataMatrix;

pub const MIN_OBSERVATIONS: usize = 2;

// Tables leave R row-major: rows are levels of the first column.
const TEMPLATE: &str = r#"
{{DATA}}
{{GUARD}}
.a <- factor(data[, 1])
.b <- factor(data[, 2])
.tab <- table(.a, .b)
.test <- suppressWarnings(stats::chisq.test(.tab, correct = FALSE))
.n <- sum(.tab)
.k <- min(dim(.tab))
.fisher <- NA_real_
if (all(dim(.tab) == 2L)) .fisher <- stats::fisher.test(.tab)$p.value
list(
  row_variable = colnames(data)[1],
  column_variable = colnames(data)[2],
  chi_square = unname(.test$statistic),
  df = unname(.test$parameter),
  p_value = .test$p.value,
  cramers_v = sqrt(unname(.test$statistic) / (.n * (.k - 1))),
  n = .n,
  row_levels = levels(.a),
  column_levels = levels(.b),
  observed = as.numeric(t(unclass(.tab))),
  expected = as.numeric(t(.test$expected)),
  low_expected_cells = sum(.test$expected < 5),
  fisher_p = .fisher
)
"#;

pub fn program(data: &DataMatrix) -> String {
    render(
        TEMPLATE,
        &[
            ("DATA", embed_matrix(data)),
            ("GUARD", complete_cases_guard(MIN_OBSERVATIONS, 2, false)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::parse_matrix_literal;

    #[test]
    fn codes_become_factors() {
        let m = DataMatrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let p = program(&m);
        assert_eq!(parse_matrix_literal(&p).1, 3);
        assert!(p.contains("correct = FALSE"));
        assert!(p.contains("fisher.test"));
        assert!(!p.contains("{{"));
    }
}
