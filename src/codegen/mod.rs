//! R program generation.
//!
//! Programs are `{{KEY}}` templates filled with literals produced here. Only numbers
//! produced by [`number`] and strings escaped by [`string`] are ever interpolated, so
//! the data and user-supplied names cannot change the program's structure. Every
//! program ends with a single named `list(...)` expression: its field names are the
//! contract with the decoders in [`crate::results`].

use crate::data::DataMatrix;

pub mod categorical;
pub mod comparison;
pub mod correlation;
pub mod descriptive;
pub mod factor;
pub mod regression;
pub mod reliability;
pub mod setup;
pub mod structural;

/// Fill `{{KEY}}` placeholders in one pass. Values are inserted verbatim and never
/// rescanned. Unknown keys are left in place.
pub(crate) fn render(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// R numeric literal; non-finite values become `NA`.
pub fn number(v: f64) -> String {
    if v.is_finite() {
        format!("{v}")
    } else {
        "NA".to_string()
    }
}

/// R integer literal.
pub fn integer(n: usize) -> String {
    format!("{n}L")
}

pub fn logical(b: bool) -> String {
    if b { "TRUE" } else { "FALSE" }.to_string()
}

/// `c(...)` of numeric literals.
pub fn numeric_vector<I: IntoIterator<Item = f64>>(values: I) -> String {
    let body: Vec<String> = values.into_iter().map(number).collect();
    if body.is_empty() {
        "numeric(0)".to_string()
    } else {
        format!("c({})", body.join(","))
    }
}

/// Flat row-major literal plus dimensions, rebuilt as a matrix on the R side.
pub fn matrix(m: &DataMatrix) -> String {
    format!(
        "matrix({}, nrow = {}, ncol = {}, byrow = TRUE)",
        numeric_vector(m.flat()),
        m.nrows(),
        m.ncols()
    )
}

/// Double-quoted R string literal. Quotes, backslashes, control and non-ASCII
/// characters are escaped; NUL is dropped (R strings cannot hold it).
pub fn string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => {}
            c if c.is_ascii_control() || !c.is_ascii() => {
                out.push_str(&format!("\\U{{{:x}}}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `c(...)` of string literals.
pub fn string_vector<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "character(0)".to_string();
    }
    let body: Vec<String> = items.iter().map(|s| string(s.as_ref())).collect();
    format!("c({})", body.join(", "))
}

/// Assigns the matrix to `data` and names its columns.
pub(crate) fn embed_matrix(m: &DataMatrix) -> String {
    format!(
        "data <- {}\ncolnames(data) <- {}\n",
        matrix(m),
        string_vector(m.names())
    )
}

const COMPLETE_CASES_GUARD: &str = r#"
data <- data[stats::complete.cases(data), , drop = FALSE]
if (nrow(data) < {{MIN_ROWS}}) stop(sprintf("Not enough complete observations: %d (need at least %d)", nrow(data), {{MIN_ROWS}}))
if (ncol(data) < {{MIN_COLS}}) stop(sprintf("Not enough variables: %d (need at least %d)", ncol(data), {{MIN_COLS}}))
{{WIDE_CHECK}}
.sds <- apply(data, 2, stats::sd)
.flat <- !is.finite(.sds) | .sds == 0
if (any(.flat)) stop(sprintf("Zero-variance column(s): %s", paste(colnames(data)[.flat], collapse = ", ")))
"#;

/// In-program cleaning for multivariate procedures: drop incomplete rows, then abort
/// when too few rows or variables remain or a column is constant.
pub(crate) fn complete_cases_guard(min_rows: usize, min_cols: usize, more_rows_than_cols: bool) -> String {
    let wide = if more_rows_than_cols {
        r#"if (nrow(data) <= ncol(data)) stop(sprintf("Too many variables (%d) for %d complete observations", ncol(data), nrow(data)))"#
    } else {
        ""
    };
    render(
        COMPLETE_CASES_GUARD,
        &[
            ("MIN_ROWS", integer(min_rows)),
            ("MIN_COLS", integer(min_cols)),
            ("WIDE_CHECK", wide.to_string()),
        ],
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_single_pass() {
        let out = render(
            "a <- {{A}}; b <- {{B}}; {{MISSING}}",
            &[("A", "\"{{B}}\"".into()), ("B", "2".into())],
        );
        assert_eq!(out, "a <- \"{{B}}\"; b <- 2; {{MISSING}}");
    }

    #[test]
    fn numbers_and_na() {
        assert_eq!(number(3.0), "3");
        assert_eq!(number(-0.25), "-0.25");
        assert_eq!(number(f64::NAN), "NA");
        assert_eq!(number(f64::INFINITY), "NA");
        assert_eq!(numeric_vector(Vec::<f64>::new()), "numeric(0)");
        assert_eq!(numeric_vector([1.5, 2.0]), "c(1.5,2)");
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(string(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(string("x\ny"), r#""x\ny""#);
        assert_eq!(string("Điểm"), "\"\\U{110}i\\U{1ec3}m\"");
        assert_eq!(string("\"); system(\"rm -rf /\"); (\""), r#""\"); system(\"rm -rf /\"); (\"""#);
        assert_eq!(string_vector::<&str>(&[]), "character(0)");
    }

    #[test]
    fn matrix_literal_round_trips_dimensions() {
        for (r, c) in [(3, 2), (5, 4), (50, 5), (7, 3)] {
            let rows: Vec<Vec<f64>> = (0..r)
                .map(|i| (0..c).map(|j| (i * c + j) as f64 / 4.0).collect())
                .collect();
            let m = DataMatrix::from_rows(rows).unwrap();
            let (values, nrow, ncol) = testing::parse_matrix_literal(&matrix(&m));
            assert_eq!((nrow, ncol), (r, c));
            assert_eq!(values, m.flat().collect::<Vec<_>>());
        }
    }

    #[test]
    fn guard_mentions_wide_check_only_when_asked() {
        assert!(complete_cases_guard(3, 2, true).contains("Too many variables"));
        let g = complete_cases_guard(3, 2, false);
        assert!(!g.contains("Too many variables"));
        assert!(g.contains("nrow(data) < 3L"));
        assert!(!g.contains("{{"));
    }
}
