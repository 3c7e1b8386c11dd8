//! Group comparisons: independent and paired t-tests, one-way ANOVA and
//! Mann-Whitney U.

use super::{numeric_vector, render};

pub const MIN_GROUP_SIZE: usize = 2;

/// Brown-Forsythe style variance check: one-way ANOVA on absolute deviations from the
/// group medians. Expects `.y` and factor `.g`; leaves its p-value in `.var_p`.
const VARIANCE_CHECK: &str = r#"
.med <- tapply(.y, .g, stats::median)
.dev <- abs(.y - .med[as.integer(.g)])
.var_p <- stats::anova(stats::lm(.dev ~ .g))[["Pr(>F)"]][1]
"#;

const INDEPENDENT_T: &str = r#"
g1 <- {{GROUP1}}
g2 <- {{GROUP2}}
.y <- c(g1, g2)
.g <- factor(rep(c("g1", "g2"), c(length(g1), length(g2))))
{{VARIANCE_CHECK}}
.equal <- is.na(.var_p) || .var_p >= 0.05
.tt <- stats::t.test(g1, g2, var.equal = .equal)
.n1 <- length(g1)
.n2 <- length(g2)
.sp <- sqrt(((.n1 - 1) * stats::var(g1) + (.n2 - 1) * stats::var(g2)) / (.n1 + .n2 - 2))
list(
  t = unname(.tt$statistic),
  df = unname(.tt$parameter),
  p_value = .tt$p.value,
  mean1 = mean(g1),
  mean2 = mean(g2),
  sd1 = stats::sd(g1),
  sd2 = stats::sd(g2),
  n1 = .n1,
  n2 = .n2,
  mean_diff = mean(g1) - mean(g2),
  ci_lower = .tt$conf.int[1],
  ci_upper = .tt$conf.int[2],
  cohens_d = (mean(g1) - mean(g2)) / .sp,
  var_test_p = .var_p,
  equal_variance = .equal
)
"#;

const PAIRED_T: &str = r#"
before <- {{BEFORE}}
after <- {{AFTER}}
.d <- before - after
if (!is.finite(stats::sd(.d)) || stats::sd(.d) == 0) stop("The paired differences have zero variance")
.tt <- stats::t.test(before, after, paired = TRUE)
list(
  t = unname(.tt$statistic),
  df = unname(.tt$parameter),
  p_value = .tt$p.value,
  mean_before = mean(before),
  mean_after = mean(after),
  mean_diff = mean(.d),
  sd_diff = stats::sd(.d),
  n = length(.d),
  ci_lower = .tt$conf.int[1],
  ci_upper = .tt$conf.int[2],
  cohens_dz = mean(.d) / stats::sd(.d),
  correlation = suppressWarnings(stats::cor(before, after))
)
"#;

const ONE_WAY_ANOVA: &str = r#"
.groups <- list({{GROUPS}})
.y <- unlist(.groups)
.g <- factor(rep(seq_along(.groups), lengths(.groups)))
.tab <- summary(stats::aov(.y ~ .g))[[1]]
.ss <- .tab[["Sum Sq"]]
{{VARIANCE_CHECK}}
.welch <- tryCatch(stats::oneway.test(.y ~ .g, var.equal = FALSE), error = function(e) NULL)
list(
  f = .tab[["F value"]][1],
  df_between = .tab[["Df"]][1],
  df_within = .tab[["Df"]][2],
  p_value = .tab[["Pr(>F)"]][1],
  eta_squared = .ss[1] / sum(.ss),
  group_means = unname(vapply(.groups, mean, numeric(1))),
  group_sds = unname(vapply(.groups, stats::sd, numeric(1))),
  group_sizes = unname(lengths(.groups)),
  grand_mean = mean(.y),
  var_test_p = .var_p,
  welch_f = if (is.null(.welch)) NA_real_ else unname(.welch$statistic),
  welch_df = if (is.null(.welch)) NA_real_ else unname(.welch$parameter[2]),
  welch_p = if (is.null(.welch)) NA_real_ else .welch$p.value
)
"#;

// Ties make the exact p-value unavailable; R then falls back to the normal
// approximation and warns, which is expected here.
const MANN_WHITNEY: &str = r#"
g1 <- {{GROUP1}}
g2 <- {{GROUP2}}
.w <- suppressWarnings(stats::wilcox.test(g1, g2))
.u <- unname(.w$statistic)
.n1 <- length(g1)
.n2 <- length(g2)
list(
  u_statistic = .u,
  p_value = .w$p.value,
  rank_biserial = 2 * .u / (.n1 * .n2) - 1,
  median1 = stats::median(g1),
  median2 = stats::median(g2),
  n1 = .n1,
  n2 = .n2
)
"#;

/// Two-sample t-test; Welch's variant when the variance check rejects equality.
pub fn independent_t(group1: &[f64], group2: &[f64]) -> String {
    render(
        INDEPENDENT_T,
        &[
            ("GROUP1", numeric_vector(group1.iter().copied())),
            ("GROUP2", numeric_vector(group2.iter().copied())),
            ("VARIANCE_CHECK", VARIANCE_CHECK.to_string()),
        ],
    )
}

/// Paired t-test on `before - after`.
pub fn paired_t(before: &[f64], after: &[f64]) -> String {
    render(
        PAIRED_T,
        &[
            ("BEFORE", numeric_vector(before.iter().copied())),
            ("AFTER", numeric_vector(after.iter().copied())),
        ],
    )
}

pub fn one_way_anova(groups: &[Vec<f64>]) -> String {
    let groups: Vec<String> = groups
        .iter()
        .map(|g| numeric_vector(g.iter().copied()))
        .collect();
    render(
        ONE_WAY_ANOVA,
        &[
            ("GROUPS", groups.join(",\n  ")),
            ("VARIANCE_CHECK", VARIANCE_CHECK.to_string()),
        ],
    )
}

pub fn mann_whitney(group1: &[f64], group2: &[f64]) -> String {
    render(
        MANN_WHITNEY,
        &[
            ("GROUP1", numeric_vector(group1.iter().copied())),
            ("GROUP2", numeric_vector(group2.iter().copied())),
        ],
    )
}
