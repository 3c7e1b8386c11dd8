//! Markdown rendering of analysis results for the terminal.

use std::fmt::Write;

use crate::{
    analysis::AnalysisOutput,
    engine::EngineStatus,
    marshal::Matrix,
    results::*,
};

pub fn render(output: &AnalysisOutput) -> String {
    let mut out = String::new();
    match output {
        AnalysisOutput::Reliability(r) => reliability(&mut out, r),
        AnalysisOutput::Correlation(r) => correlation(&mut out, r),
        AnalysisOutput::Descriptive(r) => descriptive(&mut out, r),
        AnalysisOutput::IndependentT(r) => independent_t(&mut out, r),
        AnalysisOutput::PairedT(r) => paired_t(&mut out, r),
        AnalysisOutput::Anova(r) => anova(&mut out, r),
        AnalysisOutput::MannWhitney(r) => mann_whitney(&mut out, r),
        AnalysisOutput::Efa(r) => efa(&mut out, r),
        AnalysisOutput::Regression(r) => regression(&mut out, r),
        AnalysisOutput::ChiSquare(r) => chi_square(&mut out, r),
        AnalysisOutput::Cfa(r) => structural(&mut out, "Confirmatory factor analysis", r),
        AnalysisOutput::Sem(r) => structural(&mut out, "Structural equation model", r),
    }
    out
}

pub fn render_status(status: &EngineStatus) -> String {
    let mut out = String::from("## R engine\n\n");
    let mut t = Table::new(&["", ""]);
    t.row(["State".into(), format!("{:?}", status.state).to_lowercase()]);
    if let Some(p) = &status.last_progress {
        t.row(["Last progress".into(), p.clone()]);
    }
    if let Some(e) = &status.last_error {
        t.row(["Last error".into(), e.replace('|', "/")]);
    }
    t.write(&mut out);
    out
}

struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn row<I: IntoIterator<Item = String>>(&mut self, cells: I) {
        self.rows.push(cells.into_iter().collect());
    }

    fn write(&self, out: &mut String) {
        let _ = writeln!(out, "|{}|", self.header.join("|"));
        let _ = writeln!(out, "|{}|", vec![":-"; self.header.len()].join("|"));
        for r in &self.rows {
            let _ = writeln!(out, "|{}|", r.join("|"));
        }
        out.push('\n');
    }
}

fn num(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.3}")
    } else {
        "NA".into()
    }
}

fn opt(v: Option<f64>) -> String {
    v.map_or_else(|| "NA".into(), num)
}

fn pval(p: f64) -> String {
    if !p.is_finite() {
        "NA".into()
    } else if p < 0.001 {
        "< .001".into()
    } else {
        format!("{p:.3}")
    }
}

fn matrix_table(out: &mut String, row_names: &[String], col_names: &[String], m: &Matrix, cell: fn(f64) -> String) {
    let mut header = vec![""];
    header.extend(col_names.iter().map(String::as_str));
    let mut t = Table::new(&header);
    for (i, name) in row_names.iter().enumerate() {
        let mut cells = vec![name.clone()];
        cells.extend(m.row(i).iter().map(|&v| cell(v)));
        t.row(cells);
    }
    t.write(out);
}

fn reliability(out: &mut String, r: &ReliabilityResult) {
    let _ = writeln!(out, "## Reliability (Cronbach's alpha)\n");
    let _ = writeln!(
        out,
        "**α = {}** (standardized {}), {} items, {} observations, mean inter-item r = {}\n",
        num(r.alpha),
        num(r.standardized_alpha),
        r.n_items,
        r.n_observations,
        num(r.average_inter_item_correlation)
    );
    if let Some(omega) = r.omega_total {
        let _ = writeln!(out, "ω total = {}\n", num(omega));
    }
    let mut t = Table::new(&[
        "Item",
        "Scale mean if deleted",
        "Scale variance if deleted",
        "Corrected item-total r",
        "α if deleted",
    ]);
    for s in &r.item_total_stats {
        let item = if s.reversed {
            format!("{} (reversed)", s.item)
        } else {
            s.item.clone()
        };
        t.row([
            item,
            num(s.scale_mean_if_deleted),
            num(s.scale_variance_if_deleted),
            num(s.corrected_item_total_correlation),
            num(s.alpha_if_item_deleted),
        ]);
    }
    t.write(out);
}

fn correlation(out: &mut String, r: &CorrelationResult) {
    let _ = writeln!(
        out,
        "## Correlation ({}, n = {})\n",
        r.method, r.n_observations
    );
    matrix_table(out, &r.variables, &r.variables, &r.correlation_matrix, num);
    let _ = writeln!(out, "### p-values\n");
    matrix_table(out, &r.variables, &r.variables, &r.p_values, pval);
}

fn descriptive(out: &mut String, r: &DescriptiveResult) {
    let _ = writeln!(out, "## Descriptive statistics (n = {})\n", r.n);
    let mut t = Table::new(&[
        "Variable", "N", "Mean", "SD", "Min", "Median", "Max", "Skew", "Kurtosis", "SE",
    ]);
    for c in &r.columns {
        t.row([
            c.variable.clone(),
            c.n_valid.to_string(),
            num(c.mean),
            opt(c.sd),
            num(c.min),
            num(c.median),
            num(c.max),
            opt(c.skew),
            opt(c.kurtosis),
            opt(c.standard_error),
        ]);
    }
    t.write(out);
}

fn independent_t(out: &mut String, r: &IndependentTTestResult) {
    let test = if r.equal_variance { "Student" } else { "Welch" };
    let _ = writeln!(out, "## Independent samples t-test ({test})\n");
    let mut t = Table::new(&["Group", "N", "Mean", "SD"]);
    t.row(["1".into(), r.n1.to_string(), num(r.mean1), num(r.sd1)]);
    t.row(["2".into(), r.n2.to_string(), num(r.mean2), num(r.sd2)]);
    t.write(out);
    let _ = writeln!(
        out,
        "t({}) = {}, p {}, mean difference {} [95% CI {}, {}], Cohen's d = {}\n",
        num(r.df),
        num(r.t),
        p_phrase(r.p_value),
        num(r.mean_diff),
        num(r.ci_lower),
        num(r.ci_upper),
        num(r.effect_size)
    );
    let _ = writeln!(out, "Variance equality check p = {}\n", r.var_test_p.map_or("NA".into(), pval));
}

fn paired_t(out: &mut String, r: &PairedTTestResult) {
    let _ = writeln!(out, "## Paired samples t-test (n = {})\n", r.n);
    let _ = writeln!(
        out,
        "Before {} → after {}, mean difference {} (SD {}) [95% CI {}, {}]\n",
        num(r.mean_before),
        num(r.mean_after),
        num(r.mean_diff),
        num(r.sd_diff),
        num(r.ci_lower),
        num(r.ci_upper)
    );
    let _ = writeln!(
        out,
        "t({}) = {}, p {}, d_z = {}, r = {}\n",
        num(r.df),
        num(r.t),
        p_phrase(r.p_value),
        num(r.effect_size),
        opt(r.correlation)
    );
}

fn anova(out: &mut String, r: &AnovaResult) {
    let _ = writeln!(out, "## One-way ANOVA\n");
    let mut t = Table::new(&["Group", "N", "Mean", "SD"]);
    for i in 0..r.group_means.len() {
        t.row([
            (i + 1).to_string(),
            r.group_sizes[i].to_string(),
            num(r.group_means[i]),
            num(r.group_sds[i]),
        ]);
    }
    t.write(out);
    let _ = writeln!(
        out,
        "F({}, {}) = {}, p {}, η² = {}\n",
        num(r.df_between),
        num(r.df_within),
        num(r.f),
        p_phrase(r.p_value),
        num(r.eta_squared)
    );
    if let (Some(f), Some(df), Some(p)) = (r.welch_f, r.welch_df, r.welch_p) {
        let _ = writeln!(out, "Welch F = {} (df₂ = {}), p {}\n", num(f), num(df), p_phrase(p));
    }
}

fn mann_whitney(out: &mut String, r: &MannWhitneyResult) {
    let _ = writeln!(out, "## Mann-Whitney U test\n");
    let mut t = Table::new(&["Group", "N", "Median"]);
    t.row(["1".into(), r.n1.to_string(), num(r.median1)]);
    t.row(["2".into(), r.n2.to_string(), num(r.median2)]);
    t.write(out);
    let _ = writeln!(
        out,
        "U = {}, p {}, rank-biserial r = {}\n",
        num(r.u_statistic),
        p_phrase(r.p_value),
        num(r.effect_size)
    );
}

fn efa(out: &mut String, r: &EfaResult) {
    let _ = writeln!(
        out,
        "## Exploratory factor analysis ({} factors, {} extraction, {} rotation)\n",
        r.n_factors, r.extraction, r.rotation
    );
    let _ = writeln!(
        out,
        "KMO = {}, Bartlett χ²({}) = {}, p {}\n",
        num(r.kmo),
        num(r.bartlett_df),
        num(r.bartlett_chi_square),
        p_phrase(r.bartlett_p)
    );
    let factors: Vec<String> = (1..=r.n_factors).map(|k| format!("F{k}")).collect();
    let mut header = vec!["Variable"];
    header.extend(factors.iter().map(String::as_str));
    header.push("h²");
    let mut t = Table::new(&header);
    for (i, v) in r.variables.iter().enumerate() {
        let mut cells = vec![v.clone()];
        cells.extend(r.loadings.row(i).iter().map(|&l| num(l)));
        cells.push(r.communalities.get(i).copied().map_or("NA".into(), num));
        t.row(cells);
    }
    t.write(out);
    let mut t = Table::new(&["", "SS loadings", "Proportion", "Cumulative"]);
    for (k, name) in factors.iter().enumerate() {
        t.row([
            name.clone(),
            r.ss_loadings.get(k).copied().map_or("NA".into(), num),
            r.proportion_variance.get(k).copied().map_or("NA".into(), num),
            r.cumulative_variance.get(k).copied().map_or("NA".into(), num),
        ]);
    }
    t.write(out);
}

fn regression(out: &mut String, r: &RegressionResult) {
    let fit = &r.model_fit;
    let _ = writeln!(out, "## Linear regression (n = {})\n", r.n_observations);
    let _ = writeln!(out, "`{}`\n", r.equation);
    let _ = writeln!(
        out,
        "R² = {}, adjusted R² = {}, F({}, {}) = {}, p {}, residual SE = {}, Durbin-Watson = {}\n",
        num(fit.r_squared),
        num(fit.adj_r_squared),
        num(fit.df_model),
        num(fit.df_residual),
        num(fit.f_statistic),
        p_phrase(fit.p_value),
        num(fit.residual_standard_error),
        num(fit.durbin_watson)
    );
    let mut t = Table::new(&["Term", "B", "SE", "β", "t", "p", "VIF"]);
    for c in &r.coefficients {
        t.row([
            c.term.clone(),
            num(c.estimate),
            num(c.std_error),
            opt(c.standardized_beta),
            num(c.t_value),
            pval(c.p_value),
            opt(c.vif),
        ]);
    }
    t.write(out);
}

fn chi_square(out: &mut String, r: &ChiSquareResult) {
    let _ = writeln!(
        out,
        "## Chi-square test of independence ({} × {})\n",
        r.row_variable, r.column_variable
    );
    matrix_table(out, &r.row_levels, &r.column_levels, &r.observed, |v| format!("{v:.0}"));
    let _ = writeln!(
        out,
        "χ²({}) = {}, p {}, Cramér's V = {}, n = {}\n",
        num(r.df),
        num(r.chi_square),
        p_phrase(r.p_value),
        num(r.cramers_v),
        r.n
    );
    if r.low_expected_cells > 0 {
        let _ = writeln!(
            out,
            "*{} cell(s) have expected counts below 5.*\n",
            r.low_expected_cells
        );
    }
    if let Some(p) = r.fisher_p {
        let _ = writeln!(out, "Fisher's exact test p {}\n", p_phrase(p));
    }
}

fn structural(out: &mut String, title: &str, r: &StructuralResult) {
    let fm = &r.fit_measures;
    let _ = writeln!(out, "## {title} (n = {})\n", r.n_observations);
    let mut t = Table::new(&["χ²", "df", "p", "CFI", "TLI", "RMSEA", "RMSEA 90% CI", "SRMR"]);
    t.row([
        opt(fm.chisq),
        opt(fm.df),
        fm.pvalue.map_or("NA".into(), pval),
        opt(fm.cfi),
        opt(fm.tli),
        opt(fm.rmsea),
        format!("{}, {}", opt(fm.rmsea_lower), opt(fm.rmsea_upper)),
        opt(fm.srmr),
    ]);
    t.write(out);
    if r.fit_approximated {
        let _ = writeln!(out, "*CFI/TLI approximated from the baseline model.*\n");
    }
    let mut t = Table::new(&["Path", "Estimate", "SE", "z", "p", "Std."]);
    for e in &r.estimates {
        t.row([
            format!("{} {} {}", e.lhs, e.op, e.rhs),
            num(e.est),
            opt(e.se),
            opt(e.z),
            e.pvalue.map_or("NA".into(), pval),
            opt(e.std_all),
        ]);
    }
    t.write(out);
    if !r.r_squared.is_empty() {
        let mut t = Table::new(&["Variable", "R²"]);
        for rs in &r.r_squared {
            t.row([rs.variable.clone(), num(rs.value)]);
        }
        t.write(out);
    }
}

fn p_phrase(p: f64) -> String {
    if p.is_finite() && p < 0.001 {
        "< .001".into()
    } else {
        format!("= {}", pval(p))
    }
}
