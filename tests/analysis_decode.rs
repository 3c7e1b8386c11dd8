mod common;

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use common::{engine_with, fast_options, FakeLauncher};
use serde_json::json;
use statbench::{
    analysis::{AnalysisOutput, Analyzer, ProcedureRequest},
    codegen::{
        correlation::CorrelationMethod,
        factor::{EfaParams, Rotation},
    },
    data::{DataMatrix, ScaleBounds},
    error::{DecodeError, EngineError, ValidationError},
    report,
};

fn analyzer(launcher: FakeLauncher) -> (Analyzer, Arc<FakeLauncher>) {
    let launcher = Arc::new(launcher);
    let engine = engine_with(&launcher, fast_options());
    (Analyzer::new(engine), launcher)
}

fn items() -> DataMatrix {
    DataMatrix::from_rows(vec![
        vec![4.0, 5.0, 2.0],
        vec![3.0, 4.0, 3.0],
        vec![5.0, 5.0, 1.0],
        vec![2.0, 3.0, 4.0],
        vec![4.0, 4.0, 2.0],
        vec![1.0, 2.0, 5.0],
    ])
    .unwrap()
    .with_names(["Q1", "Q2", "Q3"])
    .unwrap()
}

fn validation(err: EngineError) -> ValidationError {
    match err {
        EngineError::Validation(v) => v,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn reliability_reports_zero_based_reversed_items() {
    let reply = json!({
        "n_items": [3], "n_obs": [6],
        "raw_alpha": [0.91], "std_alpha": [0.92], "average_r": [0.79],
        "omega_total": ["NA"],
        "reversed": [3],
        "items": [
            {"item": ["Q1"], "scale_mean_if_deleted": [7.8], "scale_variance_if_deleted": [4.1],
             "corrected_item_total": [0.88], "alpha_if_deleted": [0.85], "reversed": [false]},
            {"item": ["Q2"], "scale_mean_if_deleted": [7.2], "scale_variance_if_deleted": [4.6],
             "corrected_item_total": [0.81], "alpha_if_deleted": [0.9], "reversed": [false]},
            {"item": ["Q3"], "scale_mean_if_deleted": [7.5], "scale_variance_if_deleted": [3.9],
             "corrected_item_total": [0.86], "alpha_if_deleted": [0.87], "reversed": [true]}
        ]
    });
    let (analyzer, launcher) = analyzer(FakeLauncher::new().reply("psych::alpha", reply));

    let result = analyzer
        .reliability(&items(), ScaleBounds::new(1.0, 5.0))
        .await
        .unwrap();
    assert_eq!(result.n_items, 3);
    assert_eq!(result.reversed_items, vec![2]);
    assert_eq!(result.omega_total, None);
    assert!(result.item_total_stats[2].reversed);
    assert_eq!(result.item_total_stats[0].item, "Q1");

    let programs = launcher.last().programs.lock().unwrap().clone();
    let program = programs.last().unwrap();
    assert!(program.contains("\"Q1\""));
}

#[tokio::test]
async fn reliability_rejects_missing_cells_before_evaluation() {
    let (analyzer, launcher) = analyzer(FakeLauncher::new());
    let data = DataMatrix::from_rows(vec![
        vec![1.0, 2.0],
        vec![2.0, f64::NAN],
        vec![3.0, 1.0],
    ])
    .unwrap();

    let err = validation(analyzer.reliability(&data, None).await.err().unwrap());
    assert_eq!(
        err,
        ValidationError::NonFiniteValue {
            label: "Reliability".into(),
            column: "V2".into(),
            row: 2,
        }
    );
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn columns_constant_after_clamping_fail_validation() {
    let (analyzer, launcher) = analyzer(FakeLauncher::new().failing_on("Zero-variance column"));
    let data = DataMatrix::from_rows(vec![
        vec![1.0, 6.0, 2.0],
        vec![2.0, 7.0, 3.0],
        vec![4.0, 8.0, 3.0],
        vec![5.0, 9.0, 5.0],
    ])
    .unwrap()
    .with_names(["Q1", "Q2", "Q3"])
    .unwrap();

    let err = validation(
        analyzer
            .reliability(&data, ScaleBounds::new(1.0, 5.0))
            .await
            .err()
            .unwrap(),
    );
    assert_eq!(
        err,
        ValidationError::ZeroVarianceColumn {
            label: "Reliability".into(),
            column: "Q2".into(),
        }
    );
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn constant_columns_are_rejected() {
    let (analyzer, _) = analyzer(FakeLauncher::new());
    let data = DataMatrix::from_rows(vec![vec![1.0, 3.0], vec![2.0, 3.0], vec![4.0, 3.0]])
        .unwrap()
        .with_names(["a", "b"])
        .unwrap();

    let err = validation(
        analyzer
            .correlation(&data, CorrelationMethod::Pearson)
            .await
            .err()
            .unwrap(),
    );
    assert!(matches!(err, ValidationError::ZeroVarianceColumn { ref column, .. } if column == "b"));
    assert_eq!(err.code(), "VALIDATION_ZERO_VARIANCE");
}

#[tokio::test]
async fn correlation_matrices_are_row_major() {
    let reply = json!({
        "method": ["spearman"], "n_obs": [6],
        "variables": ["Q1", "Q2", "Q3"],
        "r": [1.0, 0.9, -0.8, 0.9, 1.0, -0.7, -0.8, -0.7, 1.0],
        "p": [0.0, 0.01, 0.05, 0.01, 0.0, 0.1, 0.05, 0.1, 0.0]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("corr.test", reply));

    let result = analyzer
        .correlation(&items(), CorrelationMethod::Spearman)
        .await
        .unwrap();
    assert_eq!(result.method, CorrelationMethod::Spearman);
    assert_eq!(result.correlation_matrix.get(0, 2), -0.8);
    assert_eq!(result.p_values.get(2, 1), 0.1);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["correlationMatrix"][1][2], -0.7);
}

#[tokio::test]
async fn mismatched_matrix_is_a_decode_error() {
    let reply = json!({
        "method": ["pearson"], "n_obs": [6],
        "variables": ["Q1", "Q2", "Q3"],
        "r": [1.0, 0.9, 0.9, 1.0],
        "p": [0.0, 0.01, 0.01, 0.0]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("corr.test", reply));

    let err = analyzer
        .correlation(&items(), CorrelationMethod::Pearson)
        .await
        .err()
        .unwrap();
    match err {
        EngineError::Decode { procedure, source } => {
            assert_eq!(procedure, "Correlation");
            assert!(matches!(source, DecodeError::DimensionMismatch { len: 4, rows: 3, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn efa_loadings_are_variables_by_factors() {
    let reply = json!({
        "n_factors": [2], "n_obs": [6],
        "variables": ["Q1", "Q2", "Q3"],
        "kmo": [0.71], "kmo_per_item": [0.7, 0.72, 0.69],
        "bartlett_chisq": [12.3], "bartlett_df": [3], "bartlett_p": [0.006],
        "eigenvalues": [2.4, 0.4, 0.2],
        "loadings": [0.9, 0.8, 0.1, 0.2, 0.3, 0.95],
        "communalities": [0.85, 0.73, 0.91],
        "uniquenesses": [0.15, 0.27, 0.09],
        "ss_loadings": [1.46, 1.03],
        "proportion_variance": [0.49, 0.34],
        "cumulative_variance": [0.49, 0.83]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("psych::fa(", reply));
    let params = EfaParams {
        factors: Some(2),
        rotation: Rotation::Promax,
        ..EfaParams::default()
    };
    let data = DataMatrix::from_rows(vec![
        vec![4.0, 5.0, 2.0],
        vec![3.0, 4.0, 3.0],
        vec![5.0, 5.0, 1.0],
        vec![2.0, 3.0, 4.0],
        vec![4.0, 4.0, 2.0],
        vec![1.0, 2.0, 5.0],
        vec![3.0, 3.0, 3.0],
    ])
    .unwrap();

    let result = analyzer.efa(&data, &params).await.unwrap();
    assert_eq!(result.rotation, Rotation::Promax);
    assert_eq!((result.loadings.nrows(), result.loadings.ncols()), (3, 2));
    // Column-major input: Q3's loading on factor 2 is the last value.
    assert_eq!(result.loadings.get(2, 1), 0.95);
    assert_eq!(result.loadings.get(0, 1), 0.2);
}

#[tokio::test]
async fn efa_rejects_impossible_factor_counts() {
    let (analyzer, launcher) = analyzer(FakeLauncher::new());
    let data = DataMatrix::from_rows(vec![
        vec![4.0, 5.0, 2.0],
        vec![3.0, 4.0, 3.0],
        vec![5.0, 5.0, 1.0],
        vec![2.0, 3.0, 4.0],
        vec![4.0, 4.0, 2.0],
    ])
    .unwrap();
    let params = EfaParams {
        factors: Some(3),
        ..EfaParams::default()
    };

    let err = validation(analyzer.efa(&data, &params).await.err().unwrap());
    assert!(matches!(err, ValidationError::InvalidParameter { ref name, .. } if name == "factors"));
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn regression_builds_the_equation() {
    let reply = json!({
        "dependent": ["score"], "n_obs": [6],
        "r_squared": [0.64], "adj_r_squared": [0.4], "f_statistic": [2.67],
        "df_model": [2], "df_residual": [3], "p_value": [0.21],
        "residual_se": [0.9], "durbin_watson": [1.8],
        "coefficients": [
            {"term": ["(Intercept)"], "estimate": [1.5], "std_error": [0.5], "t_value": [3.0],
             "p_value": [0.05], "std_beta": ["NA"], "vif": ["NA"]},
            {"term": ["hours"], "estimate": [0.25], "std_error": [0.1], "t_value": [2.5],
             "p_value": [0.08], "std_beta": [0.6], "vif": [1.2]},
            {"term": ["age"], "estimate": [-0.123], "std_error": [0.2], "t_value": [-0.6],
             "p_value": [0.58], "std_beta": [-0.2], "vif": [1.2]}
        ],
        "observed": [3, 4, 5, 2, 4, 1],
        "fitted": [3.1, 3.9, 4.8, 2.2, 3.9, 1.1],
        "residuals": [-0.1, 0.1, 0.2, -0.2, 0.1, -0.1]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("stats::lm(y ~", reply));
    let data = items().with_names(["score", "hours", "age"]).unwrap();

    let result = analyzer.regression(&data).await.unwrap();
    assert_eq!(result.equation, "score = 1.500 + 0.250 × hours - 0.123 × age");
    assert_eq!(result.coefficients[0].vif, None);
    assert_eq!(result.coefficients[1].standardized_beta, Some(0.6));
    assert_eq!(result.chart.fitted.len(), 6);
}

#[tokio::test]
async fn regression_needs_more_rows_than_columns() {
    let (analyzer, _) = analyzer(FakeLauncher::new());
    let data = DataMatrix::from_rows(vec![
        vec![1.0, 2.0, 3.0],
        vec![2.0, 1.0, 5.0],
        vec![3.0, 4.0, 4.0],
    ])
    .unwrap();

    let err = validation(analyzer.regression(&data).await.err().unwrap());
    assert_eq!(
        err,
        ValidationError::InsufficientObservations {
            label: "Regression".into(),
            required: 4,
            found: 3,
        }
    );
}

#[tokio::test]
async fn group_comparisons_decode() {
    let t_reply = json!({
        "t": [-2.5], "df": [8], "p_value": [0.037],
        "mean1": [3.0], "mean2": [4.6], "sd1": [1.0], "sd2": [1.0],
        "n1": [5], "n2": [5], "mean_diff": [-1.6],
        "ci_lower": [-3.07], "ci_upper": [-0.13],
        "cohens_d": [-1.6], "var_test_p": [0.9], "equal_variance": [true]
    });
    let u_reply = json!({
        "u_statistic": [12], "p_value": [0.03], "rank_biserial": [-0.4],
        "median1": [3], "median2": [5], "n1": [6], "n2": [5]
    });
    let (analyzer, _) = analyzer(
        FakeLauncher::new()
            .reply("var.equal = .equal", t_reply)
            .reply("wilcox.test", u_reply),
    );
    let g1 = [2.0, 3.0, 4.0, 3.0, 3.0];
    let g2 = [4.0, 5.0, 6.0, 4.0, 4.0];

    let t = analyzer.independent_t_test(&g1, &g2).await.unwrap();
    assert!(t.equal_variance);
    assert_eq!(t.effect_size, -1.6);
    assert_eq!(t.n1, 5);

    let u = analyzer.mann_whitney(&[1.0; 6], &g2).await.unwrap();
    assert_eq!(u.effect_size, -0.4);
    assert_eq!(u.n1, 6);
}

#[tokio::test]
async fn paired_samples_must_line_up_and_differ() {
    let (analyzer, launcher) = analyzer(FakeLauncher::new());

    let err = validation(
        analyzer
            .paired_t_test(&[1.0, 2.0, 3.0], &[1.0, 2.0])
            .await
            .err()
            .unwrap(),
    );
    assert!(matches!(err, ValidationError::LengthMismatch { left_len: 3, right_len: 2, .. }));

    let err = validation(
        analyzer
            .paired_t_test(&[1.0, 2.0, 3.0], &[2.0, 3.0, 4.0])
            .await
            .err()
            .unwrap(),
    );
    assert!(matches!(err, ValidationError::ZeroVarianceColumn { .. }));
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn anova_needs_two_groups() {
    let (analyzer, _) = analyzer(FakeLauncher::new());
    let err = validation(analyzer.anova(&[vec![1.0, 2.0, 3.0]]).await.err().unwrap());
    assert!(matches!(err, ValidationError::InsufficientVariables { required: 2, found: 1, .. }));
}

#[tokio::test]
async fn anova_decodes_group_summaries() {
    let reply = json!({
        "f": [9.5], "df_between": [2], "df_within": [9], "p_value": [0.006],
        "eta_squared": [0.68],
        "group_means": [2.0, 4.0, 6.0], "group_sds": [1.0, 1.0, 1.2], "group_sizes": [4, 4, 4],
        "grand_mean": [4.0], "var_test_p": [0.8],
        "welch_f": ["NA"], "welch_df": ["NA"], "welch_p": ["NA"]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("aov(", reply));
    let groups = vec![
        vec![1.0, 2.0, 3.0, 2.0],
        vec![3.0, 4.0, 5.0, 4.0],
        vec![5.0, 6.0, 7.5, 5.5],
    ];

    let result = analyzer.anova(&groups).await.unwrap();
    assert_eq!(result.group_sizes, vec![4, 4, 4]);
    assert_eq!(result.welch_f, None);
}

#[tokio::test]
async fn chi_square_keeps_level_labels() {
    let reply = json!({
        "row_variable": ["sex"], "column_variable": ["smoker"],
        "chi_square": [3.2], "df": [1], "p_value": [0.07], "cramers_v": [0.3],
        "n": [36],
        "row_levels": [1, 2], "column_levels": ["0", "1"],
        "observed": [10, 8, 5, 13], "expected": [7.5, 10.5, 7.5, 10.5],
        "low_expected_cells": [0], "fisher_p": [0.09]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("chisq.test", reply));
    let data = DataMatrix::from_rows(vec![
        vec![1.0, 0.0],
        vec![2.0, 1.0],
        vec![1.0, 1.0],
        vec![2.0, 0.0],
    ])
    .unwrap()
    .with_names(["sex", "smoker"])
    .unwrap();

    let result = analyzer.chi_square(&data).await.unwrap();
    assert_eq!(result.row_levels, vec!["1", "2"]);
    assert_eq!(result.observed.row(1), &[5.0, 13.0]);
    assert_eq!(result.fisher_p, Some(0.09));
}

#[tokio::test]
async fn chi_square_takes_exactly_two_columns() {
    let (analyzer, _) = analyzer(FakeLauncher::new());
    let err = validation(analyzer.chi_square(&items()).await.err().unwrap());
    assert!(matches!(err, ValidationError::InvalidParameter { ref name, .. } if name == "columns"));
}

fn structural_data() -> DataMatrix {
    let rows = (0..12)
        .map(|i| {
            let x = i as f64;
            vec![x, x * 0.5 + (i % 3) as f64, x * 0.8 - (i % 2) as f64]
        })
        .collect();
    DataMatrix::from_rows(rows)
        .unwrap()
        .with_names(["a", "b", "c"])
        .unwrap()
}

#[tokio::test]
async fn cfa_decodes_fit_and_estimates() {
    let reply = json!({
        "n_obs": [12],
        "fit": {
            "chisq": [0.0], "df": [0], "pvalue": ["NA"], "cfi": [1.0], "tli": [1.0],
            "rmsea": [0.0], "rmsea_lower": [0.0], "rmsea_upper": [0.0],
            "srmr": [0.0], "aic": [120.5], "bic": [124.9]
        },
        "fit_approximated": [false],
        "estimates": [
            {"lhs": ["F"], "op": ["=~"], "rhs": ["a"], "est": [1.0],
             "se": ["NA"], "z": ["NA"], "pvalue": ["NA"], "std_all": [0.9]},
            {"lhs": ["F"], "op": ["=~"], "rhs": ["b"], "est": [0.6],
             "se": [0.1], "z": [6.0], "pvalue": [0.0], "std_all": [0.8]}
        ],
        "r_squared_names": ["a", "b"],
        "r_squared": [0.81, 0.64]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply("lavaan::cfa(", reply));

    let result = analyzer
        .cfa(&structural_data(), "F =~ a + b + c")
        .await
        .unwrap();
    assert_eq!(result.fit_measures.pvalue, None);
    assert_eq!(result.estimates[0].se, None);
    assert_eq!(result.estimates[1].z, Some(6.0));
    assert_eq!(result.r_squared[1].variable, "b");

    let output = AnalysisOutput::Cfa(result);
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["procedure"], "cfa");
    assert_eq!(json["result"]["fitMeasures"]["aic"], 120.5);
    assert!(report::render(&output).contains("CFI"));
}

#[tokio::test]
async fn structural_models_are_checked_before_evaluation() {
    let (analyzer, launcher) = analyzer(FakeLauncher::new());

    let err = validation(analyzer.cfa(&structural_data(), "a ~ b").await.err().unwrap());
    assert!(matches!(err, ValidationError::InvalidParameter { ref name, .. } if name == "model"));

    let err = validation(analyzer.sem(&structural_data(), "   ").await.err().unwrap());
    assert!(matches!(err, ValidationError::InvalidParameter { ref name, .. } if name == "model"));
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn runtime_failures_surface_the_r_message() {
    let (analyzer, launcher) = analyzer(FakeLauncher::new().failing_on("lavaan::sem("));

    let err = analyzer
        .sem(&structural_data(), "F =~ a + b\nc ~ F")
        .await
        .err()
        .unwrap();
    assert_eq!(err.code(), "RUNTIME_EVAL_FAILED");
    assert!(err.to_string().starts_with("SEM failed in R"));
    assert!(launcher.last().alive.load(Ordering::SeqCst));
}

#[tokio::test]
async fn run_dispatches_by_request() {
    let reply = json!({
        "n": [6], "variables": ["Q1"],
        "columns": [
            {"mean": [3.17], "sd": [1.47], "min": [1], "max": [5], "median": [3.5],
             "skew": [-0.3], "kurtosis": [-1.4], "se": [0.6], "n_valid": [6]}
        ]
    });
    let (analyzer, _) = analyzer(FakeLauncher::new().reply(".describe", reply));
    let data = DataMatrix::from_columns(vec![vec![4.0, 3.0, 5.0, 2.0, 4.0, 1.0]])
        .unwrap()
        .with_names(["Q1"])
        .unwrap();
    let request = ProcedureRequest::Descriptive { data };
    assert_eq!(request.label(), "Descriptive statistics");

    match analyzer.run(&request).await.unwrap() {
        AnalysisOutput::Descriptive(result) => {
            assert_eq!(result.columns[0].variable, "Q1");
            assert_eq!(result.columns[0].n_valid, 6);
        }
        other => panic!("unexpected output: {other:?}"),
    }
}

fn one_column() -> DataMatrix {
    DataMatrix::from_columns(vec![vec![4.0, 3.0, 5.0, 2.0, 4.0, 1.0]]).unwrap()
}

#[tokio::test]
async fn slow_evaluation_on_a_ready_engine_is_an_evaluation_timeout() {
    let (analyzer, launcher) =
        analyzer(FakeLauncher::new().slow_on(".describe", Duration::from_millis(300)));
    analyzer.engine().ensure_ready().await.unwrap();

    let request = ProcedureRequest::Descriptive { data: one_column() };
    let err = analyzer
        .run_within(&request, Duration::from_millis(30))
        .await
        .err()
        .unwrap();
    match &err {
        EngineError::EvaluationTimeout { procedure, waited } => {
            assert_eq!(procedure, "Descriptive statistics");
            assert_eq!(*waited, Duration::from_millis(30));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code(), "RUNTIME_EVAL_TIMEOUT");
    assert!(err.is_recoverable());
    assert!(analyzer.engine().status().is_ready);
    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn slow_boot_is_an_initialization_timeout() {
    let (analyzer, _) = analyzer(FakeLauncher::new().with_delay(Duration::from_millis(300)));

    let request = ProcedureRequest::Descriptive { data: one_column() };
    let err = analyzer
        .run_within(&request, Duration::from_millis(30))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::InitializationTimeout { .. }), "{err:?}");
}
