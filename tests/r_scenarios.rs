//! End-to-end scenarios against a real `Rscript`. Opt in with `STATBENCH_R_TESTS=1`;
//! the first run installs psych, GPArotation and lavaan into the configured library.

use std::sync::Arc;

use statbench::{
    analysis::Analyzer,
    codegen::{correlation::CorrelationMethod, factor::EfaParams},
    config::Config,
    data::{DataMatrix, ScaleBounds},
    engine::{Engine, EngineOptions},
    error::EngineError,
    process::r::RscriptLauncher,
};

fn live_analyzer() -> Option<Analyzer> {
    if std::env::var("STATBENCH_R_TESTS").ok().as_deref() != Some("1") {
        eprintln!("skipping R scenario (set STATBENCH_R_TESTS=1 to run)");
        return None;
    }
    let cfg = Config::load();
    let engine = Engine::new(
        Arc::new(RscriptLauncher::from_config(&cfg)),
        EngineOptions::from_config(&cfg),
    );
    Some(Analyzer::new(engine))
}

/// Deterministic pseudo-random noise in [-0.5, 0.5).
fn noise(seed: u64, n: usize) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        })
        .collect()
}

/// Standard normal deviates (Box-Muller over [`noise`]).
fn normals(seed: u64, n: usize) -> Vec<f64> {
    let u = noise(seed, 2 * n);
    (0..n)
        .map(|i| {
            let (a, b) = (u[2 * i] + 0.5, u[2 * i + 1] + 0.5);
            (-2.0 * a.max(1e-12).ln()).sqrt() * (std::f64::consts::TAU * b).cos()
        })
        .collect()
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Centered, mutually orthogonal columns with sample sd exactly 1.
fn orthonormal(mut columns: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    for j in 0..columns.len() {
        let m = mean(&columns[j]);
        columns[j].iter_mut().for_each(|x| *x -= m);
        for k in 0..j {
            let proj = dot(&columns[j], &columns[k]) / dot(&columns[k], &columns[k]);
            let prev = columns[k].clone();
            columns[j].iter_mut().zip(&prev).for_each(|(x, p)| *x -= proj * p);
        }
        let n = columns[j].len() as f64;
        let sd = (dot(&columns[j], &columns[j]) / (n - 1.0)).sqrt();
        columns[j].iter_mut().for_each(|x| *x /= sd);
    }
    columns
}

/// `k` items over `n` rows whose pairwise sample correlations are exactly `r`.
fn equicorrelated(n: usize, k: usize, r: f64) -> DataMatrix {
    let basis = orthonormal((0..=k).map(|j| normals(11 + j as u64, n)).collect());
    let (common, unique) = (r.sqrt(), (1.0 - r).sqrt());
    let columns = (1..=k)
        .map(|j| {
            (0..n)
                .map(|i| 3.0 + common * basis[0][i] + unique * basis[j][i])
                .collect()
        })
        .collect();
    DataMatrix::from_columns(columns).unwrap()
}

/// A sample with exactly the given mean and sd.
fn sample(seed: u64, n: usize, m: f64, sd: f64) -> Vec<f64> {
    let z = orthonormal(vec![normals(seed, n)]).remove(0);
    z.into_iter().map(|x| m + sd * x).collect()
}

fn likert(n: usize) -> DataMatrix {
    let base = noise(7, n);
    let rows = (0..n)
        .map(|i| {
            let trait_level = 3.0 + 3.0 * base[i];
            let e = noise(100 + i as u64, 4);
            vec![
                (trait_level + e[0]).round().clamp(1.0, 5.0),
                (trait_level + e[1]).round().clamp(1.0, 5.0),
                (trait_level + e[2]).round().clamp(1.0, 5.0),
                // Reverse-keyed item.
                (6.0 - trait_level + e[3]).round().clamp(1.0, 5.0),
            ]
        })
        .collect();
    DataMatrix::from_rows(rows)
        .unwrap()
        .with_names(["Q1", "Q2", "Q3", "Q4r"])
        .unwrap()
}

#[tokio::test]
async fn reliability_of_five_moderately_correlated_items() {
    let Some(analyzer) = live_analyzer() else { return };
    let result = analyzer
        .reliability(&equicorrelated(50, 5, 0.6), None)
        .await
        .unwrap();
    assert_eq!(result.n_items, 5);
    assert!((0.85..=0.95).contains(&result.alpha), "alpha = {}", result.alpha);
    assert!(result.reversed_items.is_empty());
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn two_sample_comparison_with_large_effect() {
    let Some(analyzer) = live_analyzer() else { return };
    let g1 = sample(21, 30, 4.0, 0.5);
    let g2 = sample(22, 30, 3.0, 0.5);

    let result = analyzer.independent_t_test(&g1, &g2).await.unwrap();
    assert!(result.t.abs() > 5.0, "t = {}", result.t);
    assert!(result.p_value < 0.001);
    assert!((1.5..=2.5).contains(&result.effect_size), "d = {}", result.effect_size);
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn near_perfect_predictor_explains_everything() {
    let Some(analyzer) = live_analyzer() else { return };
    let e = noise(5, 40);
    let rows = (0..40)
        .map(|i| {
            let x = i as f64;
            vec![1.0 + 2.0 * x + 0.001 * e[i], x]
        })
        .collect();
    let data = DataMatrix::from_rows(rows)
        .unwrap()
        .with_names(["y", "x"])
        .unwrap();

    let result = analyzer.regression(&data).await.unwrap();
    assert!(result.model_fit.r_squared > 0.9999);
    assert!(result.coefficients[1].p_value < 0.001);
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn reliability_detects_reverse_keyed_items() {
    let Some(analyzer) = live_analyzer() else { return };
    let result = analyzer
        .reliability(&likert(60), ScaleBounds::new(1.0, 5.0))
        .await
        .unwrap();
    assert_eq!(result.reversed_items, vec![3]);
    assert!(result.alpha > 0.7, "alpha = {}", result.alpha);
    assert_eq!(result.item_total_stats.len(), 4);
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn correlation_and_descriptives_agree_on_shape() {
    let Some(analyzer) = live_analyzer() else { return };
    let data = likert(40);

    let corr = analyzer
        .correlation(&data, CorrelationMethod::Pearson)
        .await
        .unwrap();
    for i in 0..4 {
        assert!((corr.correlation_matrix.get(i, i) - 1.0).abs() < 1e-9);
        for j in 0..4 {
            let (a, b) = (corr.correlation_matrix.get(i, j), corr.correlation_matrix.get(j, i));
            assert!((a - b).abs() < 1e-12);
        }
    }
    assert!(corr.correlation_matrix.get(0, 3) < 0.0);

    let desc = analyzer.descriptive(&data).await.unwrap();
    assert_eq!(desc.columns.len(), 4);
    assert!(desc.columns.iter().all(|c| c.min >= 1.0 && c.max <= 5.0));
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn t_test_matches_textbook_example() {
    let Some(analyzer) = live_analyzer() else { return };
    let g1 = [5.1, 4.9, 5.6, 5.8, 6.0, 5.5, 5.3];
    let g2 = [6.2, 6.4, 6.0, 6.8, 6.6, 6.1, 6.5];

    let result = analyzer.independent_t_test(&g1, &g2).await.unwrap();
    assert!(result.t < 0.0);
    assert!(result.p_value < 0.01);
    assert!((result.mean_diff - (result.mean1 - result.mean2)).abs() < 1e-9);
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn regression_recovers_coefficients() {
    let Some(analyzer) = live_analyzer() else { return };
    let e = noise(42, 50);
    let rows = (0..50)
        .map(|i| {
            let x1 = i as f64 / 5.0;
            let x2 = ((i * 7) % 11) as f64;
            vec![2.0 + 0.5 * x1 - 0.3 * x2 + 0.1 * e[i], x1, x2]
        })
        .collect();
    let data = DataMatrix::from_rows(rows)
        .unwrap()
        .with_names(["y", "x1", "x2"])
        .unwrap();

    let result = analyzer.regression(&data).await.unwrap();
    assert!((result.coefficients[1].estimate - 0.5).abs() < 0.05);
    assert!((result.coefficients[2].estimate + 0.3).abs() < 0.05);
    assert!(result.model_fit.r_squared > 0.95);
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn efa_and_cfa_run_on_one_factor_data() {
    let Some(analyzer) = live_analyzer() else { return };
    let data = likert(80);

    let efa = analyzer
        .efa(&data, &EfaParams { factors: Some(1), ..EfaParams::default() })
        .await
        .unwrap();
    assert_eq!(efa.loadings.ncols(), 1);

    let cfa = analyzer
        .cfa(&data, "F =~ Q1 + Q2 + Q3 + Q4r")
        .await
        .unwrap();
    assert_eq!(cfa.n_observations, 80);
    assert!(cfa.estimates.iter().any(|e| e.op == "=~" && e.rhs == "Q4r"));
    analyzer.engine().shutdown().await;
}

#[tokio::test]
async fn r_errors_are_reported_not_fatal() {
    let Some(analyzer) = live_analyzer() else { return };
    let err = analyzer
        .cfa(&likert(30), "F =~ Q1 + Q2 + missing_item")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::RuntimeEvaluation { .. }), "{err:?}");

    // The same interpreter keeps serving requests.
    analyzer
        .correlation(&likert(30), CorrelationMethod::Spearman)
        .await
        .unwrap();
    analyzer.engine().shutdown().await;
}
