//! Inbound API: one async method per procedure.
//!
//! Every call validates on the host, renders the program, evaluates it on the shared
//! engine and decodes the reply into the procedure's result type.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::{
    codegen::{
        self,
        correlation::CorrelationMethod,
        factor::EfaParams,
        structural::ModelKind,
    },
    data::{DataMatrix, ScaleBounds},
    engine::Engine,
    error::{DecodeError, EngineError, ValidationError},
    execution::RValue,
    results::{self, *},
    validate::{self, NonFinitePolicy, Requirements},
};

const RELIABILITY: Requirements = Requirements::new(codegen::reliability::MIN_ITEMS)
    .min_rows(codegen::reliability::MIN_OBSERVATIONS);

const CORRELATION: Requirements = Requirements::new(codegen::correlation::MIN_VARIABLES)
    .min_rows(codegen::correlation::MIN_OBSERVATIONS)
    .non_finite(NonFinitePolicy::DropRows);

const DESCRIPTIVE: Requirements = Requirements::new(1)
    .non_finite(NonFinitePolicy::Tolerate)
    .allow_constant();

const EFA: Requirements = Requirements::new(codegen::factor::MIN_VARIABLES)
    .min_rows(codegen::factor::MIN_OBSERVATIONS)
    .non_finite(NonFinitePolicy::DropRows)
    .more_rows_than_columns();

const REGRESSION: Requirements = Requirements::new(codegen::regression::MIN_COLUMNS)
    .min_rows(codegen::regression::MIN_OBSERVATIONS)
    .non_finite(NonFinitePolicy::DropRows)
    .more_rows_than_columns();

const CHI_SQUARE: Requirements = Requirements::new(2)
    .max_columns(2)
    .min_rows(codegen::categorical::MIN_OBSERVATIONS)
    .non_finite(NonFinitePolicy::DropRows);

const STRUCTURAL: Requirements = Requirements::new(codegen::structural::MIN_VARIABLES)
    .min_rows(codegen::structural::MIN_OBSERVATIONS)
    .non_finite(NonFinitePolicy::DropRows);

/// A procedure and its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureRequest {
    Reliability {
        data: DataMatrix,
        scale: Option<ScaleBounds>,
    },
    Correlation {
        data: DataMatrix,
        method: CorrelationMethod,
    },
    Descriptive {
        data: DataMatrix,
    },
    IndependentT {
        group1: Vec<f64>,
        group2: Vec<f64>,
    },
    PairedT {
        before: Vec<f64>,
        after: Vec<f64>,
    },
    Anova {
        groups: Vec<Vec<f64>>,
    },
    MannWhitney {
        group1: Vec<f64>,
        group2: Vec<f64>,
    },
    Efa {
        data: DataMatrix,
        params: EfaParams,
    },
    /// Dependent variable in column 0.
    Regression {
        data: DataMatrix,
    },
    ChiSquare {
        data: DataMatrix,
    },
    Cfa {
        data: DataMatrix,
        model: String,
    },
    Sem {
        data: DataMatrix,
        model: String,
    },
}

impl ProcedureRequest {
    /// Human-readable procedure name, used in errors and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reliability { .. } => "Reliability",
            Self::Correlation { .. } => "Correlation",
            Self::Descriptive { .. } => "Descriptive statistics",
            Self::IndependentT { .. } => "Independent t-test",
            Self::PairedT { .. } => "Paired t-test",
            Self::Anova { .. } => "ANOVA",
            Self::MannWhitney { .. } => "Mann-Whitney U",
            Self::Efa { .. } => "EFA",
            Self::Regression { .. } => "Regression",
            Self::ChiSquare { .. } => "Chi-square",
            Self::Cfa { .. } => "CFA",
            Self::Sem { .. } => "SEM",
        }
    }
}

/// Result of any procedure, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "procedure", content = "result", rename_all = "camelCase")]
pub enum AnalysisOutput {
    Reliability(ReliabilityResult),
    Correlation(CorrelationResult),
    Descriptive(DescriptiveResult),
    IndependentT(IndependentTTestResult),
    PairedT(PairedTTestResult),
    Anova(AnovaResult),
    MannWhitney(MannWhitneyResult),
    Efa(EfaResult),
    Regression(RegressionResult),
    ChiSquare(ChiSquareResult),
    Cfa(StructuralResult),
    Sem(StructuralResult),
}

#[derive(Clone)]
pub struct Analyzer {
    engine: Engine,
}

impl Analyzer {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Analyzer over [`Engine::global`].
    pub fn global() -> Self {
        Self::new(Engine::global().clone())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// [`run`](Self::run) bounded by `waited`. An expiry while the engine is ready is an
    /// evaluation timeout, otherwise an initialization timeout. The R evaluation is not
    /// cancelled; the session discards its reply when it arrives.
    pub async fn run_within(
        &self,
        request: &ProcedureRequest,
        waited: Duration,
    ) -> Result<AnalysisOutput, EngineError> {
        match tokio::time::timeout(waited, self.run(request)).await {
            Ok(outcome) => outcome,
            Err(_) if self.engine.status().is_ready => Err(EngineError::EvaluationTimeout {
                procedure: request.label().to_string(),
                waited,
            }),
            Err(_) => Err(EngineError::InitializationTimeout { waited }),
        }
    }

    pub async fn run(&self, request: &ProcedureRequest) -> Result<AnalysisOutput, EngineError> {
        use ProcedureRequest as R;
        Ok(match request {
            R::Reliability { data, scale } => {
                AnalysisOutput::Reliability(self.reliability(data, *scale).await?)
            }
            R::Correlation { data, method } => {
                AnalysisOutput::Correlation(self.correlation(data, *method).await?)
            }
            R::Descriptive { data } => AnalysisOutput::Descriptive(self.descriptive(data).await?),
            R::IndependentT { group1, group2 } => {
                AnalysisOutput::IndependentT(self.independent_t_test(group1, group2).await?)
            }
            R::PairedT { before, after } => {
                AnalysisOutput::PairedT(self.paired_t_test(before, after).await?)
            }
            R::Anova { groups } => AnalysisOutput::Anova(self.anova(groups).await?),
            R::MannWhitney { group1, group2 } => {
                AnalysisOutput::MannWhitney(self.mann_whitney(group1, group2).await?)
            }
            R::Efa { data, params } => AnalysisOutput::Efa(self.efa(data, params).await?),
            R::Regression { data } => AnalysisOutput::Regression(self.regression(data).await?),
            R::ChiSquare { data } => AnalysisOutput::ChiSquare(self.chi_square(data).await?),
            R::Cfa { data, model } => AnalysisOutput::Cfa(self.cfa(data, model).await?),
            R::Sem { data, model } => AnalysisOutput::Sem(self.sem(data, model).await?),
        })
    }

    /// Cronbach's alpha. With `scale`, values are clamped into the declared bounds and
    /// reversal uses them.
    pub async fn reliability(
        &self,
        data: &DataMatrix,
        scale: Option<ScaleBounds>,
    ) -> Result<ReliabilityResult, EngineError> {
        let label = "Reliability";
        // Clamp first so a column flattened by the bounds fails validation here.
        let data = codegen::reliability::clamped(data, scale);
        let data = validate::prepare(&data, &RELIABILITY, label)?;
        let program = codegen::reliability::program(&data, scale);
        self.execute(label, &program, results::decode_reliability).await
    }

    pub async fn correlation(
        &self,
        data: &DataMatrix,
        method: CorrelationMethod,
    ) -> Result<CorrelationResult, EngineError> {
        let label = "Correlation";
        let data = validate::prepare(data, &CORRELATION, label)?;
        let program = codegen::correlation::program(&data, method);
        self.execute(label, &program, results::decode_correlation).await
    }

    /// Per-column summaries; non-finite cells count as missing.
    pub async fn descriptive(&self, data: &DataMatrix) -> Result<DescriptiveResult, EngineError> {
        let label = "Descriptive statistics";
        let data = validate::prepare(data, &DESCRIPTIVE, label)?;
        let program = codegen::descriptive::program(&data);
        self.execute(label, &program, results::decode_descriptive).await
    }

    pub async fn independent_t_test(
        &self,
        group1: &[f64],
        group2: &[f64],
    ) -> Result<IndependentTTestResult, EngineError> {
        let label = "Independent t-test";
        validate::validate_groups(
            &[group1.to_vec(), group2.to_vec()],
            2,
            codegen::comparison::MIN_GROUP_SIZE,
            label,
        )?;
        let program = codegen::comparison::independent_t(group1, group2);
        self.execute(label, &program, results::decode_independent_t).await
    }

    pub async fn paired_t_test(
        &self,
        before: &[f64],
        after: &[f64],
    ) -> Result<PairedTTestResult, EngineError> {
        let label = "Paired t-test";
        if before.len() != after.len() {
            return Err(ValidationError::LengthMismatch {
                label: label.into(),
                left: "before".into(),
                left_len: before.len(),
                right: "after".into(),
                right_len: after.len(),
            }
            .into());
        }
        validate::validate_sample(before, "before", codegen::comparison::MIN_GROUP_SIZE, label)?;
        validate::validate_sample(after, "after", codegen::comparison::MIN_GROUP_SIZE, label)?;
        let first = before[0] - after[0];
        if before.iter().zip(after).all(|(b, a)| b - a == first) {
            return Err(ValidationError::ZeroVarianceColumn {
                label: label.into(),
                column: "before - after".into(),
            }
            .into());
        }
        let program = codegen::comparison::paired_t(before, after);
        self.execute(label, &program, results::decode_paired_t).await
    }

    pub async fn anova(&self, groups: &[Vec<f64>]) -> Result<AnovaResult, EngineError> {
        let label = "ANOVA";
        validate::validate_groups(groups, 2, codegen::comparison::MIN_GROUP_SIZE, label)?;
        let program = codegen::comparison::one_way_anova(groups);
        self.execute(label, &program, results::decode_anova).await
    }

    /// Rank-based comparison. Constant groups are allowed: ranks still separate them.
    pub async fn mann_whitney(
        &self,
        group1: &[f64],
        group2: &[f64],
    ) -> Result<MannWhitneyResult, EngineError> {
        let label = "Mann-Whitney U";
        validate::validate_sample(group1, &validate::group_name(0), 1, label)?;
        validate::validate_sample(group2, &validate::group_name(1), 1, label)?;
        let program = codegen::comparison::mann_whitney(group1, group2);
        self.execute(label, &program, results::decode_mann_whitney).await
    }

    pub async fn efa(&self, data: &DataMatrix, params: &EfaParams) -> Result<EfaResult, EngineError> {
        let label = "EFA";
        let data = validate::prepare(data, &EFA, label)?;
        if let Some(k) = params.factors {
            if k == 0 || k >= data.ncols() {
                return Err(ValidationError::InvalidParameter {
                    label: label.into(),
                    name: "factors".into(),
                    reason: format!("must be between 1 and {}", data.ncols() - 1),
                }
                .into());
            }
        }
        let program = codegen::factor::program(&data, params);
        let params = *params;
        self.execute(label, &program, move |raw| results::decode_efa(raw, &params))
            .await
    }

    /// Ordinary least squares of column 0 on the remaining columns.
    pub async fn regression(&self, data: &DataMatrix) -> Result<RegressionResult, EngineError> {
        let label = "Regression";
        let data = validate::prepare(data, &REGRESSION, label)?;
        let program = codegen::regression::program(&data);
        self.execute(label, &program, results::decode_regression).await
    }

    /// Independence of two categorical columns (numeric category codes).
    pub async fn chi_square(&self, data: &DataMatrix) -> Result<ChiSquareResult, EngineError> {
        let label = "Chi-square";
        let data = validate::prepare(data, &CHI_SQUARE, label)?;
        let program = codegen::categorical::program(&data);
        self.execute(label, &program, results::decode_chi_square).await
    }

    pub async fn cfa(&self, data: &DataMatrix, model: &str) -> Result<StructuralResult, EngineError> {
        self.structural(data, model, ModelKind::Cfa).await
    }

    pub async fn sem(&self, data: &DataMatrix, model: &str) -> Result<StructuralResult, EngineError> {
        self.structural(data, model, ModelKind::Sem).await
    }

    async fn structural(
        &self,
        data: &DataMatrix,
        model: &str,
        kind: ModelKind,
    ) -> Result<StructuralResult, EngineError> {
        let label = kind.label();
        validate::validate_model_syntax(model, kind.operators(), label)?;
        let data = validate::prepare(data, &STRUCTURAL, label)?;
        let program = codegen::structural::program(&data, model, kind);
        self.execute(label, &program, move |raw| results::decode_structural(raw, kind))
            .await
    }

    async fn execute<T>(
        &self,
        procedure: &str,
        program: &str,
        decode: impl FnOnce(&RValue) -> Result<T, DecodeError>,
    ) -> Result<T, EngineError> {
        let raw = self.engine.evaluate(procedure, program).await?;
        debug!(procedure, fields = raw.len(), "decoding result");
        decode(&raw).map_err(|source| EngineError::Decode {
            procedure: procedure.to_string(),
            source,
        })
    }
}
