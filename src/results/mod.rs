//! Typed result contracts, one per procedure, and the decoders that build them from
//! the named list each generated program returns.
//!
//! Contracts serialize with camelCase names; they are what report and export
//! collaborators consume. Statistics R may legitimately leave undefined are `Option`.

mod categorical;
mod comparison;
mod correlation;
mod descriptive;
mod factor;
mod regression;
mod reliability;
mod structural;

pub use categorical::ChiSquareResult;
pub use comparison::{AnovaResult, IndependentTTestResult, MannWhitneyResult, PairedTTestResult};
pub use correlation::CorrelationResult;
pub use descriptive::{ColumnSummary, DescriptiveResult};
pub use factor::EfaResult;
pub use regression::{Coefficient, ModelFit, RegressionChart, RegressionResult};
pub use reliability::{ItemStatistics, ReliabilityResult};
pub use structural::{FitMeasures, ParameterEstimate, RSquared, StructuralResult};

pub(crate) use categorical::decode as decode_chi_square;
pub(crate) use comparison::{
    decode_anova, decode_independent_t, decode_mann_whitney, decode_paired_t,
};
pub(crate) use correlation::decode as decode_correlation;
pub(crate) use descriptive::decode as decode_descriptive;
pub(crate) use factor::decode as decode_efa;
pub(crate) use regression::decode as decode_regression;
pub(crate) use reliability::decode as decode_reliability;
pub(crate) use structural::decode as decode_structural;

use crate::{error::DecodeError, marshal::Fields};

/// Decode every record of the list field `name` with `f`.
fn each<'a, T>(
    fields: &Fields<'a>,
    name: &str,
    f: impl Fn(&Fields<'a>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    fields.records(name)?.iter().map(f).collect()
}

fn check_len(field: &str, len: usize, expected: usize) -> Result<(), DecodeError> {
    if len == expected {
        Ok(())
    } else {
        Err(DecodeError::DimensionMismatch {
            field: field.to_string(),
            len,
            rows: expected,
        })
    }
}
