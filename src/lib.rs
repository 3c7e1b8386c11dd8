//! Statistical procedures evaluated on an embedded R runtime.
//!
//! [`analysis::Analyzer`] is the entry point: it validates input on the host, renders
//! an R program per procedure, evaluates it on the shared [`engine::Engine`] and
//! decodes the reply into the typed contracts in [`results`].

pub mod analysis;
pub mod codegen;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod execution;
pub mod i18n;
pub mod marshal;
pub mod printer;
pub mod process;
pub mod report;
pub mod results;
pub mod utils;
pub mod validate;

pub use analysis::{AnalysisOutput, Analyzer, ProcedureRequest};
pub use data::{DataMatrix, ScaleBounds};
pub use engine::{Engine, EngineOptions, EngineStatus};
pub use error::{DecodeError, EngineError, EvalError, ValidationError};
