//! Interpreter process management (startup/IO/health).

use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::EvalError, execution::RValue};

pub mod r;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterType {
    R,
}

/// A booted interpreter able to evaluate program text.
///
/// Implementations may serialize concurrent `eval` calls internally; callers must
/// not assume parallel throughput.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Evaluate `program` and return the value of its last expression.
    async fn eval(&self, program: &str) -> Result<RValue, EvalError>;

    /// Cheap liveness check.
    async fn probe(&self) -> Result<(), EvalError> {
        self.eval("TRUE").await.map(|_| ())
    }

    /// Release the underlying process. Further `eval` calls fail.
    async fn shutdown(&self) {}
}

/// Constructs and boots interpreters (the sandbox factory).
#[async_trait]
pub trait Launcher: Send + Sync {
    fn interpreter_type(&self) -> InterpreterType {
        InterpreterType::R
    }

    async fn launch(&self) -> anyhow::Result<Arc<dyn Interpreter>>;
}
