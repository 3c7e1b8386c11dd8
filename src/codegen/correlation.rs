use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{complete_cases_guard, embed_matrix, render, string};
use crate::data::DataMatrix;

pub const MIN_VARIABLES: usize = 2;
pub const MIN_OBSERVATIONS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrelationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            other => Err(format!("unknown correlation method `{other}` (pearson, spearman)")),
        }
    }
}

// p-values are unadjusted; both matrices are flattened row by row.
const TEMPLATE: &str = r#"
{{DATA}}
{{GUARD}}
.ct <- psych::corr.test(as.data.frame(data), method = {{METHOD}}, adjust = "none", ci = FALSE)
list(
  method = {{METHOD}},
  n_obs = nrow(data),
  variables = colnames(data),
  r = as.vector(t(.ct$r)),
  p = as.vector(t(.ct$p))
)
"#;

pub fn program(data: &DataMatrix, method: CorrelationMethod) -> String {
    render(
        TEMPLATE,
        &[
            ("DATA", embed_matrix(data)),
            ("GUARD", complete_cases_guard(MIN_OBSERVATIONS, MIN_VARIABLES, false)),
            ("METHOD", string(method.as_str())),
        ],
    )
}
