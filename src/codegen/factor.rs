//! Exploratory factor analysis.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{complete_cases_guard, embed_matrix, integer, render, string};
use crate::data::DataMatrix;

pub const MIN_VARIABLES: usize = 3;
pub const MIN_OBSERVATIONS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    None,
    #[default]
    Varimax,
    Promax,
    Oblimin,
}

impl Rotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Varimax => "varimax",
            Self::Promax => "promax",
            Self::Oblimin => "oblimin",
        }
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "varimax" => Ok(Self::Varimax),
            "promax" => Ok(Self::Promax),
            "oblimin" => Ok(Self::Oblimin),
            other => Err(format!(
                "unknown rotation `{other}` (none, varimax, promax, oblimin)"
            )),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Factor extraction method (`psych::fa(fm = ...)`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extraction {
    #[default]
    Ml,
    Minres,
    Pa,
}

impl Extraction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ml => "ml",
            Self::Minres => "minres",
            Self::Pa => "pa",
        }
    }
}

impl FromStr for Extraction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ml" => Ok(Self::Ml),
            "minres" => Ok(Self::Minres),
            "pa" => Ok(Self::Pa),
            other => Err(format!("unknown extraction `{other}` (ml, minres, pa)")),
        }
    }
}

impl fmt::Display for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EfaParams {
    /// Fixed number of factors; `None` keeps every eigenvalue above 1.
    pub factors: Option<usize>,
    pub rotation: Rotation,
    pub extraction: Extraction,
}

// Loadings leave R column-major (variables vary fastest).
const TEMPLATE: &str = r#"
{{DATA}}
{{GUARD}}
.r <- stats::cor(data)
.eig <- eigen(.r, symmetric = TRUE, only.values = TRUE)$values
.nf <- {{FACTORS}}
if (is.na(.nf)) .nf <- max(1L, sum(.eig > 1))
if (.nf >= ncol(data)) stop(sprintf("Cannot extract %d factors from %d variables", .nf, ncol(data)))
.kmo <- psych::KMO(.r)
.bart <- psych::cortest.bartlett(.r, n = nrow(data))
.fa <- psych::fa(data, nfactors = .nf, rotate = {{ROTATION}}, fm = {{EXTRACTION}})
.L <- unclass(.fa$loadings)
.ss <- colSums(.L^2)
list(
  n_factors = .nf,
  n_obs = nrow(data),
  variables = colnames(data),
  kmo = .kmo$MSA,
  kmo_per_item = unname(.kmo$MSAi),
  bartlett_chisq = .bart$chisq,
  bartlett_df = .bart$df,
  bartlett_p = .bart$p.value,
  eigenvalues = .eig,
  loadings = as.vector(.L),
  communalities = unname(.fa$communality),
  uniquenesses = unname(.fa$uniquenesses),
  ss_loadings = unname(.ss),
  proportion_variance = unname(.ss / ncol(data)),
  cumulative_variance = unname(cumsum(.ss) / ncol(data))
)
"#;

pub fn program(data: &DataMatrix, params: &EfaParams) -> String {
    render(
        TEMPLATE,
        &[
            ("DATA", embed_matrix(data)),
            (
                "GUARD",
                complete_cases_guard(MIN_OBSERVATIONS, MIN_VARIABLES, true),
            ),
            (
                "FACTORS",
                params.factors.map_or_else(|| "NA_integer_".to_string(), integer),
            ),
            ("ROTATION", string(params.rotation.as_str())),
            ("EXTRACTION", string(params.extraction.as_str())),
        ],
    )
}
