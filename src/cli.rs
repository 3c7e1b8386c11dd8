use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use statbench::codegen::{
    correlation::CorrelationMethod,
    factor::{Extraction, Rotation},
};

#[derive(Parser, Debug, Clone)]
#[command(name = "statbench", about = "Run statistical procedures on an embedded R runtime", version)]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print the typed result as JSON instead of a report.
    #[arg(long, global = true)]
    pub json: bool,

    /// Prettify the Markdown report (default from PRETTIFY_MARKDOWN).
    #[arg(long, global = true)]
    pub md: bool,
    /// Print the raw Markdown report.
    #[arg(long = "no-md", global = true)]
    pub no_md: bool,

    /// Language for validation messages and hints (en, vi).
    #[arg(long, global = true)]
    pub locale: Option<String>,

    /// Give up after this many seconds (engine startup included).
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Verbose logging to stderr (overridden by RUST_LOG).
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Boot the R engine and install/load the analysis packages.
    Init,
    /// Show the engine state.
    Status,
    /// Cronbach's alpha with item statistics.
    Reliability {
        #[command(flatten)]
        input: DataArgs,
        /// Declared response scale as MIN,MAX (e.g. 1,5).
        #[arg(long, value_parser = parse_scale)]
        scale: Option<(f64, f64)>,
    },
    /// Correlation matrix with p-values.
    Correlation {
        #[command(flatten)]
        input: DataArgs,
        #[arg(long, default_value_t = CorrelationMethod::Pearson)]
        method: CorrelationMethod,
    },
    /// Per-column summary statistics.
    Descriptive {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Independent-samples t-test between two columns (or two codes of --by).
    Ttest {
        #[command(flatten)]
        input: DataArgs,
        #[command(flatten)]
        long: LongFormat,
    },
    /// Paired-samples t-test: the first selected column is "before", the second "after".
    Paired {
        #[command(flatten)]
        input: DataArgs,
    },
    /// One-way ANOVA over columns (or over the codes of --by).
    Anova {
        #[command(flatten)]
        input: DataArgs,
        #[command(flatten)]
        long: LongFormat,
    },
    /// Mann-Whitney U test between two columns (or two codes of --by).
    #[command(name = "mann-whitney")]
    MannWhitney {
        #[command(flatten)]
        input: DataArgs,
        #[command(flatten)]
        long: LongFormat,
    },
    /// Exploratory factor analysis.
    Efa {
        #[command(flatten)]
        input: DataArgs,
        /// Number of factors (default: eigenvalues greater than 1).
        #[arg(long)]
        factors: Option<usize>,
        #[arg(long, default_value_t = Rotation::Varimax)]
        rotation: Rotation,
        #[arg(long, default_value_t = Extraction::Ml)]
        extraction: Extraction,
    },
    /// Linear regression: the first selected column is the dependent variable.
    Regression {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Chi-square test of independence between two coded columns.
    Chisq {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Confirmatory factor analysis (lavaan syntax).
    Cfa {
        #[command(flatten)]
        input: DataArgs,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Structural equation model (lavaan syntax).
    Sem {
        #[command(flatten)]
        input: DataArgs,
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Data file (.csv, .tsv, .json, .txt). Reads stdin when omitted.
    #[arg(long, short = 'f')]
    pub data: Option<String>,

    /// Columns to use, by name or 1-based position: --columns Q1,Q2,Q3
    #[arg(long, short = 'c', value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LongFormat {
    /// Grouping column (long format); groups are its distinct codes.
    #[arg(long, requires = "value")]
    pub by: Option<String>,
    /// Measured column when --by is given.
    #[arg(long, requires = "by")]
    pub value: Option<String>,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("model_source").args(["model", "model_file"]).required(true)))]
pub struct ModelArgs {
    /// Model syntax, e.g. "F1 =~ Q1 + Q2 + Q3".
    #[arg(long)]
    pub model: Option<String>,
    /// File holding the model syntax.
    #[arg(long = "model-file")]
    pub model_file: Option<PathBuf>,
}

fn parse_scale(s: &str) -> Result<(f64, f64), String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("expected MIN,MAX, got `{s}`"))?;
    let min: f64 = min.trim().parse().map_err(|_| format!("invalid scale minimum `{min}`"))?;
    let max: f64 = max.trim().parse().map_err(|_| format!("invalid scale maximum `{max}`"))?;
    Ok((min, max))
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
