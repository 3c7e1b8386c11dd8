mod cli;

use std::{
    fs,
    io::{self, Read},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use is_terminal::IsTerminal;
use statbench::{
    analysis::{Analyzer, ProcedureRequest},
    codegen::factor::EfaParams,
    config::Config,
    data::ScaleBounds,
    error::EngineError,
    i18n::{self, Locale},
    printer::{self, TextPrinter, Tone},
    report,
    utils::{self, Table},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, DataArgs, LongFormat, ModelArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let cfg = Config::load();
    let locale = match args.locale.clone().or_else(|| cfg.get("DEFAULT_LOCALE")) {
        Some(l) => l.parse::<Locale>().map_err(|e| anyhow!(e))?,
        None => Locale::default(),
    };
    let md = if args.no_md {
        false
    } else if args.md {
        true
    } else {
        cfg.get_bool("PRETTIFY_MARKDOWN")
    };

    let analyzer = Analyzer::global();
    let engine = analyzer.engine().clone();
    engine.set_progress_callback(|stage| TextPrinter::new(Tone::Progress).eprint(stage));

    match &args.command {
        Command::Status => {
            let status = engine.status();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                printer::print_report(&report::render_status(&status), md);
            }
            return Ok(());
        }
        Command::Init => {
            let outcome = match args.timeout {
                Some(secs) => {
                    let waited = Duration::from_secs(secs);
                    tokio::time::timeout(waited, engine.ensure_ready())
                        .await
                        .unwrap_or(Err(EngineError::InitializationTimeout { waited }))
                        .map(|_| ())
                }
                None => engine.ensure_ready().await.map(|_| ()),
            };
            engine.shutdown().await;
            if let Err(e) = outcome {
                fail(&e, locale);
            }
            TextPrinter::new(Tone::Success).eprint("R engine is ready");
            return Ok(());
        }
        _ => {}
    }

    let request = build_request(&args.command)?;
    debug!(procedure = request.label(), "running procedure");

    let outcome = match args.timeout {
        Some(secs) => analyzer.run_within(&request, Duration::from_secs(secs)).await,
        None => analyzer.run(&request).await,
    };
    engine.shutdown().await;
    let output = match outcome {
        Ok(output) => output,
        Err(e) => fail(&e, locale),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        printer::print_report(&report::render(&output), md);
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "statbench=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn fail(err: &EngineError, locale: Locale) -> ! {
    let printer = TextPrinter::new(Tone::Error);
    printer.eprint(&format!("[{}] {}", err.code(), err.localized(locale)));
    if let EngineError::RuntimeEvaluation { message, .. } = err {
        if let Some(hint) = i18n::runtime_hint(message, locale) {
            TextPrinter::new(Tone::Warning).eprint(hint);
        }
    }
    std::process::exit(1)
}

fn load_table(input: &DataArgs) -> Result<Table> {
    let table = match &input.data {
        Some(path) => utils::read_table(path)?,
        None => {
            if io::stdin().is_terminal() {
                bail!("no data: pass --data FILE or pipe a table on stdin");
            }
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            utils::table::parse_auto(&buf).context("Failed to parse stdin")?
        }
    };
    table.select(&input.columns)
}

/// Two or more samples: the selected columns, or the codes of `--by` in long format.
fn load_groups(input: &DataArgs, long: &LongFormat) -> Result<Vec<Vec<f64>>> {
    let table = load_table(input)?;
    match (&long.by, &long.value) {
        (Some(by), Some(value)) => {
            let groups = table.groups_by(value, by)?;
            debug!(groups = ?groups.iter().map(|(k, g)| (k.as_str(), g.len())).collect::<Vec<_>>(), "long-format groups");
            Ok(groups.into_iter().map(|(_, g)| g).collect())
        }
        _ => Ok(table.groups()),
    }
}

fn two_groups(groups: Vec<Vec<f64>>) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = groups.len();
    let mut it = groups.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => bail!("expected exactly 2 groups, got {n}"),
    }
}

fn load_model(model: &ModelArgs) -> Result<String> {
    match (&model.model, &model.model_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file '{}'", path.display())),
        (None, None) => bail!("pass --model or --model-file"),
    }
}

fn build_request(command: &Command) -> Result<ProcedureRequest> {
    let request = match command {
        Command::Init | Command::Status => bail!("not a procedure"),
        Command::Reliability { input, scale } => {
            let scale = scale
                .map(|(min, max)| {
                    ScaleBounds::new(min, max)
                        .ok_or_else(|| anyhow!("invalid --scale: the minimum must be below the maximum"))
                })
                .transpose()?;
            ProcedureRequest::Reliability {
                data: load_table(input)?.to_matrix()?,
                scale,
            }
        }
        Command::Correlation { input, method } => ProcedureRequest::Correlation {
            data: load_table(input)?.to_matrix()?,
            method: *method,
        },
        Command::Descriptive { input } => ProcedureRequest::Descriptive {
            data: load_table(input)?.to_matrix()?,
        },
        Command::Ttest { input, long } => {
            let (group1, group2) = two_groups(load_groups(input, long)?)?;
            ProcedureRequest::IndependentT { group1, group2 }
        }
        Command::MannWhitney { input, long } => {
            let (group1, group2) = two_groups(load_groups(input, long)?)?;
            ProcedureRequest::MannWhitney { group1, group2 }
        }
        Command::Paired { input } => {
            let table = load_table(input)?;
            if table.headers.len() != 2 {
                bail!("paired t-test needs exactly 2 columns, got {}", table.headers.len());
            }
            let (before, after) = table.paired(&table.headers[0], &table.headers[1])?;
            ProcedureRequest::PairedT { before, after }
        }
        Command::Anova { input, long } => ProcedureRequest::Anova {
            groups: load_groups(input, long)?,
        },
        Command::Efa {
            input,
            factors,
            rotation,
            extraction,
        } => ProcedureRequest::Efa {
            data: load_table(input)?.to_matrix()?,
            params: EfaParams {
                factors: *factors,
                rotation: *rotation,
                extraction: *extraction,
            },
        },
        Command::Regression { input } => ProcedureRequest::Regression {
            data: load_table(input)?.to_matrix()?,
        },
        Command::Chisq { input } => ProcedureRequest::ChiSquare {
            data: load_table(input)?.to_matrix()?,
        },
        Command::Cfa { input, model } => ProcedureRequest::Cfa {
            data: load_table(input)?.to_matrix()?,
            model: load_model(model)?,
        },
        Command::Sem { input, model } => ProcedureRequest::Sem {
            data: load_table(input)?.to_matrix()?,
            model: load_model(model)?,
        },
    };
    Ok(request)
}
