//! R interpreter process bootstrap and I/O glue.
//!
//! The interpreter is a long-lived `Rscript` child running [`BOOTSTRAP`]: it reads one
//! JSON request per stdin line, evaluates the code in a fresh environment and writes
//! one sentinel-prefixed JSON reply line echoing the request id. Requests against one
//! process are strictly sequential; the pipe mutex is the queue. A caller that stops
//! waiting leaves its reply in the pipe, and the next exchange skips it by id.

use std::{io::Write, path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};
use tracing::{debug, info, warn};

use super::{Interpreter, Launcher};
use crate::{
    config::Config,
    error::EvalError,
    execution::{parse_reply, strip_sentinel, ExecutionResult, RValue, Request, HANDSHAKE_ID},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Bootstrap script executed by `Rscript`. Prints a ready reply once `jsonlite` is
/// usable, then serves requests until stdin closes.
pub const BOOTSTRAP: &str = r#"
local({
  lib <- Sys.getenv("STATBENCH_R_LIBRARY")
  if (nzchar(lib)) {
    dir.create(lib, recursive = TRUE, showWarnings = FALSE)
    .libPaths(c(lib, .libPaths()))
  }
  if (!requireNamespace("jsonlite", quietly = TRUE)) {
    utils::install.packages("jsonlite", repos = Sys.getenv("STATBENCH_BOOT_REPO"), quiet = TRUE)
  }
  if (!requireNamespace("jsonlite", quietly = TRUE)) {
    message("statbench: package jsonlite is not available")
    quit(save = "no", status = 3)
  }
})

.statbench_reply <- function(x) {
  out <- tryCatch(
    jsonlite::toJSON(x, auto_unbox = FALSE, digits = NA, na = "null", null = "null", force = TRUE),
    error = function(e) jsonlite::toJSON(list(
      id = x$id,
      ok = jsonlite::unbox(FALSE),
      error = jsonlite::unbox(paste("result serialization failed:", conditionMessage(e)))
    ))
  )
  cat("\n@@statbench@@", out, "\n", sep = "")
  flush(stdout())
}

.statbench_con <- file("stdin", open = "r")
.statbench_reply(list(
  id = jsonlite::unbox(0L), ok = jsonlite::unbox(TRUE),
  value = list(ready = TRUE), warnings = character(0)
))

repeat {
  line <- readLines(.statbench_con, n = 1, warn = FALSE)
  if (length(line) == 0) break
  if (!nzchar(line)) next
  warns <- character(0)
  req <- tryCatch(jsonlite::fromJSON(line, simplifyVector = FALSE), error = function(e) NULL)
  id <- if (is.list(req) && is.numeric(req$id)) req$id else NA
  reply <- tryCatch({
    if (is.null(req$code)) stop("malformed request")
    env <- new.env(parent = globalenv())
    value <- withCallingHandlers(
      eval(parse(text = req$code), envir = env),
      warning = function(w) {
        warns <<- c(warns, conditionMessage(w))
        invokeRestart("muffleWarning")
      }
    )
    list(ok = jsonlite::unbox(TRUE), value = value, warnings = warns)
  }, error = function(e) {
    list(ok = jsonlite::unbox(FALSE), error = jsonlite::unbox(conditionMessage(e)))
  })
  reply$id <- jsonlite::unbox(id)
  .statbench_reply(reply)
}
"#;

/// Launches `Rscript` children running the bootstrap protocol.
#[derive(Debug, Clone)]
pub struct RscriptLauncher {
    rscript: PathBuf,
    library_dir: Option<PathBuf>,
    boot_repo: String,
}

impl RscriptLauncher {
    pub fn new(rscript: impl Into<PathBuf>, library_dir: Option<PathBuf>, boot_repo: impl Into<String>) -> Self {
        Self {
            rscript: rscript.into(),
            library_dir,
            boot_repo: boot_repo.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.rscript_path(),
            Some(cfg.r_library_path()),
            cfg.get("SOURCE_REPO_URL")
                .unwrap_or_else(|| "https://cloud.r-project.org".into()),
        )
    }
}

#[async_trait]
impl Launcher for RscriptLauncher {
    async fn launch(&self) -> Result<Arc<dyn Interpreter>> {
        let mut script = tempfile::Builder::new()
            .prefix("statbench-")
            .suffix(".R")
            .tempfile()
            .context("creating bootstrap script")?;
        script.write_all(BOOTSTRAP.as_bytes())?;
        script.flush()?;

        let mut cmd = Command::new(&self.rscript);
        cmd.arg("--vanilla")
            .arg(script.path())
            .env("STATBENCH_BOOT_REPO", &self.boot_repo)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(lib) = &self.library_dir {
            std::fs::create_dir_all(lib)
                .with_context(|| format!("creating R library dir {}", lib.display()))?;
            cmd.env("STATBENCH_R_LIBRARY", lib);
        }

        let mut child: Child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.rscript.display()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("no stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "statbench::r", "{}", line);
                }
            });
        }

        let pid = child.id();
        let session = RSession {
            pipes: Mutex::new(Some(Pipes {
                stdin,
                stdout: BufReader::new(stdout),
                next_id: HANDSHAKE_ID + 1,
                torn_write: false,
            })),
            child: Mutex::new(child),
            _script: script,
        };
        session
            .roundtrip(None)
            .await
            .context("R interpreter did not complete its bootstrap")?;
        info!(?pid, "R interpreter booted");
        Ok(Arc::new(session))
    }
}

struct Pipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    /// Set while a request line is being written; still set on entry when the previous
    /// caller was cancelled mid-write.
    torn_write: bool,
}

/// One running `Rscript` process.
pub struct RSession {
    pipes: Mutex<Option<Pipes>>,
    child: Mutex<Child>,
    _script: NamedTempFile,
}

impl RSession {
    /// Send `program` (or nothing, to read the boot handshake) and wait for the reply.
    /// A transport failure poisons the session so later probes fail fast.
    async fn roundtrip(&self, program: Option<&str>) -> Result<ExecutionResult, EvalError> {
        let mut guard = self.pipes.lock().await;
        let pipes = guard
            .as_mut()
            .ok_or_else(|| EvalError::Transport("interpreter is not running".into()))?;

        let outcome = exchange(pipes, program).await;
        if matches!(outcome, Err(EvalError::Transport(_))) {
            *guard = None;
        }
        outcome
    }
}

async fn exchange(pipes: &mut Pipes, program: Option<&str>) -> Result<ExecutionResult, EvalError> {
    if pipes.torn_write {
        // Terminate the partial line; R answers it with an id-less error we skip below.
        pipes.stdin.write_all(b"\n").await.map_err(transport)?;
        pipes.torn_write = false;
    }

    let expected = match program {
        Some(code) => {
            let id = pipes.next_id;
            pipes.next_id += 1;
            let line = Request { id, code }.to_line()?;
            pipes.torn_write = true;
            pipes.stdin.write_all(line.as_bytes()).await.map_err(transport)?;
            pipes.stdin.flush().await.map_err(transport)?;
            pipes.torn_write = false;
            id
        }
        None => HANDSHAKE_ID,
    };

    let mut buf = String::new();
    loop {
        buf.clear();
        let n = pipes.stdout.read_line(&mut buf).await.map_err(transport)?;
        if n == 0 {
            return Err(EvalError::Transport("R process exited".into()));
        }
        let Some((chatter, payload)) = strip_sentinel(&buf) else {
            let line = buf.trim_end();
            if !line.is_empty() {
                debug!(target: "statbench::r", "{}", line);
            }
            continue;
        };
        if !chatter.is_empty() {
            debug!(target: "statbench::r", "{}", chatter);
        }
        let reply = parse_reply(payload)?;
        if reply.id == Some(expected) {
            return reply.result;
        }
        debug!(target: "statbench::r", stale = ?reply.id, expected, "skipping reply to an abandoned request");
    }
}

fn transport(e: std::io::Error) -> EvalError {
    EvalError::Transport(e.to_string())
}

#[async_trait]
impl Interpreter for RSession {
    async fn eval(&self, program: &str) -> Result<RValue, EvalError> {
        let result = self.roundtrip(Some(program)).await?;
        for w in &result.warnings {
            warn!(target: "statbench::r", "R warning: {}", w);
        }
        Ok(result.value)
    }

    async fn shutdown(&self) {
        // Closing stdin ends the read loop; R then exits on its own.
        drop(self.pipes.lock().await.take());
        let mut child = self.child.lock().await;
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "R interpreter exited"),
            _ => {
                if let Err(e) = child.kill().await {
                    warn!("failed to kill R interpreter: {}", e);
                }
            }
        }
    }
}
