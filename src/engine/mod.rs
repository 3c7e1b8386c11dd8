//! Lifecycle of the single R interpreter shared by every analysis.
//!
//! ```text
//! Uninitialized ──ensure_ready──▶ Initializing ──ok──▶ Ready
//!       ▲                              │                 │ probe fails
//!       │ shutdown                     └──exhausted──▶ Failed ──ensure_ready──▶ Initializing
//! ```
//!
//! At most one initialization runs at a time. It is spawned as its own task and
//! published as a shared future, so every concurrent caller awaits the same attempt
//! and an abandoned caller does not abort it.

use std::{
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    time::Duration,
};

use anyhow::Context;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    codegen::setup,
    config::Config,
    error::EngineError,
    execution::RValue,
    process::{r::RscriptLauncher, Interpreter, Launcher},
};

/// Package sources in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repositories {
    pub binary: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Initialization attempts before giving up (at least one is always made).
    pub max_retries: u32,
    /// Base delay; the wait before attempt `k + 1` is `backoff * k`.
    pub backoff: Duration,
    /// How long a caller joining someone else's initialization waits.
    pub init_wait_timeout: Duration,
    pub repositories: Repositories,
    pub packages: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(1000),
            init_wait_timeout: Duration::from_secs(600),
            repositories: Repositories {
                binary: "https://packagemanager.posit.co/cran/latest".into(),
                source: "https://cloud.r-project.org".into(),
            },
            packages: setup::REQUIRED_PACKAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(cfg: &Config) -> Self {
        let mut opts = Self::default();
        if let Some(n) = cfg.get_u64("INIT_MAX_RETRIES") {
            opts.max_retries = n.min(u32::MAX as u64) as u32;
        }
        if let Some(ms) = cfg.get_u64("INIT_BACKOFF_MS") {
            opts.backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = cfg.get_u64("INIT_WAIT_TIMEOUT") {
            opts.init_wait_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = cfg.get("BINARY_REPO_URL") {
            opts.repositories.binary = url;
        }
        if let Some(url) = cfg.get("SOURCE_REPO_URL") {
            opts.repositories.source = url;
        }
        opts
    }
}

pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Single-subscriber progress channel that also remembers the last stage.
#[derive(Default)]
struct ProgressSlot {
    callback: Mutex<Option<ProgressCallback>>,
    last: Mutex<Option<String>>,
}

impl ProgressSlot {
    fn emit(&self, stage: &str) {
        info!(stage, "R engine progress");
        *lock(&self.last) = Some(stage.to_string());
        // Call outside the lock so the callback may re-register itself.
        let callback = lock(&self.callback).clone();
        if let Some(cb) = callback {
            cb(stage);
        }
    }

    fn last(&self) -> Option<String> {
        lock(&self.last).clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub state: EngineState,
    pub is_ready: bool,
    pub is_loading: bool,
    pub last_progress: Option<String>,
    pub last_error: Option<String>,
}

/// Shared reference to the live interpreter.
pub type Handle = Arc<dyn Interpreter>;
type InitFuture = Shared<BoxFuture<'static, Result<Handle, EngineError>>>;

enum State {
    Uninitialized,
    Initializing { generation: u64, future: InitFuture },
    Ready(Handle),
    Failed { message: String },
}

struct Inner {
    launcher: Arc<dyn Launcher>,
    options: EngineOptions,
    state: Mutex<State>,
    generation: Mutex<u64>,
    progress: ProgressSlot,
}

/// Owner of the shared interpreter. Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

enum Step {
    Probe(Handle),
    Own(InitFuture),
    Join(InitFuture),
}

impl Engine {
    pub fn new(launcher: Arc<dyn Launcher>, options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                launcher,
                options,
                state: Mutex::new(State::Uninitialized),
                generation: Mutex::new(0),
                progress: ProgressSlot::default(),
            }),
        }
    }

    /// Process-wide engine backed by `Rscript`, configured from the user config.
    pub fn global() -> &'static Engine {
        static GLOBAL: OnceLock<Engine> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let cfg = Config::load();
            Engine::new(
                Arc::new(RscriptLauncher::from_config(&cfg)),
                EngineOptions::from_config(&cfg),
            )
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Ensure a live interpreter using the configured retry count.
    pub async fn ensure_ready(&self) -> Result<Handle, EngineError> {
        self.ensure_ready_with(self.inner.options.max_retries).await
    }

    /// Return a live interpreter, booting one if needed.
    ///
    /// A ready handle is probed first; a failed probe discards it and starts a fresh
    /// initialization. Concurrent callers share one in-flight attempt. Callers that
    /// join an attempt started by someone else give up after `init_wait_timeout`.
    pub async fn ensure_ready_with(&self, max_retries: u32) -> Result<Handle, EngineError> {
        loop {
            let step = {
                let mut state = lock(&self.inner.state);
                match &*state {
                    State::Ready(handle) => Step::Probe(handle.clone()),
                    State::Initializing { future, .. } => Step::Join(future.clone()),
                    State::Uninitialized | State::Failed { .. } => {
                        let generation = self.inner.next_generation();
                        let future = self.inner.clone().spawn_init(generation, max_retries);
                        *state = State::Initializing {
                            generation,
                            future: future.clone(),
                        };
                        Step::Own(future)
                    }
                }
            };

            match step {
                Step::Probe(handle) => match handle.probe().await {
                    Ok(()) => return Ok(handle),
                    Err(e) => {
                        warn!(error = %e, "R engine failed its liveness probe; reinitializing");
                        self.inner.discard(&handle);
                        handle.shutdown().await;
                    }
                },
                Step::Own(future) => return future.await,
                Step::Join(future) => {
                    let waited = self.inner.options.init_wait_timeout;
                    return match tokio::time::timeout(waited, future).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(EngineError::InitializationTimeout { waited }),
                    };
                }
            }
        }
    }

    /// Run `program` on the ready interpreter.
    pub async fn evaluate(&self, procedure: &str, program: &str) -> Result<RValue, EngineError> {
        let handle = self.ensure_ready().await?;
        debug!(procedure, bytes = program.len(), "evaluating program");
        handle
            .eval(program)
            .await
            .map_err(|e| EngineError::RuntimeEvaluation {
                procedure: procedure.to_string(),
                message: e.to_string(),
            })
    }

    pub fn status(&self) -> EngineStatus {
        let (state, last_error) = match &*lock(&self.inner.state) {
            State::Uninitialized => (EngineState::Uninitialized, None),
            State::Initializing { .. } => (EngineState::Initializing, None),
            State::Ready(_) => (EngineState::Ready, None),
            State::Failed { message } => (EngineState::Failed, Some(message.clone())),
        };
        EngineStatus {
            state,
            is_ready: state == EngineState::Ready,
            is_loading: state == EngineState::Initializing,
            last_progress: self.inner.progress.last(),
            last_error,
        }
    }

    /// Register the progress subscriber, replacing any previous one.
    pub fn set_progress_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *lock(&self.inner.progress.callback) = Some(Arc::new(callback));
    }

    pub fn clear_progress_callback(&self) {
        *lock(&self.inner.progress.callback) = None;
    }

    /// Tear down the interpreter. An initialization still in flight stops before its
    /// next attempt and its result is discarded.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *lock(&self.inner.state), State::Uninitialized);
        if let State::Ready(handle) = previous {
            info!("shutting down R engine");
            handle.shutdown().await;
        }
    }
}

impl Inner {
    fn next_generation(&self) -> u64 {
        let mut g = lock(&self.generation);
        *g += 1;
        *g
    }

    fn spawn_init(self: Arc<Self>, generation: u64, max_retries: u32) -> InitFuture {
        let task = tokio::spawn(self.initialize(generation, max_retries));
        async move {
            task.await.unwrap_or_else(|e| {
                Err(EngineError::Initialization {
                    attempts: 0,
                    message: format!("initialization task aborted: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }

    async fn initialize(self: Arc<Self>, generation: u64, max_retries: u32) -> Result<Handle, EngineError> {
        let attempts = max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.options.backoff * (attempt - 1);
                info!(attempt, ?delay, "retrying R engine initialization");
                tokio::time::sleep(delay).await;
            }
            if !self.is_current(generation) {
                debug!(generation, attempt, "initialization superseded; not retrying");
                return Err(superseded(attempt - 1));
            }
            match self.attempt().await {
                Ok(handle) => {
                    if self.settle(generation, Ok(&handle)) {
                        self.progress.emit("R engine ready");
                        return Ok(handle);
                    }
                    handle.shutdown().await;
                    return Err(superseded(attempt));
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %format!("{e:#}"), "R engine initialization attempt failed");
                    last_error = format!("{e:#}");
                }
            }
        }

        let err = EngineError::Initialization {
            attempts,
            message: last_error,
        };
        self.settle(generation, Err(&err));
        Err(err)
    }

    /// One full boot sequence. A half-built interpreter is shut down on failure.
    async fn attempt(&self) -> anyhow::Result<Handle> {
        self.progress.emit("Booting R interpreter");
        let handle = self.launcher.launch().await.context("booting R interpreter")?;
        match self.load(handle.as_ref()).await {
            Ok(()) => Ok(handle),
            Err(e) => {
                handle.shutdown().await;
                Err(e)
            }
        }
    }

    async fn load(&self, handle: &dyn Interpreter) -> anyhow::Result<()> {
        let repos = &self.options.repositories;
        let packages = &self.options.packages;

        self.progress.emit("Configuring package repositories");
        handle
            .eval(&setup::configure_repositories(&repos.binary, &repos.source))
            .await
            .context("configuring package repositories")?;

        self.progress
            .emit(&format!("Installing packages ({})", packages.join(", ")));
        handle
            .eval(&setup::install_packages(packages))
            .await
            .context("installing packages")?;

        self.progress.emit("Loading packages");
        handle
            .eval(&setup::load_packages(packages))
            .await
            .context("loading packages")?;
        Ok(())
    }

    fn is_current(&self, generation: u64) -> bool {
        matches!(&*lock(&self.state), State::Initializing { generation: g, .. } if *g == generation)
    }

    /// Publish the outcome if this initialization is still the current one.
    fn settle(&self, generation: u64, outcome: Result<&Handle, &EngineError>) -> bool {
        let mut state = lock(&self.state);
        let current = matches!(&*state, State::Initializing { generation: g, .. } if *g == generation);
        if !current {
            debug!(generation, "initialization superseded");
            return false;
        }
        *state = match outcome {
            Ok(handle) => State::Ready(handle.clone()),
            Err(e) => State::Failed {
                message: e.to_string(),
            },
        };
        true
    }

    /// Forget `handle` unless it was already replaced.
    fn discard(&self, handle: &Handle) {
        let mut state = lock(&self.state);
        if matches!(&*state, State::Ready(current) if same_handle(current, handle)) {
            *state = State::Uninitialized;
        }
    }
}

fn superseded(attempts: u32) -> EngineError {
    EngineError::Initialization {
        attempts,
        message: "engine was shut down during initialization".into(),
    }
}

fn same_handle(a: &Handle, b: &Handle) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
