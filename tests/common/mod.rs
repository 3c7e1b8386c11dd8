#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use statbench::{
    engine::{Engine, EngineOptions},
    error::EvalError,
    execution::RValue,
    process::{Interpreter, Launcher},
};

/// Scripted interpreter: replies by the first registered substring the program
/// contains, fails programs containing any `fail_on` marker and stalls on `slow_on`.
pub struct FakeInterpreter {
    replies: Vec<(String, Value)>,
    fail_on: Vec<String>,
    slow_on: Vec<(String, Duration)>,
    pub alive: AtomicBool,
    pub shut_down: AtomicBool,
    pub programs: Mutex<Vec<String>>,
}

#[async_trait]
impl Interpreter for FakeInterpreter {
    async fn eval(&self, program: &str) -> Result<RValue, EvalError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(EvalError::Transport("interpreter exited".into()));
        }
        self.programs.lock().unwrap().push(program.to_string());
        if let Some((_, delay)) = self.slow_on.iter().find(|(m, _)| program.contains(m.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(marker) = self.fail_on.iter().find(|m| program.contains(m.as_str())) {
            return Err(EvalError::Signalled(format!("scripted failure at `{marker}`")));
        }
        let reply = self
            .replies
            .iter()
            .find(|(key, _)| program.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| serde_json::json!({ "ok": [true] }));
        Ok(RValue::from_json(reply))
    }

    async fn probe(&self) -> Result<(), EvalError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EvalError::Transport("interpreter exited".into()))
        }
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    pub launches: AtomicUsize,
    pub delay: Duration,
    pub fail_on: Vec<String>,
    pub replies: Vec<(String, Value)>,
    pub slow_on: Vec<(String, Duration)>,
    pub launched: Mutex<Vec<Arc<FakeInterpreter>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on.push(marker.to_string());
        self
    }

    pub fn slow_on(mut self, marker: &str, delay: Duration) -> Self {
        self.slow_on.push((marker.to_string(), delay));
        self
    }

    pub fn reply(mut self, marker: &str, value: Value) -> Self {
        self.replies.push((marker.to_string(), value));
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Arc<FakeInterpreter> {
        self.launched.lock().unwrap().last().cloned().expect("nothing launched")
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> anyhow::Result<Arc<dyn Interpreter>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let interpreter = Arc::new(FakeInterpreter {
            replies: self.replies.clone(),
            fail_on: self.fail_on.clone(),
            slow_on: self.slow_on.clone(),
            alive: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
            programs: Mutex::new(Vec::new()),
        });
        self.launched.lock().unwrap().push(interpreter.clone());
        Ok(interpreter)
    }
}

pub fn fast_options() -> EngineOptions {
    EngineOptions {
        max_retries: 3,
        backoff: Duration::ZERO,
        init_wait_timeout: Duration::from_secs(5),
        ..EngineOptions::default()
    }
}

pub fn engine_with(launcher: &Arc<FakeLauncher>, options: EngineOptions) -> Engine {
    Engine::new(launcher.clone(), options)
}
