//! Scripted processes for exercising the launcher without spawning anything.

use crate::mcp::process::{OutputEvent, ProcessControl, WorkerProcess};
use crate::mcp::types::WorkerSpec;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One step of a scripted process.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Stdout(&'static str),
    Stderr(&'static str),
    Sleep(Duration),
    Exit(Option<i32>),
}

#[derive(Debug, Clone)]
enum Script {
    Run(Vec<Step>),
    SpawnError,
}

/// Hands out scripted processes keyed by `WorkerSpec::command`.
///
/// A script that runs out of steps without exiting stays silent forever,
/// like a server that never prints the marker.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedProcesses {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    spawned: Arc<AtomicUsize>,
    terminated: Arc<AtomicUsize>,
}

impl ScriptedProcesses {
    pub(crate) fn script(self, command: &str, steps: Vec<Step>) -> Self {
        self.insert(command, Script::Run(steps));
        self
    }

    pub(crate) fn failing_spawn(self, command: &str) -> Self {
        self.insert(command, Script::SpawnError);
        self
    }

    pub(crate) fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub(crate) fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    fn insert(&self, command: &str, script: Script) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(command.to_string(), script);
    }
}

impl ProcessControl for ScriptedProcesses {
    fn spawn(&self, spec: &WorkerSpec) -> std::io::Result<Box<dyn WorkerProcess>> {
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get(&spec.command)
            .cloned();

        match script {
            Some(Script::Run(steps)) => {
                self.spawned.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedProcess {
                    steps: steps.into(),
                    exited: false,
                    terminated: self.terminated.clone(),
                }))
            }
            Some(Script::SpawnError) | None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such command: {}", spec.command),
            )),
        }
    }
}

struct ScriptedProcess {
    steps: VecDeque<Step>,
    exited: bool,
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl WorkerProcess for ScriptedProcess {
    fn id(&self) -> Option<u32> {
        (!self.exited).then_some(4242)
    }

    async fn next_event(&mut self) -> Option<OutputEvent> {
        if self.exited {
            return None;
        }

        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::Stdout(text) => return Some(OutputEvent::Stdout(text.to_string())),
                Step::Stderr(text) => return Some(OutputEvent::Stderr(text.to_string())),
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
                Step::Exit(code) => {
                    self.exited = true;
                    return Some(OutputEvent::Exited(code));
                }
            }
        }

        std::future::pending().await
    }

    async fn terminate(&mut self) {
        self.exited = true;
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}
