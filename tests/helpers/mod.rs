//! Test doubles for the transport collaborator

#![allow(dead_code)]

use async_trait::async_trait;
use rustle_modules::modules::{TargetBinding, Transport, TransportError, VariableStore};
use rustle_modules::{HostDescriptor, SessionVariables};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Script(String),
    File { src: String, dest: String, mode: u32 },
    Folder { src: String, dest: String, mode: u32 },
}

/// Records every call in order; scripts echo `<command>\n` unless configured
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    outputs: HashMap<String, String>,
    failing: Vec<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    pub fn failing_on(mut self, command: &str) -> Self {
        self.failing.push(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Script(command) => Some(command),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn script(&self, command: &str) -> Result<String, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Script(command.to_string()));

        if self.failing.iter().any(|f| f == command) {
            return Err(TransportError::ScriptFailed {
                command: command.to_string(),
                reason: "exit status 1".to_string(),
                output: "boom".to_string(),
            });
        }
        Ok(self
            .outputs
            .get(command)
            .cloned()
            .unwrap_or_else(|| format!("{command}\n")))
    }

    async fn transfer_file(&self, src: &str, dest: &str, mode: u32) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(TransportCall::File {
            src: src.to_string(),
            dest: dest.to_string(),
            mode,
        });
        Ok(())
    }

    async fn transfer_folder(
        &self,
        src: &str,
        dest: &str,
        mode: u32,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(TransportCall::Folder {
            src: src.to_string(),
            dest: dest.to_string(),
            mode,
        });
        Ok(())
    }
}

/// Blocks each script until the test releases a permit.
/// Every script announces itself on the `entered` channel first.
pub struct GatedTransport {
    gate: Arc<Semaphore>,
    entered: mpsc::UnboundedSender<String>,
}

impl GatedTransport {
    pub fn new() -> (Self, Arc<Semaphore>, mpsc::UnboundedReceiver<String>) {
        let gate = Arc::new(Semaphore::new(0));
        let (entered, rx) = mpsc::unbounded_channel();
        (
            Self {
                gate: gate.clone(),
                entered,
            },
            gate,
            rx,
        )
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn script(&self, command: &str) -> Result<String, TransportError> {
        let _ = self.entered.send(command.to_string());
        let permit = self.gate.acquire().await.map_err(|e| TransportError::ScriptFailed {
            command: command.to_string(),
            reason: e.to_string(),
            output: String::new(),
        })?;
        permit.forget();
        Ok(format!("{command}\n"))
    }

    async fn transfer_file(&self, _: &str, _: &str, _: u32) -> Result<(), TransportError> {
        Ok(())
    }

    async fn transfer_folder(&self, _: &str, _: &str, _: u32) -> Result<(), TransportError> {
        Ok(())
    }
}

pub fn binding(
    transport: Arc<dyn Transport>,
    session: Arc<dyn VariableStore>,
) -> TargetBinding {
    TargetBinding {
        host: HostDescriptor {
            name: "web-01".to_string(),
            address: "10.0.0.1".to_string(),
            port: Some(22),
            user: Some("deploy".to_string()),
        },
        session: Some(session),
        config: Default::default(),
        transport: Some(transport),
    }
}

pub fn session<const N: usize>(values: [(&str, &str); N]) -> Arc<SessionVariables> {
    Arc::new(SessionVariables::with_values(values))
}
