//! Sequential step runner used by the CLI for localhost runs

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::modules::{
    ConfigPattern, HostDescriptor, ModuleError, ModuleRegistry, TargetBinding, Transport,
    VariableStore,
};

#[derive(Debug, Error)]
pub enum StepError {
    #[error("Unable to parse steps: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid step #{index}: {reason}")]
    InvalidStep { index: usize, reason: String },

    #[error("Unable to render steps: {0}")]
    Render(serde_yaml::Error),

    #[error("Step #{index} ({module}) failed: {source}")]
    Module {
        index: usize,
        module: String,
        #[source]
        source: ModuleError,
    },
}

/// One `{ <module>: <argument bag> }` entry of a step file
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub module: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub module: String,
    pub id: String,
    pub up_time: Duration,
    pub complete: bool,
}

/// Parse a YAML (or JSON) list of single-key step maps
pub fn parse_steps(content: &str) -> Result<Vec<Step>, StepError> {
    let documents: Vec<Value> = serde_yaml::from_str(content)?;

    documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| {
            let map = document.as_object().ok_or_else(|| StepError::InvalidStep {
                index,
                reason: "expected a map of module name to arguments".to_string(),
            })?;
            let mut entries = map.iter();
            match (entries.next(), entries.next()) {
                (Some((module, args)), None) => Ok(Step {
                    module: module.clone(),
                    args: args.clone(),
                }),
                _ => Err(StepError::InvalidStep {
                    index,
                    reason: format!("expected exactly one module, found {}", map.len()),
                }),
            }
        })
        .collect()
}

/// Bind every step and replace its arguments with the bound command's
/// canonical argument bag: schema key spelling, defaults filled in.
pub fn normalize_steps(
    registry: &ModuleRegistry,
    steps: &[Step],
) -> Result<Vec<Step>, StepError> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let command = registry
                .convert(&step.module, &step.args)
                .map_err(|source| StepError::Module {
                    index,
                    module: step.module.clone(),
                    source,
                })?;
            Ok(Step {
                module: step.module.clone(),
                args: command.to_argument_bag(),
            })
        })
        .collect()
}

/// Render steps back into step-file YAML
pub fn render_steps(steps: &[Step]) -> Result<String, StepError> {
    let documents: Vec<Value> = steps
        .iter()
        .map(|step| {
            let mut entry = Map::new();
            entry.insert(step.module.clone(), step.args.clone());
            Value::Object(entry)
        })
        .collect();
    serde_yaml::to_string(&documents).map_err(StepError::Render)
}

pub struct StepRunner {
    registry: ModuleRegistry,
    session: Arc<dyn VariableStore>,
    transport: Arc<dyn Transport>,
    host: HostDescriptor,
}

impl StepRunner {
    pub fn new(
        registry: ModuleRegistry,
        session: Arc<dyn VariableStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            session,
            transport,
            host: HostDescriptor::localhost(),
        }
    }

    pub fn with_host(mut self, host: HostDescriptor) -> Self {
        self.host = host;
        self
    }

    /// Run steps in order, stopping at the first failure
    pub async fn run(&self, steps: &[Step]) -> Result<Vec<StepReport>, StepError> {
        let mut reports = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let module_error = |source: ModuleError| StepError::Module {
                index,
                module: step.module.clone(),
                source,
            };

            let command = self
                .registry
                .convert(&step.module, &step.args)
                .map_err(module_error)?
                .with_binding(TargetBinding {
                    host: self.host.clone(),
                    session: Some(self.session.clone()),
                    config: ConfigPattern {
                        name: format!("step-{index}"),
                        ..Default::default()
                    },
                    transport: Some(self.transport.clone()),
                });

            info!("Step #{} ({}): {}", index, step.module, command);
            if let Err(e) = command.run().await {
                warn!("Step #{} ({}) failed, aborting", index, step.module);
                return Err(module_error(e.into()));
            }

            reports.push(StepReport {
                index,
                module: step.module.clone(),
                id: command.id().to_string(),
                up_time: command.up_time(),
                complete: command.is_complete(),
            });
        }

        Ok(reports)
    }
}
