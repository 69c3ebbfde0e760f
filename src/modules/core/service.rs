//! Service module - desired service state
//!
//! Remote service management is not implemented yet: running a service
//! command logs a warning and succeeds without touching the target.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

use crate::config::ModulesConfig;
use crate::modules::binder::{ArgType, ArgumentSpec};
use crate::modules::command::{Bound, CommandKind, CommandSpec, RunContext};
use crate::modules::error::ExecutionError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCommand {
    pub name: String,
    pub state: String,
}

#[async_trait]
impl CommandKind for ServiceCommand {
    const KIND: &'static str = "service";

    fn seed(_config: &ModulesConfig) -> Self {
        Self::default()
    }

    fn schema() -> Vec<ArgumentSpec<Bound<Self>>> {
        vec![
            ArgumentSpec {
                name: "name",
                ty: ArgType::Text,
                required: true,
                description: "Service name",
                apply: |b, v| b.params.name = v.into_text(),
            },
            ArgumentSpec {
                name: "state",
                ty: ArgType::Text,
                required: true,
                description: "Desired service state",
                apply: |b, v| b.params.state = v.into_text(),
            },
        ]
    }

    fn into_spec(self) -> CommandSpec {
        CommandSpec::Service(self)
    }

    fn to_arguments(&self, bag: &mut Map<String, Value>) {
        bag.insert("name".to_string(), Value::from(self.name.clone()));
        bag.insert("state".to_string(), Value::from(self.state.clone()));
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<(), ExecutionError> {
        warn!(
            "Service command not implemented, skipping on {}: {}",
            ctx.host().name,
            self
        );
        Ok(())
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServiceCommand {{ name: {:?}, state: {:?} }}",
            self.name, self.state
        )
    }
}
