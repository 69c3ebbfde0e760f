//! Typed, lifecycle-bearing commands produced from argument bags

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::ModulesConfig;
use crate::modules::binder::{ArgType, ArgumentSpec};
use crate::modules::core::{CopyCommand, ServiceCommand, ShellCommand};
use crate::modules::error::{panic_message, ExecutionError, LifecycleError};
use crate::modules::lifecycle::{Checkpoint, Lifecycle, LifecycleState};
use crate::modules::template::{Invocation, MissingVariablePolicy, TemplateExpander};
use crate::modules::transport::Transport;
use crate::modules::variables::VariableStore;

/// Target host as described by the host engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub name: String,
    pub address: String,
    pub port: Option<u16>,
    pub user: Option<String>,
}

impl HostDescriptor {
    pub fn localhost() -> Self {
        Self {
            name: "localhost".to_string(),
            address: "127.0.0.1".to_string(),
            port: None,
            user: None,
        }
    }
}

/// Opaque configuration the host engine attaches to a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPattern {
    pub name: String,
    pub values: HashMap<String, Value>,
}

/// Everything injected by the host engine before `run`
#[derive(Clone, Default)]
pub struct TargetBinding {
    pub host: HostDescriptor,
    pub session: Option<Arc<dyn VariableStore>>,
    pub config: ConfigPattern,
    pub transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for TargetBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetBinding")
            .field("host", &self.host)
            .field("session", &self.session.is_some())
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

/// Binding target: kind parameters plus the shared templating lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound<P> {
    pub params: P,
    pub with_vars: Vec<String>,
    pub with_list: Vec<String>,
}

/// Schema rows shared by every kind
pub fn templating_schema<P>() -> Vec<ArgumentSpec<Bound<P>>> {
    vec![
        ArgumentSpec {
            name: "withVars",
            ty: ArgType::List,
            required: false,
            description: "Session variables substituted into {{ name }} placeholders",
            apply: |bound, value| bound.with_vars = value.into_list(),
        },
        ArgumentSpec {
            name: "withList",
            ty: ArgType::List,
            required: false,
            description: "Run once per element, replacing {{ item }}",
            apply: |bound, value| bound.with_list = value.into_list(),
        },
    ]
}

/// Per-kind behaviour plugged into the shared lifecycle
#[async_trait]
pub trait CommandKind: Clone + Send + Sync + Sized + 'static {
    const KIND: &'static str;

    /// Parameters before binding, seeded from configuration
    fn seed(config: &ModulesConfig) -> Self;

    /// Kind-specific schema rows (templating rows are appended by the caller)
    fn schema() -> Vec<ArgumentSpec<Bound<Self>>>;

    fn into_spec(self) -> CommandSpec;

    /// Write this kind's parameters back in argument-bag form
    fn to_arguments(&self, bag: &mut Map<String, Value>);

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<(), ExecutionError>;
}

/// Full schema for a kind, templating rows included
pub fn full_schema<K: CommandKind>() -> Vec<ArgumentSpec<Bound<K>>> {
    let mut schema = K::schema();
    schema.extend(templating_schema::<K>());
    schema
}

/// Closed set of command kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Shell(ShellCommand),
    Copy(CopyCommand),
    Service(ServiceCommand),
}

impl CommandSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandSpec::Shell(_) => ShellCommand::KIND,
            CommandSpec::Copy(_) => CopyCommand::KIND,
            CommandSpec::Service(_) => ServiceCommand::KIND,
        }
    }

    fn to_arguments(&self, bag: &mut Map<String, Value>) {
        match self {
            CommandSpec::Shell(c) => c.to_arguments(bag),
            CommandSpec::Copy(c) => c.to_arguments(bag),
            CommandSpec::Service(c) => c.to_arguments(bag),
        }
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<(), ExecutionError> {
        match self {
            CommandSpec::Shell(c) => c.execute(ctx).await,
            CommandSpec::Copy(c) => c.execute(ctx).await,
            CommandSpec::Service(c) => c.execute(ctx).await,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(c) => c.fmt(f),
            CommandSpec::Copy(c) => c.fmt(f),
            CommandSpec::Service(c) => c.fmt(f),
        }
    }
}

/// View of a running command handed to the kind's execute body
pub struct RunContext<'a> {
    command: &'a Command,
}

impl<'a> RunContext<'a> {
    pub fn id(&self) -> Uuid {
        self.command.id
    }

    pub fn host(&self) -> &HostDescriptor {
        &self.command.binding.host
    }

    pub fn session(&self) -> Option<&dyn VariableStore> {
        self.command.binding.session.as_deref()
    }

    pub fn transport(&self) -> Result<&dyn Transport, ExecutionError> {
        self.command
            .binding
            .transport
            .as_deref()
            .ok_or_else(|| ExecutionError::NotBound {
                kind: self.command.kind().to_string(),
                what: "transport".to_string(),
            })
    }

    /// Resolve `withVars` and expand `withList` over the given fields
    pub fn expand(&self, fields: &[&str]) -> Result<Vec<Invocation>, ExecutionError> {
        TemplateExpander::new(
            self.session(),
            &self.command.with_vars,
            self.command.policy,
        )
        .expand(self.command.kind(), fields, &self.command.with_list)
    }

    /// Honour pause and stop between invocations
    pub async fn checkpoint(&self) -> Result<(), ExecutionError> {
        match self.command.lifecycle.checkpoint().await {
            Checkpoint::Continue => Ok(()),
            Checkpoint::Cancelled => Err(ExecutionError::Cancelled {
                id: self.command.id.to_string(),
            }),
        }
    }
}

/// A bound command.
///
/// `run`, `pause`, `resume` and `stop` take `&self`, so a host may hold the
/// command in an `Arc` and steer it from another task while it runs. At most
/// one `run` per command is meaningful; re-use goes through `clone`.
pub struct Command {
    id: Uuid,
    created_at: DateTime<Utc>,
    spec: CommandSpec,
    with_vars: Vec<String>,
    with_list: Vec<String>,
    policy: MissingVariablePolicy,
    binding: TargetBinding,
    lifecycle: Lifecycle,
}

impl Command {
    pub fn new(
        spec: CommandSpec,
        with_vars: Vec<String>,
        with_list: Vec<String>,
        policy: MissingVariablePolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            spec,
            with_vars,
            with_list,
            policy,
            binding: TargetBinding::default(),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn kind(&self) -> &'static str {
        self.spec.kind()
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn with_vars(&self) -> &[String] {
        &self.with_vars
    }

    pub fn with_list(&self) -> &[String] {
        &self.with_list
    }

    pub fn policy(&self) -> MissingVariablePolicy {
        self.policy
    }

    /// Variable receiving captured output, for kinds that produce output
    pub fn save_state(&self) -> Option<&str> {
        match &self.spec {
            CommandSpec::Shell(shell) => shell.save_state.as_deref(),
            _ => None,
        }
    }

    pub fn binding(&self) -> &TargetBinding {
        &self.binding
    }

    pub fn with_binding(mut self, binding: TargetBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn set_host(&mut self, host: HostDescriptor) {
        self.binding.host = host;
    }

    pub fn set_session(&mut self, session: Arc<dyn VariableStore>) {
        self.binding.session = Some(session);
    }

    pub fn set_config(&mut self, config: ConfigPattern) {
        self.binding.config = config;
    }

    pub fn set_transport(&mut self, transport: Arc<dyn Transport>) {
        self.binding.transport = Some(transport);
    }

    /// Run the command body to completion.
    ///
    /// Whatever the outcome, the command is complete afterwards.
    pub async fn run(&self) -> Result<(), ExecutionError> {
        self.lifecycle.begin()?;
        debug!("Executing command: {}", self.spec);
        debug!("Host labelled: {}", self.binding.host.name);

        let ctx = RunContext { command: self };
        let outcome = AssertUnwindSafe(self.spec.execute(&ctx))
            .catch_unwind()
            .await;
        self.lifecycle.finish();

        let result = outcome.unwrap_or_else(|payload| {
            Err(ExecutionError::InternalFault {
                message: panic_message(payload.as_ref()),
            })
        });
        match &result {
            Ok(()) => info!(
                "Command {} ({}) completed in {:?}",
                self.kind(),
                self.id,
                self.up_time()
            ),
            Err(e) => error!("Command {} ({}) failed: {}", self.kind(), self.id, e),
        }
        result
    }

    pub fn pause(&self) -> Result<(), LifecycleError> {
        self.lifecycle.pause()
    }

    pub fn resume(&self) -> Result<(), LifecycleError> {
        self.lifecycle.resume()
    }

    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    /// Same effect as `stop`
    pub fn kill(&self) {
        self.lifecycle.stop();
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    pub fn is_complete(&self) -> bool {
        self.lifecycle.is_complete()
    }

    pub fn up_time(&self) -> Duration {
        self.lifecycle.up_time()
    }

    /// Serialise the static parameters back into argument-bag form
    pub fn to_argument_bag(&self) -> Value {
        let mut bag = Map::new();
        self.spec.to_arguments(&mut bag);
        if !self.with_vars.is_empty() {
            bag.insert("withVars".to_string(), Value::from(self.with_vars.clone()));
        }
        if !self.with_list.is_empty() {
            bag.insert("withList".to_string(), Value::from(self.with_list.clone()));
        }
        Value::Object(bag)
    }
}

/// Cloning mints a fresh identifier and an idle lifecycle; static parameters
/// and the target binding are shared.
impl Clone for Command {
    fn clone(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            spec: self.spec.clone(),
            with_vars: self.with_vars.clone(),
            with_list: self.with_list.clone(),
            policy: self.policy,
            binding: self.binding.clone(),
            lifecycle: Lifecycle::new(),
        }
    }
}

/// Commands are the same command only if they share an identifier
impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Command {}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("with_vars", &self.with_vars)
            .field("with_list", &self.with_list)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] withVars: {:?}, withList: {:?}",
            self.spec, self.id, self.with_vars, self.with_list
        )
    }
}
