//! Central registry mapping module names to converters and executors

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::config::ModulesConfig;
use crate::modules::binder::{bind, ArgumentDoc};
use crate::modules::command::{full_schema, Bound, Command, CommandKind, TargetBinding};
use crate::modules::core::{CopyCommand, ServiceCommand, ShellCommand};
use crate::modules::error::{panic_message, ConversionError, DiscoveryError, ModuleError};

/// Turns an argument bag into a bound command
pub trait ModuleConverter: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert(&self, args: &Value) -> Result<Command, ConversionError>;

    /// Argument schema, for documentation
    fn describe(&self) -> Vec<ArgumentDoc>;
}

/// Converts, binds and runs in one call, for hosts that do not drive the
/// lifecycle themselves
#[async_trait]
pub trait ModuleExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, args: &Value, binding: TargetBinding)
        -> Result<Command, ModuleError>;
}

/// A feature looked up with [`ModuleRegistry::discover_feature`]
#[derive(Clone)]
pub enum ModuleFeature {
    Converter(Arc<dyn ModuleConverter>),
    Executor(Arc<dyn ModuleExecutor>),
}

/// Schema-driven converter for one command kind
pub struct KindConverter<K> {
    config: ModulesConfig,
    _kind: PhantomData<fn() -> K>,
}

impl<K: CommandKind> KindConverter<K> {
    pub fn new(config: ModulesConfig) -> Self {
        Self {
            config,
            _kind: PhantomData,
        }
    }
}

impl<K: CommandKind> ModuleConverter for KindConverter<K> {
    fn name(&self) -> &'static str {
        K::KIND
    }

    fn convert(&self, args: &Value) -> Result<Command, ConversionError> {
        let seed = Bound {
            params: K::seed(&self.config),
            with_vars: Vec::new(),
            with_list: Vec::new(),
        };
        let bound = bind(K::KIND, &full_schema::<K>(), args, seed)?;
        let command = Command::new(
            bound.params.into_spec(),
            bound.with_vars,
            bound.with_list,
            self.config.missing_variable_policy,
        );
        debug!("{} command bound: {}", K::KIND, command);
        Ok(command)
    }

    fn describe(&self) -> Vec<ArgumentDoc> {
        full_schema::<K>().iter().map(ArgumentDoc::from).collect()
    }
}

#[async_trait]
impl<K: CommandKind> ModuleExecutor for KindConverter<K> {
    fn name(&self) -> &'static str {
        K::KIND
    }

    async fn execute(
        &self,
        args: &Value,
        binding: TargetBinding,
    ) -> Result<Command, ModuleError> {
        let command = self.convert(args)?.with_binding(binding);
        command.run().await?;
        Ok(command)
    }
}

struct RegisteredModule {
    converter: Arc<dyn ModuleConverter>,
    executor: Arc<dyn ModuleExecutor>,
}

pub struct ModuleRegistry {
    modules: BTreeMap<String, RegisteredModule>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Create a registry with shell, copy and service registered
    pub fn with_core_modules(config: &ModulesConfig) -> Self {
        let mut registry = Self::new();
        registry.register_kind::<ShellCommand>(config);
        registry.register_kind::<CopyCommand>(config);
        registry.register_kind::<ServiceCommand>(config);
        registry
    }

    pub fn register_kind<K: CommandKind>(&mut self, config: &ModulesConfig) {
        let module = Arc::new(KindConverter::<K>::new(config.clone()));
        self.register(module.clone(), module);
    }

    pub fn register(
        &mut self,
        converter: Arc<dyn ModuleConverter>,
        executor: Arc<dyn ModuleExecutor>,
    ) {
        self.modules.insert(
            converter.name().to_string(),
            RegisteredModule {
                converter,
                executor,
            },
        );
    }

    pub fn list_modules(&self) -> Vec<&str> {
        self.modules.keys().map(|s| s.as_str()).collect()
    }

    pub fn discover(&self, module: &str) -> Result<Arc<dyn ModuleConverter>, DiscoveryError> {
        self.modules
            .get(module)
            .map(|m| m.converter.clone())
            .ok_or_else(|| DiscoveryError::UnknownModule {
                name: module.to_string(),
            })
    }

    pub fn discover_feature(
        &self,
        module: &str,
        feature: &str,
    ) -> Result<ModuleFeature, DiscoveryError> {
        let registered = self
            .modules
            .get(module)
            .ok_or_else(|| DiscoveryError::UnknownModule {
                name: module.to_string(),
            })?;

        match feature {
            "converter" => Ok(ModuleFeature::Converter(registered.converter.clone())),
            "executor" => Ok(ModuleFeature::Executor(registered.executor.clone())),
            _ => Err(DiscoveryError::UnknownFeature {
                module: module.to_string(),
                feature: feature.to_string(),
            }),
        }
    }

    /// Bind an argument bag for `module`.
    ///
    /// A panic raised inside a converter is reported as
    /// `ModuleError::InternalFault` instead of unwinding into the host.
    pub fn convert(&self, module: &str, args: &Value) -> Result<Command, ModuleError> {
        let converter = self.discover(module)?;
        match catch_unwind(AssertUnwindSafe(|| converter.convert(args))) {
            Ok(result) => Ok(result?),
            Err(payload) => Err(ModuleError::InternalFault {
                module: module.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Convert, bind and run through the module's executor
    pub async fn execute(
        &self,
        module: &str,
        args: &Value,
        binding: TargetBinding,
    ) -> Result<Command, ModuleError> {
        let executor = self
            .modules
            .get(module)
            .map(|m| m.executor.clone())
            .ok_or_else(|| DiscoveryError::UnknownModule {
                name: module.to_string(),
            })?;
        executor.execute(args, binding).await
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_core_modules(&ModulesConfig::default())
    }
}
