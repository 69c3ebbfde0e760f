//! Rustle Modules - declarative deployment modules
//!
//! This crate converts loosely-typed step arguments into typed commands
//! (shell, copy, service) and runs them against a target through an abstract
//! transport, with variable interpolation, list-driven repetition and session
//! state capture.

pub mod config;
pub mod modules;
pub mod runner;

pub use config::ModulesConfig;
pub use modules::{
    Command, CommandSpec, ConfigPattern, ConversionError, DiscoveryError, ExecutionError,
    HostDescriptor, LifecycleError, LifecycleState, LocalTransport, ModuleError, ModuleRegistry,
    SessionVariables, TargetBinding, Transport, TransportError, VariableError, VariableStore,
};
