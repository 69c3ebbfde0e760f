//! Deployment modules: argument binding, templating and command lifecycle

pub mod binder;
pub mod command;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod template;
pub mod transport;
pub mod variables;

// Re-export commonly used types
pub use command::{Command, CommandSpec, ConfigPattern, HostDescriptor, TargetBinding};
pub use error::*;
pub use lifecycle::LifecycleState;
pub use registry::{ModuleConverter, ModuleExecutor, ModuleFeature, ModuleRegistry};
pub use template::MissingVariablePolicy;
pub use transport::{LocalTransport, Transport};
pub use variables::{SessionVariables, VariableStore};
