use thiserror::Error;

use crate::modules::lifecycle::LifecycleState;

/// Errors raised while binding an argument bag into a typed command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Unknown argument: {kind}.{key}")]
    UnknownArgument { kind: String, key: String },

    #[error("Missing required argument: {kind}.{key}")]
    MissingRequiredArgument { kind: String, key: String },

    #[error("Unable to parse argument {kind}.{key}: got type {got}, expected {want}")]
    ArgumentTypeMismatch {
        kind: String,
        key: String,
        got: String,
        want: String,
    },

    #[error("Invalid value for {kind}.{key}: {value} - {reason}")]
    InvalidArgumentValue {
        kind: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Argument {kind}.{key} given more than once")]
    DuplicateArgument { kind: String, key: String },

    #[error("Unable to parse {kind} arguments of type {got}, expected a map")]
    InvalidArgumentBag { kind: String, got: String },
}

/// Errors raised while running a bound command
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No templated field of {kind} contains the scalable variable '{{{{ item }}}}'")]
    NoScalableVariable { kind: String },

    #[error("Variable '{name}' is not defined in the session")]
    MissingVariable { name: String },

    #[error("Source file/folder doesn't exist: {path}")]
    SourceNotFound { path: String },

    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("Command {kind} has no {what} bound")]
    NotBound { kind: String, what: String },

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Command {id} was stopped before completion")]
    Cancelled { id: String },

    #[error("Internal fault: {message}")]
    InternalFault { message: String },
}

/// Rejected lifecycle transitions (pause/resume misuse)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid lifecycle transition: cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: LifecycleState,
    },
}

/// Errors raised by the module registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Unknown module: {name}")]
    UnknownModule { name: String },

    #[error("Unknown feature '{feature}' for module {module}")]
    UnknownFeature { module: String, feature: String },
}

/// Errors reported by a transport implementation
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Script failed: {command} - {reason}, output: {output}")]
    ScriptFailed {
        command: String,
        reason: String,
        output: String,
    },

    #[error("Transfer of {src} to {dest} failed: {reason}")]
    TransferFailed {
        src: String,
        dest: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a variable store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("Variable not found: {name}")]
    NotFound { name: String },

    #[error("Variable is write-locked: {name}")]
    Locked { name: String },

    #[error("Variable store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Umbrella error for host-facing entry points
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Internal fault in module {module}: {message}")]
    InternalFault { module: String, message: String },
}

impl From<VariableError> for ExecutionError {
    fn from(err: VariableError) -> Self {
        match err {
            VariableError::NotFound { name } => ExecutionError::MissingVariable { name },
            other => ExecutionError::InternalFault {
                message: other.to_string(),
            },
        }
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
