//! Core command kinds

pub mod copy;
pub mod service;
pub mod shell;

pub use copy::CopyCommand;
pub use service::ServiceCommand;
pub use shell::ShellCommand;
