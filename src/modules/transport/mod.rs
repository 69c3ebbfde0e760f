//! Transport collaborator: remote script execution and file transfer

use async_trait::async_trait;

use crate::modules::error::TransportError;

pub mod local;

pub use local::LocalTransport;

/// Performs the actual work against a target host.
///
/// Implementations enforce their own timeouts; commands never cancel a call
/// that is already in flight.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a script and return its combined output
    async fn script(&self, command: &str) -> Result<String, TransportError>;

    /// Copy a single local file to `dest` with the given mode
    async fn transfer_file(&self, src: &str, dest: &str, mode: u32) -> Result<(), TransportError>;

    /// Copy a local folder tree to `dest`, applying `mode` to its files
    async fn transfer_folder(
        &self,
        src: &str,
        dest: &str,
        mode: u32,
    ) -> Result<(), TransportError>;
}
