//! Transport that targets the local machine

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use super::Transport;
use crate::modules::error::TransportError;

/// Runs scripts through the local shell and copies with `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    working_directory: Option<PathBuf>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: Some(dir.into()),
        }
    }

    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }

        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }

    async fn copy_file(src: &Path, dest: &Path, mode: u32) -> Result<(), TransportError> {
        let target = if fs::metadata(dest).await.map(|m| m.is_dir()).unwrap_or(false) {
            match src.file_name() {
                Some(name) => dest.join(name),
                None => dest.to_path_buf(),
            }
        } else {
            dest.to_path_buf()
        };

        fs::copy(src, &target)
            .await
            .map_err(|e| TransportError::TransferFailed {
                src: src.display().to_string(),
                dest: target.display().to_string(),
                reason: e.to_string(),
            })?;
        set_mode(&target, mode).await
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn script(&self, command: &str) -> Result<String, TransportError> {
        debug!("Running local script: {}", command);
        let mut cmd = Self::shell(command);
        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(TransportError::ScriptFailed {
                command: command.to_string(),
                reason: match output.status.code() {
                    Some(code) => format!("exit status {code}"),
                    None => "terminated by signal".to_string(),
                },
                output: combined,
            });
        }
        Ok(combined)
    }

    async fn transfer_file(&self, src: &str, dest: &str, mode: u32) -> Result<(), TransportError> {
        debug!("Copying file {} -> {} ({:o})", src, dest, mode);
        Self::copy_file(Path::new(src), Path::new(dest), mode).await
    }

    async fn transfer_folder(
        &self,
        src: &str,
        dest: &str,
        mode: u32,
    ) -> Result<(), TransportError> {
        debug!("Copying folder {} -> {} ({:o})", src, dest, mode);
        let base = Path::new(src);
        let dest = Path::new(dest);

        for entry in walkdir::WalkDir::new(base) {
            let entry = entry.map_err(|e| TransportError::TransferFailed {
                src: src.to_string(),
                dest: dest.display().to_string(),
                reason: e.to_string(),
            })?;
            let relative = entry.path().strip_prefix(base).map_err(|e| {
                TransportError::TransferFailed {
                    src: entry.path().display().to_string(),
                    dest: dest.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).await?;
            } else {
                Self::copy_file(entry.path(), &target, mode).await?;
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), TransportError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(path: &Path, mode: u32) -> Result<(), TransportError> {
    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions).await?;
    Ok(())
}
