//! Copy module - transfers a local file or folder to the target

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::ModulesConfig;
use crate::modules::binder::{format_file_mode, ArgType, ArgumentSpec};
use crate::modules::command::{Bound, CommandKind, CommandSpec, RunContext};
use crate::modules::error::ExecutionError;
use crate::modules::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCommand {
    pub source: String,
    pub destination: String,
    pub mode: u32,
    pub create_destination: bool,
}

impl CopyCommand {
    async fn copy_one(
        &self,
        transport: &dyn Transport,
        src: &str,
        dest: &str,
    ) -> Result<(), ExecutionError> {
        let metadata = tokio::fs::metadata(src)
            .await
            .map_err(|_| ExecutionError::SourceNotFound {
                path: src.to_string(),
            })?;

        if self.create_destination {
            if let Some(parent) = Path::new(dest)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
            {
                let parent = parent.to_string_lossy();
                transport
                    .script(&format!("mkdir -p {}", shell_words::quote(&parent)))
                    .await?;
            }
        }

        if metadata.is_dir() {
            transport.transfer_folder(src, dest, self.mode).await?;
        } else {
            transport.transfer_file(src, dest, self.mode).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommandKind for CopyCommand {
    const KIND: &'static str = "copy";

    fn seed(config: &ModulesConfig) -> Self {
        Self {
            source: String::new(),
            destination: String::new(),
            mode: config.file_mode(),
            create_destination: false,
        }
    }

    fn schema() -> Vec<ArgumentSpec<Bound<Self>>> {
        vec![
            ArgumentSpec {
                name: "srcDir",
                ty: ArgType::Text,
                required: true,
                description: "Local file or folder to copy",
                apply: |b, v| b.params.source = v.into_text(),
            },
            ArgumentSpec {
                name: "destDir",
                ty: ArgType::Text,
                required: true,
                description: "Destination path on the target",
                apply: |b, v| b.params.destination = v.into_text(),
            },
            ArgumentSpec {
                name: "perm",
                ty: ArgType::FileMode,
                required: false,
                description: "Octal mode for copied files",
                apply: |b, v| b.params.mode = v.into_mode(),
            },
            ArgumentSpec {
                name: "createIfMissing",
                ty: ArgType::Flag,
                required: false,
                description: "Create the destination's parent folder first",
                apply: |b, v| b.params.create_destination = v.into_flag(),
            },
        ]
    }

    fn into_spec(self) -> CommandSpec {
        CommandSpec::Copy(self)
    }

    fn to_arguments(&self, bag: &mut Map<String, Value>) {
        bag.insert("srcDir".to_string(), Value::from(self.source.clone()));
        bag.insert("destDir".to_string(), Value::from(self.destination.clone()));
        bag.insert("perm".to_string(), Value::from(format_file_mode(self.mode)));
        bag.insert(
            "createIfMissing".to_string(),
            Value::from(self.create_destination),
        );
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<(), ExecutionError> {
        let transport = ctx.transport()?;
        let invocations = ctx.expand(&[self.source.as_str(), self.destination.as_str()])?;

        for invocation in &invocations {
            ctx.checkpoint().await?;
            let (src, dest) = (invocation.field(0), invocation.field(1));
            if let Some(item) = &invocation.item {
                debug!("List item: {}", item);
            }
            debug!("Source: {}", src);
            debug!("Destination: {}", dest);
            debug!("Create destination: {}", self.create_destination);
            self.copy_one(transport, src, dest).await?;
        }
        Ok(())
    }
}

impl fmt::Display for CopyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CopyCommand {{ srcDir: {:?}, destDir: {:?}, perm: {}, createIfMissing: {} }}",
            self.source,
            self.destination,
            format_file_mode(self.mode),
            self.create_destination
        )
    }
}
