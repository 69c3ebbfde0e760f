//! Shell module - runs a script on the target through the transport

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::config::ModulesConfig;
use crate::modules::binder::{ArgType, ArgumentSpec};
use crate::modules::command::{Bound, CommandKind, CommandSpec, RunContext};
use crate::modules::error::ExecutionError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellCommand {
    pub exec: String,
    pub run_as: Option<String>,
    pub as_root: bool,
    pub save_state: Option<String>,
}

impl ShellCommand {
    /// Wrap the resolved command text for privilege changes
    pub fn script_for(&self, command: &str) -> String {
        match (&self.run_as, self.as_root) {
            (Some(user), _) => format!(
                "sudo -n -u {} sh -c {}",
                shell_words::quote(user),
                shell_words::quote(command)
            ),
            (None, true) => format!("sudo -n sh -c {}", shell_words::quote(command)),
            (None, false) => command.to_string(),
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl CommandKind for ShellCommand {
    const KIND: &'static str = "shell";

    fn seed(_config: &ModulesConfig) -> Self {
        Self::default()
    }

    fn schema() -> Vec<ArgumentSpec<Bound<Self>>> {
        vec![
            ArgumentSpec {
                name: "exec",
                ty: ArgType::Command,
                required: true,
                description: "Command text to run on the target",
                apply: |b, v| b.params.exec = v.into_text(),
            },
            ArgumentSpec {
                name: "runAs",
                ty: ArgType::Text,
                required: false,
                description: "Run the command as this user (via sudo)",
                apply: |b, v| b.params.run_as = non_empty(v.into_text()),
            },
            ArgumentSpec {
                name: "asRoot",
                ty: ArgType::Flag,
                required: false,
                description: "Run the command as root (via sudo)",
                apply: |b, v| b.params.as_root = v.into_flag(),
            },
            ArgumentSpec {
                name: "saveState",
                ty: ArgType::Text,
                required: false,
                description: "Session variable receiving the trimmed output",
                apply: |b, v| b.params.save_state = non_empty(v.into_text()),
            },
        ]
    }

    fn into_spec(self) -> CommandSpec {
        CommandSpec::Shell(self)
    }

    fn to_arguments(&self, bag: &mut Map<String, Value>) {
        bag.insert("exec".to_string(), Value::from(self.exec.clone()));
        if let Some(user) = &self.run_as {
            bag.insert("runAs".to_string(), Value::from(user.clone()));
        }
        bag.insert("asRoot".to_string(), Value::from(self.as_root));
        if let Some(name) = &self.save_state {
            bag.insert("saveState".to_string(), Value::from(name.clone()));
        }
    }

    async fn execute(&self, ctx: &RunContext<'_>) -> Result<(), ExecutionError> {
        let transport = ctx.transport()?;
        let invocations = ctx.expand(&[self.exec.as_str()])?;

        let mut combined = String::new();
        for invocation in &invocations {
            ctx.checkpoint().await?;
            if let Some(item) = &invocation.item {
                debug!("List item: {}", item);
            }
            let script = self.script_for(invocation.field(0));
            debug!("Running script on {}: {}", ctx.host().name, script);
            let output = transport.script(&script).await?;
            combined.push_str(&output);
        }

        if let Some(name) = &self.save_state {
            let saved = match ctx.session() {
                Some(session) => session
                    .set_var(name, combined.trim())
                    .map_err(|e| e.to_string()),
                None => Err("no session bound".to_string()),
            };
            if let Err(reason) = saved {
                warn!("Unable to save state: {} ({})", name, reason);
            }
        }
        Ok(())
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShellCommand {{ exec: {:?}, runAs: {:?}, asRoot: {}, saveState: {:?} }}",
            self.exec, self.run_as, self.as_root, self.save_state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_script() {
        let shell = ShellCommand {
            exec: "ls".to_string(),
            ..Default::default()
        };
        assert_eq!(shell.script_for("ls -la"), "ls -la");
    }

    #[test]
    fn test_as_root_wraps_with_sudo() {
        let shell = ShellCommand {
            as_root: true,
            ..Default::default()
        };
        assert_eq!(
            shell.script_for("systemctl restart nginx"),
            "sudo -n sh -c 'systemctl restart nginx'"
        );
    }

    #[test]
    fn test_run_as_user() {
        let shell = ShellCommand {
            run_as: Some("deploy".to_string()),
            as_root: true,
            ..Default::default()
        };
        assert_eq!(shell.script_for("whoami"), "sudo -n -u deploy sh -c whoami");
    }
}
