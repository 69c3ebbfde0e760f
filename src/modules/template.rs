//! Placeholder substitution and list expansion for templated command fields
//!
//! Two passes compose: scalar `{{ name }}` substitution from the variable
//! store for every name in `withVars`, then, when `withList` is non-empty,
//! one invocation per list element with `{{ item }}` replaced by the element.
//! Scalar substitution is re-applied to each expanded invocation so list
//! elements may themselves reference variables.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::modules::error::{ExecutionError, VariableError};
use crate::modules::variables::VariableStore;

/// Placeholder replaced by each element of `withList`
pub const ITEM_PLACEHOLDER: &str = "{{ item }}";

/// What to do when a `withVars` name cannot be resolved from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingVariablePolicy {
    /// Skip the variable on any lookup failure and leave its placeholder
    #[default]
    LeavePlaceholder,
    /// Fail the run; an unset variable is `ExecutionError::MissingVariable`
    Strict,
}

/// Literal placeholder text for a variable name
pub fn placeholder(name: &str) -> String {
    format!("{{{{ {name} }}}}")
}

/// One concrete set of templated fields, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The `withList` element this invocation was expanded from
    pub item: Option<String>,
    /// Resolved fields, in the order the command declared them
    pub fields: Vec<String>,
}

impl Invocation {
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or_default()
    }
}

pub struct TemplateExpander<'a> {
    store: Option<&'a dyn VariableStore>,
    with_vars: &'a [String],
    policy: MissingVariablePolicy,
}

impl<'a> TemplateExpander<'a> {
    pub fn new(
        store: Option<&'a dyn VariableStore>,
        with_vars: &'a [String],
        policy: MissingVariablePolicy,
    ) -> Self {
        Self {
            store,
            with_vars,
            policy,
        }
    }

    /// Replace every `{{ name }}` for the names in `withVars`
    pub fn substitute(&self, text: &str) -> Result<String, ExecutionError> {
        let mut resolved = text.to_string();
        for name in self.with_vars {
            match self.lookup(name) {
                Ok(value) => {
                    resolved = resolved.replace(&placeholder(name), &value);
                }
                Err(VariableError::NotFound { .. })
                    if self.policy == MissingVariablePolicy::LeavePlaceholder =>
                {
                    debug!("Variable '{}' not set, leaving placeholder", name);
                }
                Err(e) if self.policy == MissingVariablePolicy::LeavePlaceholder => {
                    warn!("Lookup of '{}' failed, leaving placeholder: {}", name, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(resolved)
    }

    /// Produce the ordered invocations for a command's templated fields
    pub fn expand(
        &self,
        kind: &str,
        fields: &[&str],
        with_list: &[String],
    ) -> Result<Vec<Invocation>, ExecutionError> {
        let resolved = fields
            .iter()
            .map(|field| self.substitute(field))
            .collect::<Result<Vec<_>, _>>()?;

        if with_list.is_empty() {
            return Ok(vec![Invocation {
                item: None,
                fields: resolved,
            }]);
        }

        if !resolved.iter().any(|f| f.contains(ITEM_PLACEHOLDER)) {
            return Err(ExecutionError::NoScalableVariable {
                kind: kind.to_string(),
            });
        }

        let mut invocations = Vec::with_capacity(with_list.len());
        for item in with_list {
            let fields = resolved
                .iter()
                .map(|field| self.substitute(&field.replace(ITEM_PLACEHOLDER, item)))
                .collect::<Result<Vec<_>, _>>()?;
            invocations.push(Invocation {
                item: Some(item.clone()),
                fields,
            });
        }
        Ok(invocations)
    }

    fn lookup(&self, name: &str) -> Result<String, VariableError> {
        match self.store {
            Some(store) => store.get_var(name),
            None => Err(VariableError::NotFound {
                name: name.to_string(),
            }),
        }
    }
}
