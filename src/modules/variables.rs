//! Session-scoped variable store used for templating and state capture

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::modules::error::VariableError;

/// Named string variables shared by the commands of one run session.
///
/// Implementations synchronise internally; callers never assume atomicity
/// across a read, template, write sequence.
pub trait VariableStore: Send + Sync {
    fn get_var(&self, name: &str) -> Result<String, VariableError>;

    fn set_var(&self, name: &str, value: &str) -> Result<(), VariableError>;
}

/// In-memory variable store
#[derive(Debug, Default)]
pub struct SessionVariables {
    values: RwLock<HashMap<String, String>>,
    locked: RwLock<HashSet<String>>,
}

impl SessionVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
            locked: RwLock::new(HashSet::new()),
        }
    }

    /// Mark a variable read-only; later writes fail with `VariableError::Locked`
    pub fn lock(&self, name: &str) -> Result<(), VariableError> {
        self.locked
            .write()
            .map_err(|e| VariableError::Unavailable {
                reason: e.to_string(),
            })?
            .insert(name.to_string());
        Ok(())
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values
            .read()
            .map(|values| values.clone())
            .unwrap_or_default()
    }
}

impl VariableStore for SessionVariables {
    fn get_var(&self, name: &str) -> Result<String, VariableError> {
        let values = self.values.read().map_err(|e| VariableError::Unavailable {
            reason: e.to_string(),
        })?;
        values
            .get(name)
            .cloned()
            .ok_or_else(|| VariableError::NotFound {
                name: name.to_string(),
            })
    }

    fn set_var(&self, name: &str, value: &str) -> Result<(), VariableError> {
        let locked = self.locked.read().map_err(|e| VariableError::Unavailable {
            reason: e.to_string(),
        })?;
        if locked.contains(name) {
            return Err(VariableError::Locked {
                name: name.to_string(),
            });
        }
        drop(locked);

        self.values
            .write()
            .map_err(|e| VariableError::Unavailable {
                reason: e.to_string(),
            })?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_variable() {
        let store = SessionVariables::new();
        assert_eq!(
            store.get_var("absent"),
            Err(VariableError::NotFound {
                name: "absent".to_string()
            })
        );
    }

    #[test]
    fn test_set_then_get() {
        let store = SessionVariables::new();
        store.set_var("name", "world").unwrap();
        assert_eq!(store.get_var("name").unwrap(), "world");
    }

    #[test]
    fn test_locked_variable_rejects_writes() {
        let store = SessionVariables::with_values([("release", "1.0")]);
        store.lock("release").unwrap();

        let result = store.set_var("release", "2.0");
        assert!(matches!(result, Err(VariableError::Locked { .. })));
        assert_eq!(store.get_var("release").unwrap(), "1.0");
    }
}
