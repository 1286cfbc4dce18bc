//! Secret source collaborator.
//!
//! The topology core never mutates secret storage and treats a source as
//! time-invariant within a single build: each key is read once at build time.

use std::collections::HashMap;

/// External source of secret values, keyed by name.
pub trait SecretSource {
    /// Look up a secret value. `None` means the key is not set at all.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Secret source backed by the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory secret source, used by tests and embedded fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair, returning self for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
