//! Credential handling. Secrets only ever come from the environment.

use std::env;
use std::fmt;

use crate::ResearchError;

/// Sensitive value whose `Debug` output never shows the content.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***redacted***")
    }
}

/// Read `var`, rejecting unset and blank values.
pub fn require_env(var: &str) -> Result<SecretValue, ResearchError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(ResearchError::MissingSecret(var.to_string())),
    }
}

/// Key pair the agent's web search tool needs.
#[derive(Debug, Clone)]
pub struct SearchCredentials {
    pub api_key: SecretValue,
    pub engine_id: SecretValue,
}

impl SearchCredentials {
    /// Both variables must be set; the first missing one is reported.
    pub fn from_env(api_key_env: &str, engine_id_env: &str) -> Result<Self, ResearchError> {
        Ok(Self {
            api_key: require_env(api_key_env)?,
            engine_id: require_env(engine_id_env)?,
        })
    }
}
