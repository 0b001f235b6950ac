use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::warn;

use crate::agent::{CommandAgent, CommandAgentConfig};
use crate::report::DEFAULT_HISTORY_CAPACITY;
use crate::security::SearchCredentials;
use crate::{ResearchError, SecretValue, require_env};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "RESEARCH_CONFIG";

/// Top-level configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, ResearchError> {
        require_env(&self.llm.api_key_env)
    }

    /// Credentials for the agent's web search tool.
    pub fn search_credentials(&self) -> Result<SearchCredentials, ResearchError> {
        SearchCredentials::from_env(&self.search.api_key_env, &self.search.engine_id_env)
    }

    /// Build the external agent described by the `[agent]` section.
    pub fn command_agent(&self) -> Result<CommandAgent, ResearchError> {
        let mut agent = CommandAgentConfig::new(self.agent.command.clone());
        agent.args = self.agent.args.clone();
        agent.timeout = Duration::from_millis(self.agent.timeout_ms);
        agent.env = vec![
            ("RESEARCH_LLM_PROVIDER".to_string(), self.llm.provider.clone()),
            ("RESEARCH_LLM_MODEL".to_string(), self.llm.model.clone()),
        ];
        CommandAgent::new(agent).map_err(ResearchError::from)
    }
}

/// Helper to load configuration with best-practice guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `RESEARCH_CONFIG` environment variable.
    /// 3. `config.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ResearchError> {
        let config = Self::read(path)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Resolve and parse the configuration file without validating it.
    pub fn read(path: Option<PathBuf>) -> Result<Config, ResearchError> {
        let candidate = resolve_path(path);
        let raw = fs::read_to_string(&candidate)
            .map_err(|err| ResearchError::config_io(candidate.clone(), err))?;
        Self::from_toml(&raw)
    }

    /// Parse configuration text without touching the environment.
    pub fn from_toml(raw: &str) -> Result<Config, ResearchError> {
        toml::from_str(raw).map_err(|err| ResearchError::InvalidConfiguration(err.to_string()))
    }

    /// Check required settings and that the LLM secret is present.
    pub fn validate(config: &Config) -> Result<(), ResearchError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(ResearchError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.agent.command.trim().is_empty() {
            return Err(ResearchError::InvalidConfiguration(
                "agent.command must name the research agent program".into(),
            ));
        }
        if config.agent.timeout_ms == 0 {
            return Err(ResearchError::InvalidConfiguration(
                "agent.timeout_ms must be greater than zero".into(),
            ));
        }

        // Ensure environment variable exists at load time to discourage inline secrets.
        require_env(&config.llm.api_key_env)?;

        if let Err(err) = config.search_credentials() {
            warn!(
                error = %err,
                "search credentials not configured; agent web search will report an error"
            );
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "LlmConfig::default_api_key_env")]
    pub api_key_env: String,
}

impl LlmConfig {
    fn default_api_key_env() -> String {
        "MISTRAL_API_KEY".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "SearchConfig::default_engine_id_env")]
    pub engine_id_env: String,
}

impl SearchConfig {
    fn default_api_key_env() -> String {
        "GOOGLE_API_KEY".to_string()
    }

    fn default_engine_id_env() -> String {
        "GOOGLE_CSE_ID".to_string()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: Self::default_api_key_env(),
            engine_id_env: Self::default_engine_id_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "AgentConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl AgentConfig {
    const fn default_timeout_ms() -> u64 {
        300_000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_capacity")]
    pub capacity: usize,
}

impl HistoryConfig {
    const fn default_capacity() -> usize {
        DEFAULT_HISTORY_CAPACITY
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "ExportConfig::default_save_path")]
    pub save_path: PathBuf,
}

impl ExportConfig {
    fn default_save_path() -> PathBuf {
        PathBuf::from("research_output.txt")
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            save_path: Self::default_save_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}
