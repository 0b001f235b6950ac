//! Boundary with the external research agent.
//!
//! The agent owns model inference and tool use; this crate only sends it a
//! query and consumes the text it returns.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, info, warn};

/// Name of the web search tool; seeing it inside a citation means the model
/// echoed tool metadata instead of citing a source.
pub const SEARCH_TOOL_NAME: &str = "google_search";
pub const WIKI_TOOL_NAME: &str = "wikipedia";
pub const SAVE_TOOL_NAME: &str = "save_text_to_file";

/// Tool advertised to the agent alongside the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Tools the research agent is expected to have available.
pub fn default_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            SEARCH_TOOL_NAME,
            "Search the web using Google Custom Search API for current and comprehensive information",
        ),
        ToolDescriptor::new(
            WIKI_TOOL_NAME,
            "Look up a short encyclopedia summary for a query",
        ),
        ToolDescriptor::new(
            SAVE_TOOL_NAME,
            "Saves structured research data to a text file",
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub query: String,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

impl AgentRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            tools: default_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: String,
}

/// Anything that can turn a research query into raw report text.
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse>;
}

pub type DynAgent = Arc<dyn ResearchAgent>;

/// Replays a fixed output for every query. Used for offline runs and tests.
#[derive(Debug, Clone)]
pub struct StaticAgent {
    output: String,
}

impl StaticAgent {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

#[async_trait]
impl ResearchAgent for StaticAgent {
    fn name(&self) -> &str {
        "static"
    }

    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse> {
        debug!(query = %request.query, bytes = self.output.len(), "replaying static agent output");
        Ok(AgentResponse {
            output: self.output.clone(),
        })
    }
}

/// Settings for [`CommandAgent`].
#[derive(Debug, Clone)]
pub struct CommandAgentConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandAgentConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Runs an external agent program once per query.
///
/// The request is written to stdin as JSON. Stdout is either a JSON
/// `{"output": ...}` body or the raw output itself.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    config: CommandAgentConfig,
}

impl CommandAgent {
    pub fn new(config: CommandAgentConfig) -> Result<Self> {
        if config.program.trim().is_empty() {
            return Err(anyhow!("agent command must not be empty"));
        }
        Ok(Self { config })
    }

    #[tracing::instrument(skip(self, request), fields(program = %self.config.program))]
    async fn run(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let payload = serde_json::to_vec(request).context("failed to encode agent request")?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn agent command {}", self.config.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .context("failed to write agent request")?;
            stdin.shutdown().await.ok();
        }

        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match time::timeout(self.config.timeout, child.wait()).await {
            Ok(wait_outcome) => wait_outcome.context("failed to wait for agent process")?,
            Err(_elapsed) => {
                warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "agent timed out; terminating"
                );
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill agent process after timeout");
                }
                return Err(anyhow!(
                    "agent did not answer within {} ms",
                    self.config.timeout.as_millis()
                ));
            }
        };

        let stdout = stdout_task
            .await
            .context("failed to join stdout collection task")??;
        let stderr = stderr_task
            .await
            .context("failed to join stderr collection task")??;
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        info!(
            exit_code = status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            stdout_bytes = stdout.len(),
            "agent process finished"
        );

        if !status.success() {
            return Err(anyhow!(
                "agent exited with status {}: {}",
                status.code().map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr.trim()
            ));
        }

        Ok(AgentResponse {
            output: unwrap_output(stdout),
        })
    }
}

#[async_trait]
impl ResearchAgent for CommandAgent {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse> {
        self.run(request).await
    }
}

/// `{"output": ...}` and nothing else; a report that merely has an
/// `output` key must reach the parser intact.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputEnvelope {
    output: String,
}

fn unwrap_output(stdout: String) -> String {
    match serde_json::from_str::<OutputEnvelope>(stdout.trim()) {
        Ok(envelope) => envelope.output,
        Err(_) => stdout,
    }
}

async fn read_pipe<R>(reader: Option<R>) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader
            .read_to_end(&mut buf)
            .await
            .context("failed to read agent output")?;
    }
    Ok(buf)
}
