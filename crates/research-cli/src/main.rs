use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use research_core::{
    Config, ConfigLoader, DynAgent, EvaluationHarness, ExportFormat, ReportHistory, ReportLogInput,
    ReportSessionOptions, ReportSessionOutcome, SessionTrace, StaticAgent, TelemetryOptions,
    append_report, init_metrics_from_env, init_telemetry, log_report_completion, persist_trace,
    render, run_report_session,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Runtime;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "research-cli",
    version,
    about = "Research assistant: query an agent and normalize its report"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a topic with the configured agent.
    Run(RunArgs),
    /// Normalize agent output captured earlier.
    Normalize(NormalizeArgs),
    /// Prompt for topics until `:quit`.
    Interactive(InteractiveArgs),
    /// Summarize a completion log.
    Eval(EvalArgs),
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Rendering for the report (text, markdown, html).
    #[arg(long, default_value = "markdown")]
    format: ExportFormat,

    /// Print the report as JSON instead of rendering it.
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Print the task trace after the report.
    #[arg(long)]
    explain: bool,

    /// Directory to persist the session trace into.
    #[arg(long)]
    trace_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Configuration file (falls back to RESEARCH_CONFIG, then config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optional session ID (a UUID is generated otherwise).
    #[arg(long)]
    session: Option<String>,

    /// Append the report to a text file; defaults to `[export] save_path`.
    #[arg(long, num_args = 0..=1)]
    save: Option<Option<PathBuf>>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Topic the output was produced for.
    #[arg(long)]
    topic: String,

    /// File holding raw agent output; `-` or omitted reads stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct InteractiveArgs {
    /// Configuration file (falls back to RESEARCH_CONFIG, then config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// Path to a `session.jsonl` completion log.
    #[arg(long)]
    log: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
            Command::Normalize(args) => normalize_command(args).await?,
            Command::Interactive(args) => interactive_command(args).await?,
            Command::Eval(args) => eval_command(args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

/// Read the config, install telemetry at its log level, then validate.
fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = ConfigLoader::read(path)?;
    init_telemetry(TelemetryOptions::with_level(config.logging.level.clone()))?;
    ConfigLoader::validate(&config)?;
    init_metrics_from_env("research-cli")?;
    Ok(config)
}

async fn run_command(args: RunArgs) -> Result<()> {
    let config = load_config(args.config)?;
    info!(topic = %args.topic, "starting research session");

    let agent: DynAgent = Arc::new(config.command_agent()?);
    let mut options = ReportSessionOptions::new(args.topic, agent);
    if let Some(session_id) = args.session {
        options = options.with_session_id(session_id);
    }

    let outcome = run_report_session(options).await?;
    let save_path = args
        .save
        .map(|path| path.unwrap_or_else(|| config.export.save_path.clone()));
    finish_session(&outcome, &args.output, save_path.as_deref())
}

async fn normalize_command(args: NormalizeArgs) -> Result<()> {
    init_telemetry(TelemetryOptions::default())?;

    let raw = read_agent_output(args.input.as_deref()).await?;

    let agent: DynAgent = Arc::new(StaticAgent::new(raw));
    let outcome = run_report_session(ReportSessionOptions::new(args.topic, agent)).await?;
    finish_session(&outcome, &args.output, None)
}

/// Captured output may not be UTF-8; invalid bytes become U+FFFD.
async fn read_agent_output(input: Option<&Path>) -> Result<String> {
    let bytes = match input {
        Some(path) if path != Path::new("-") => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read agent output from {}", path.display()))?,
        _ => {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .context("failed to read agent output from stdin")?;
            buffer
        }
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn interactive_command(args: InteractiveArgs) -> Result<()> {
    let config = load_config(args.config)?;
    let agent: DynAgent = Arc::new(config.command_agent()?);
    let mut history = ReportHistory::with_capacity(config.history.capacity);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout
            .write_all(b"What can I help you research? ")
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let topic = line.trim();
        match topic {
            "" => continue,
            ":quit" | ":exit" => break,
            ":history" => {
                if history.is_empty() {
                    println!("No reports yet.");
                }
                for (idx, report) in history.iter().enumerate() {
                    println!("{}. {}", idx + 1, report.topic);
                }
                continue;
            }
            _ => {}
        }

        let options = ReportSessionOptions::new(topic, agent.clone());
        match run_report_session(options).await {
            Ok(outcome) => {
                finish_session(&outcome, &args.output, None)?;
                history.push(outcome.report);
            }
            Err(err) => {
                warn!(error = %err, "research session failed");
                eprintln!("Error: {err:#}");
            }
        }
    }

    Ok(())
}

fn eval_command(args: EvalArgs) -> Result<()> {
    init_telemetry(TelemetryOptions::default())?;
    let metrics = EvaluationHarness::analyze_log(&args.log)?;
    println!("{}", metrics.summary());
    if !metrics.regenerated.is_empty() {
        println!("regenerated sessions: {}", metrics.regenerated.join(", "));
    }
    Ok(())
}

fn finish_session(
    outcome: &ReportSessionOutcome,
    output: &OutputArgs,
    save_path: Option<&Path>,
) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        println!("{}", render(&outcome.report, output.format));
    }

    if output.explain {
        println!("{}", SessionTrace::from(outcome.trace_events.clone()).render_markdown());
    }

    let trace_path = match output.trace_dir.as_deref() {
        Some(dir) => {
            let path = persist_trace(dir, &outcome.session_id, &outcome.trace_events)?;
            info!(path = %path.display(), "trace persisted");
            Some(path.display().to_string())
        }
        None => None,
    };

    if let Some(path) = save_path {
        let receipt = append_report(&outcome.report, path);
        println!("{}", receipt.message);
    }

    let log_input = ReportLogInput {
        session_id: outcome.session_id.clone(),
        topic: outcome.report.topic.clone(),
        stage: outcome.stage,
        enhanced: outcome.enhanced.clone(),
        regenerated: outcome.regenerated,
        sources: outcome.report.sources.clone(),
        trace_path,
    };
    if let Err(err) = log_report_completion(log_input) {
        warn!(error = %err, "failed to write completion log");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::parse;
    use std::io::Write;

    #[tokio::test]
    async fn invalid_utf8_input_is_read_lossily() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Report\xff\xfe on tides\n\x00\x9f").unwrap();

        let raw = read_agent_output(Some(file.path())).await.unwrap();
        assert!(raw.starts_with("Report"));
        assert!(raw.contains('\u{FFFD}'));

        let report = parse(&raw, "tides");
        assert_eq!(report.topic, "tides");
        assert!(!report.abstract_text.is_empty());
        assert!(!report.detailed_findings.is_empty());
        assert!(!report.sources.is_empty());
    }

    #[tokio::test]
    async fn missing_input_file_names_the_path() {
        let err = read_agent_output(Some(Path::new("/nonexistent/agent.out")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/agent.out"));
    }
}
