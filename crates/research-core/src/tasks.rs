use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tracing::{debug, info, instrument, warn};

use crate::agent::{AgentRequest, DynAgent};
use crate::metrics::record_normalization_metrics;
use crate::parser::{ParseStage, guard_leakage, has_leakage, parse_with_outcome};
use crate::report::{ReportField, StructuredReport};
use crate::trace::TraceEvent;

pub(crate) const QUERY_KEY: &str = "query";
pub(crate) const AGENT_OUTPUT_KEY: &str = "agent.output";
pub(crate) const AGENT_ERROR_KEY: &str = "agent.error";
pub(crate) const DRAFT_KEY: &str = "report.draft";
pub(crate) const STAGE_KEY: &str = "report.stage";
pub(crate) const ENHANCED_KEY: &str = "report.enhanced";
pub(crate) const LEAKED_KEY: &str = "report.leaked";
pub(crate) const FINAL_KEY: &str = "report.final";
pub(crate) const TRACE_KEY: &str = "trace.events";

async fn record_trace(context: &Context, task: &str, note: impl Into<String>) {
    let mut events: Vec<TraceEvent> = context.get(TRACE_KEY).await.unwrap_or_default();
    events.push(TraceEvent::new(task, note));
    context.set(TRACE_KEY, events).await;
}

async fn query(context: &Context) -> String {
    context.get(QUERY_KEY).await.unwrap_or_default()
}

/// Sends the query to the research agent and stores its raw output.
pub struct AgentTask {
    agent: DynAgent,
}

impl AgentTask {
    pub fn new(agent: DynAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Task for AgentTask {
    fn id(&self) -> &str {
        "agent"
    }

    #[instrument(name = "task.agent", skip(self, context), fields(agent = %self.agent.name()))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let query = query(&context).await;
        let request = AgentRequest::new(query.clone());

        match self.agent.invoke(&request).await {
            Ok(response) => {
                info!(%query, bytes = response.output.len(), "agent answered");
                record_trace(
                    &context,
                    self.id(),
                    format!("{} returned {} bytes", self.agent.name(), response.output.len()),
                )
                .await;
                context.set(AGENT_OUTPUT_KEY, response.output).await;
                Ok(TaskResult::new(
                    Some(format!("Agent answered \"{query}\"")),
                    NextAction::ContinueAndExecute,
                ))
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(%query, error = %message, "agent invocation failed");
                record_trace(&context, self.id(), format!("failed: {message}")).await;
                context.set(AGENT_ERROR_KEY, message).await;
                Ok(TaskResult::new(
                    Some("Agent failed; nothing to normalize".to_string()),
                    NextAction::End,
                ))
            }
        }
    }
}

/// Runs the parse/enhance pipeline over the agent output and flags leakage.
#[derive(Default)]
pub struct NormalizeTask;

#[async_trait]
impl Task for NormalizeTask {
    fn id(&self) -> &str {
        "normalize"
    }

    #[instrument(name = "task.normalize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let query = query(&context).await;
        let raw: String = context.get(AGENT_OUTPUT_KEY).await.unwrap_or_default();

        let outcome = parse_with_outcome(&raw, &query);
        let leaked = has_leakage(&outcome.report.detailed_findings);

        debug!(
            stage = %outcome.stage,
            enhanced = ?outcome.enhanced,
            leaked,
            "normalized agent output"
        );
        record_trace(
            &context,
            self.id(),
            format!(
                "stage {}, {} field(s) enhanced{}",
                outcome.stage,
                outcome.enhanced.len(),
                if leaked { ", findings leaked serialized data" } else { "" }
            ),
        )
        .await;

        context.set(DRAFT_KEY, &outcome.report).await;
        context.set(STAGE_KEY, outcome.stage).await;
        context.set(ENHANCED_KEY, &outcome.enhanced).await;
        context.set_sync(LEAKED_KEY, leaked);

        Ok(TaskResult::new(
            Some(format!("Parsed via {}", outcome.stage)),
            NextAction::ContinueAndExecute,
        ))
    }
}

/// Replaces a leaked draft with a fully synthesized report.
#[derive(Default)]
pub struct RegenerateTask;

#[async_trait]
impl Task for RegenerateTask {
    fn id(&self) -> &str {
        "regenerate"
    }

    #[instrument(name = "task.regenerate", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let query = query(&context).await;
        let draft: StructuredReport = context
            .get(DRAFT_KEY)
            .await
            .unwrap_or_else(|| StructuredReport::empty(query.as_str()));

        let (report, replaced) = guard_leakage(draft, &query);
        if let Some(replaced) = replaced {
            record_trace(
                &context,
                self.id(),
                format!("discarded leaked draft; synthesized {} fields", replaced.len()),
            )
            .await;
            context.set(ENHANCED_KEY, replaced).await;
        }
        context.set(DRAFT_KEY, &report).await;

        Ok(TaskResult::new(
            Some("Regenerated report content".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}

/// Publishes the draft as the final report.
#[derive(Default)]
pub struct FinalizeTask;

#[async_trait]
impl Task for FinalizeTask {
    fn id(&self) -> &str {
        "finalize"
    }

    #[instrument(name = "task.finalize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let query = query(&context).await;
        let report: StructuredReport = context
            .get(DRAFT_KEY)
            .await
            .unwrap_or_else(|| StructuredReport::empty(query.as_str()));
        let stage: ParseStage = context
            .get(STAGE_KEY)
            .await
            .unwrap_or(ParseStage::PlainTextSalvage);
        let enhanced: Vec<ReportField> = context.get(ENHANCED_KEY).await.unwrap_or_default();
        let leaked = context.get_sync::<bool>(LEAKED_KEY).unwrap_or(false);

        record_normalization_metrics(stage, &enhanced, leaked);
        info!(topic = %report.topic, %stage, sources = report.sources.len(), "report finalized");
        record_trace(
            &context,
            self.id(),
            format!("report on \"{}\" ready", report.topic),
        )
        .await;
        context.set(FINAL_KEY, &report).await;

        Ok(TaskResult::new(
            Some(format!("Report on \"{}\" finalized", report.topic)),
            NextAction::End,
        ))
    }
}
