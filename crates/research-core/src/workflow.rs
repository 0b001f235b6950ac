use crate::agent::DynAgent;
use crate::parser::ParseStage;
use crate::report::{ReportField, StructuredReport};
use crate::tasks::{
    AGENT_ERROR_KEY, AgentTask, ENHANCED_KEY, FINAL_KEY, FinalizeTask, LEAKED_KEY, NormalizeTask,
    QUERY_KEY, RegenerateTask, STAGE_KEY, TRACE_KEY,
};
use crate::trace::TraceEvent;
use crate::ResearchError;
use anyhow::{Result, anyhow};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

struct GraphTasks {
    agent: Arc<AgentTask>,
    normalize: Arc<NormalizeTask>,
    regenerate: Arc<RegenerateTask>,
    finalize: Arc<FinalizeTask>,
}

fn build_graph(agent: DynAgent) -> (Arc<graph_flow::Graph>, GraphTasks) {
    let tasks = GraphTasks {
        agent: Arc::new(AgentTask::new(agent)),
        normalize: Arc::new(NormalizeTask),
        regenerate: Arc::new(RegenerateTask),
        finalize: Arc::new(FinalizeTask),
    };

    let graph = GraphBuilder::new("research_report_workflow")
        .add_task(tasks.agent.clone())
        .add_task(tasks.normalize.clone())
        .add_task(tasks.regenerate.clone())
        .add_task(tasks.finalize.clone())
        .add_edge(tasks.agent.id(), tasks.normalize.id())
        .add_conditional_edge(
            tasks.normalize.id(),
            |ctx| ctx.get_sync::<bool>(LEAKED_KEY).unwrap_or(false),
            tasks.regenerate.id(),
            tasks.finalize.id(),
        )
        .add_edge(tasks.regenerate.id(), tasks.finalize.id())
        .set_start_task(tasks.agent.id())
        .build();

    (Arc::new(graph), tasks)
}

/// Options for a single report session.
pub struct ReportSessionOptions {
    pub topic: String,
    pub session_id: Option<String>,
    pub agent: DynAgent,
}

impl ReportSessionOptions {
    pub fn new(topic: impl Into<String>, agent: DynAgent) -> Self {
        Self {
            topic: topic.into(),
            session_id: None,
            agent,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Everything a front end needs after a session completes.
#[derive(Debug, Clone)]
pub struct ReportSessionOutcome {
    pub session_id: String,
    pub report: StructuredReport,
    pub stage: ParseStage,
    pub enhanced: Vec<ReportField>,
    pub regenerated: bool,
    pub trace_events: Vec<TraceEvent>,
}

/// Query the agent for `topic` and normalize whatever it returns.
///
/// Errors only when the agent itself fails or the graph cannot run; the
/// normalization stages always produce a report.
pub async fn run_report_session(options: ReportSessionOptions) -> Result<ReportSessionOutcome> {
    let (graph, tasks) = build_graph(options.agent);

    let storage = Arc::new(InMemorySessionStorage::new());
    let runner = FlowRunner::new(graph, storage.clone());

    let session_id = options
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let session = Session::new_from_task(session_id.clone(), tasks.agent.id());
    session
        .context
        .set(QUERY_KEY, options.topic.trim().to_string())
        .await;

    storage
        .save(session)
        .await
        .map_err(|err| anyhow!("failed to persist session: {err}"))?;

    loop {
        let result = runner
            .run(&session_id)
            .await
            .map_err(|err| anyhow!("graph execution failure: {err}"))?;

        match result.status {
            ExecutionStatus::Completed => break,
            ExecutionStatus::WaitingForInput => continue,
            ExecutionStatus::Error(message) => return Err(anyhow!(message)),
        }
    }

    let session = storage
        .get(&session_id)
        .await
        .map_err(|err| anyhow!("failed to reload session: {err}"))?
        .ok_or_else(|| anyhow!("session missing after execution"))?;
    let context = &session.context;

    if let Some(message) = context.get::<String>(AGENT_ERROR_KEY).await {
        return Err(ResearchError::Agent(message).into());
    }

    let report: StructuredReport = context
        .get(FINAL_KEY)
        .await
        .ok_or_else(|| anyhow!("workflow finished without a final report"))?;
    let stage: ParseStage = context
        .get(STAGE_KEY)
        .await
        .unwrap_or(ParseStage::PlainTextSalvage);
    let enhanced: Vec<ReportField> = context.get(ENHANCED_KEY).await.unwrap_or_default();
    let regenerated = context.get::<bool>(LEAKED_KEY).await.unwrap_or(false);
    let trace_events: Vec<TraceEvent> = context.get(TRACE_KEY).await.unwrap_or_default();

    info!(
        %session_id,
        %stage,
        enhanced = enhanced.len(),
        regenerated,
        "report session completed"
    );

    Ok(ReportSessionOutcome {
        session_id,
        report,
        stage,
        enhanced,
        regenerated,
        trace_events,
    })
}
