//! Search agent orchestrator implementing the bounded model → tools → citations loop.
//!
//! A [`SearchAgent`] is immutable and can be shared between concurrent runs. Each
//! call to [`SearchAgent::run`] owns a fresh [`RunState`] (message log, citation
//! accumulator, usage counters, tool-call log) that is dropped when the run ends.
//!
//! Model failures propagate to the caller without retry. Tool failures become
//! `Error: ...` tool results so the model can react to them.

use crate::brain::LlmProvider;
use crate::citation::{CitationParser, CitationSet};
use crate::config::{AgentConfig, AppConfig};
use crate::error::{LlmError, Result, ToolError};
use crate::prompts::{FINAL_ANSWER_INSTRUCTION, system_prompt};
use crate::types::{
    AgentResponse, AgentResult, CompletionRequest, FinalAnswer, Message, OutputKind,
    OutputSchema, ToolCallRecord, ToolDefinition, ToolOutput,
};
use crate::usage::UsageStats;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Executes the tools offered to the model.
///
/// Implementations are bound to one document root at construction.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool schema sent with every model call.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run one tool call. Unknown tool names should produce an `Ok` notice, not an error.
    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError>;
}

/// Truncate a string to at most `max_chars` characters, respecting UTF-8 boundaries.
fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// A tool call copied out of the assistant message before it joins the log.
#[derive(Debug, Clone)]
struct PendingCall {
    id: String,
    name: String,
    arguments: serde_json::Value,
}

/// Everything one run accumulates.
#[derive(Debug, Default)]
pub struct RunState {
    pub messages: Vec<Message>,
    pub citations: CitationSet,
    pub usage: UsageStats,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl RunState {
    fn new(system: &str, query: &str) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(query)],
            ..Self::default()
        }
    }
}

/// The question-answering agent.
pub struct SearchAgent {
    provider: Arc<dyn LlmProvider>,
    executor: Arc<dyn ToolExecutor>,
    parser: CitationParser,
    config: AgentConfig,
    system_prompt: String,
    input_price_per_million: f64,
    output_price_per_million: f64,
}

impl SearchAgent {
    /// Create an agent with the default parser and prompt for a `docs/` root.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: Arc<dyn ToolExecutor>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            executor,
            parser: CitationParser::default(),
            config,
            system_prompt: system_prompt("docs/", None),
            input_price_per_million: 0.0,
            output_price_per_million: 0.0,
        }
    }

    /// Create an agent wired from the full application config.
    ///
    /// `document_tree` is embedded in the system prompt when given.
    pub fn from_config(
        provider: Arc<dyn LlmProvider>,
        executor: Arc<dyn ToolExecutor>,
        config: &AppConfig,
        document_tree: Option<&str>,
    ) -> Self {
        let root = config.search.root.to_string_lossy();
        let parser = CitationParser::new(&root)
            .with_extensions(&config.search.extensions)
            .with_excluded_prefixes(&config.search.excluded_prefixes);
        Self::new(provider, executor, config.agent.clone())
            .with_parser(parser)
            .with_system_prompt(system_prompt(&root, document_tree))
            .with_prices(
                config.llm.input_price_per_million,
                config.llm.output_price_per_million,
            )
    }

    pub fn with_parser(mut self, parser: CitationParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Prices used for the cost estimate logged at the end of each run.
    pub fn with_prices(mut self, input_per_million: f64, output_per_million: f64) -> Self {
        self.input_price_per_million = input_per_million;
        self.output_price_per_million = output_per_million;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run with the configured iteration budget.
    pub async fn ask(&self, query: &str) -> Result<AgentResult> {
        self.run(query, self.config.max_iterations).await
    }

    /// Answer `query` in at most `max_iterations` tool-calling turns plus one final
    /// structured call.
    pub async fn run(&self, query: &str, max_iterations: usize) -> Result<AgentResult> {
        let run_id = Uuid::new_v4();
        info!(%run_id, query, max_iterations, "Running agent");

        let mut state = RunState::new(&self.system_prompt, query);
        let tools = self.executor.definitions();

        for iteration in 0..max_iterations {
            let request = CompletionRequest {
                messages: state.messages.clone(),
                tools: Some(tools.clone()),
                ..Default::default()
            };

            let started = Instant::now();
            let outcome = self.provider.complete(request).await;
            let elapsed = started.elapsed().as_secs_f64();
            let response = match outcome {
                Ok(response) => {
                    state.usage.add(response.usage.as_ref(), elapsed);
                    response
                }
                Err(e) => {
                    state.usage.add(None, elapsed);
                    warn!(%run_id, iteration, error = %e, "Model call failed");
                    return Err(e.into());
                }
            };

            let calls: Vec<PendingCall> = response
                .message
                .tool_calls()
                .iter()
                .map(|call| PendingCall {
                    id: call.id.to_string(),
                    name: call.name.to_string(),
                    arguments: call.arguments.clone(),
                })
                .collect();
            state.messages.push(response.message);

            if calls.is_empty() {
                debug!(%run_id, iteration, "Model requested no tools");
                break;
            }

            for call in &calls {
                info!(tool = %call.name, arguments = %call.arguments, "Tool call");
                state.tool_calls.push(ToolCallRecord {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }

            let outcomes = self.dispatch(&calls).await;
            for (call, outcome) in calls.into_iter().zip(outcomes) {
                self.record_outcome(&mut state, call, outcome);
            }
        }

        self.finish(run_id, state).await
    }

    /// Execute one turn's calls. Results come back in call order either way.
    async fn dispatch(
        &self,
        calls: &[PendingCall],
    ) -> Vec<std::result::Result<ToolOutput, ToolError>> {
        if self.config.parallel_tool_calls && calls.len() > 1 {
            join_all(
                calls
                    .iter()
                    .map(|call| self.executor.execute(&call.name, &call.arguments)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(self.executor.execute(&call.name, &call.arguments).await);
            }
            outcomes
        }
    }

    fn record_outcome(
        &self,
        state: &mut RunState,
        call: PendingCall,
        outcome: std::result::Result<ToolOutput, ToolError>,
    ) {
        match outcome {
            Ok(output) => {
                info!(tool = %call.name, chars = output.content.len(), "Tool finished");
                if output.kind == OutputKind::SearchMatches {
                    debug!(
                        tool = %call.name,
                        preview = %truncate_str(&output.content, 200),
                        "Search result preview"
                    );
                    if output.has_matches() {
                        let found = self.parser.parse(&output.content);
                        let extracted = found.len();
                        let added = state.citations.merge(found);
                        info!(tool = %call.name, extracted, added, "Extracted citations");
                    } else {
                        info!(tool = %call.name, "No matches found for this search");
                    }
                }
                state
                    .messages
                    .push(Message::tool_result(call.id, output.content, false));
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                state
                    .messages
                    .push(Message::tool_result(call.id, format!("Error: {e}"), true));
            }
        }
    }

    /// Ask for the final `{question, answer}` and assemble the result.
    async fn finish(&self, run_id: Uuid, mut state: RunState) -> Result<AgentResult> {
        state.messages.push(Message::user(FINAL_ANSWER_INSTRUCTION));
        info!(%run_id, "Requesting final structured answer");

        let schema = OutputSchema::final_answer();
        let request = CompletionRequest {
            messages: state.messages.clone(),
            tools: None,
            ..Default::default()
        };
        let started = Instant::now();
        let outcome = self.provider.complete_structured(request, &schema).await;
        let elapsed = started.elapsed().as_secs_f64();
        let structured = match outcome {
            Ok(structured) => {
                state.usage.add(structured.usage.as_ref(), elapsed);
                structured
            }
            Err(e) => {
                state.usage.add(None, elapsed);
                warn!(%run_id, error = %e, "Final structured call failed");
                return Err(e.into());
            }
        };

        let answer: FinalAnswer =
            serde_json::from_value(structured.value).map_err(|e| LlmError::StructuredOutput {
                schema: schema.name.clone(),
                message: e.to_string(),
            })?;

        let collected = state.citations.len();
        let citations = state.citations.into_capped(self.config.max_citations);
        info!(%run_id, collected, attached = citations.len(), "Attached citations from search results");

        let cost = state
            .usage
            .cost(self.input_price_per_million, self.output_price_per_million);
        info!(
            %run_id,
            calls = state.usage.calls,
            total_tokens = state.usage.total_tokens,
            tool_calls = state.tool_calls.len(),
            cost_usd = cost,
            "Agent finished"
        );

        Ok(AgentResult {
            response: AgentResponse {
                question: answer.question,
                answer: answer.answer,
                citations,
            },
            usage: state.usage,
            tool_calls: state.tool_calls,
        })
    }
}
