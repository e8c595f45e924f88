//! Integration tests for the search agent.
//!
//! These tests drive the full loop with MockLlmProvider and a scripted tool
//! executor, checking what ends up in the message log, the citations, and the
//! tool-call record.

use async_trait::async_trait;
use greprag_core::agent::{SearchAgent, ToolExecutor};
use greprag_core::brain::MockLlmProvider;
use greprag_core::config::AgentConfig;
use greprag_core::error::{GrepragError, LlmError, ToolError};
use greprag_core::prompts::FINAL_ANSWER_INSTRUCTION;
use greprag_core::types::{Content, NO_MATCHES, ToolDefinition, ToolOutput};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Answers by tool name:
/// - `rg_search` returns the `pattern` argument as search output
/// - `slow` sleeps for `ms` milliseconds, then echoes `tag`
/// - `broken` fails
/// - anything else returns a plain notice
struct ScriptedExecutor;

#[async_trait]
impl ToolExecutor for ScriptedExecutor {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "rg_search".to_string(),
            description: "Search documents".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "pattern": { "type": "string" } },
                "required": ["pattern"]
            }),
        }]
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        match name {
            "rg_search" => Ok(ToolOutput::search_matches(
                arguments["pattern"].as_str().unwrap_or_default(),
            )),
            "slow" => {
                let ms = arguments["ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ToolOutput::text(format!(
                    "done {}",
                    arguments["tag"].as_str().unwrap_or_default()
                )))
            }
            "broken" => Err(ToolError::ExecutionFailed {
                name: name.to_string(),
                message: "boom".to_string(),
            }),
            other => Ok(ToolOutput::text(format!("Unknown tool: {other}"))),
        }
    }
}

fn agent(provider: Arc<MockLlmProvider>, config: AgentConfig) -> SearchAgent {
    SearchAgent::new(provider, Arc::new(ScriptedExecutor), config)
}

/// Tool results in the final request, as `(call_id, output, is_error)`.
fn tool_results(provider: &MockLlmProvider) -> Vec<(String, String, bool)> {
    let requests = provider.requests();
    let last = requests.last().expect("at least one request");
    last.messages
        .iter()
        .filter_map(|m| match &m.content {
            Content::ToolResult {
                call_id,
                output,
                is_error,
            } => Some((call_id.clone(), output.clone(), *is_error)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_iteration_budget_then_final_call() {
    let provider = Arc::new(MockLlmProvider::always_calling(
        "rg_search",
        json!({"pattern": "docs/a.txt:1:alpha"}),
    ));
    let agent = agent(provider.clone(), AgentConfig::default());

    let result = agent.run("What is alpha?", 1).await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].tools.is_some());
    assert!(requests[1].tools.is_none());
    assert_eq!(
        requests[1].messages.last().unwrap().text(),
        FINAL_ANSWER_INSTRUCTION
    );
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.response.question, "What is alpha?");
    assert_eq!(result.response.answer, "mock answer");
    assert_eq!(result.usage.calls, 2);
}

#[tokio::test]
async fn test_zero_iterations_goes_straight_to_final_answer() {
    let provider = Arc::new(MockLlmProvider::new());
    let agent = agent(provider.clone(), AgentConfig::default());

    let result = agent.run("Anything?", 0).await.unwrap();

    assert_eq!(provider.requests().len(), 1);
    assert!(result.tool_calls.is_empty());
    assert!(result.response.citations.is_empty());
}

#[tokio::test]
async fn test_parallel_results_keep_call_order() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::multi_tool_call_response(vec![
        ("slow", json!({"ms": 30, "tag": "first"})),
        ("slow", json!({"ms": 1, "tag": "second"})),
        ("slow", json!({"ms": 10, "tag": "third"})),
    ]));
    let config = AgentConfig {
        parallel_tool_calls: true,
        ..AgentConfig::default()
    };
    let agent = agent(provider.clone(), config);

    agent.ask("order?").await.unwrap();

    let results = tool_results(&provider);
    let ids: Vec<&str> = results.iter().map(|(id, _, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["call_0", "call_1", "call_2"]);
    let outputs: Vec<&str> = results.iter().map(|(_, out, _)| out.as_str()).collect();
    assert_eq!(outputs, vec!["done first", "done second", "done third"]);
}

#[tokio::test]
async fn test_citations_deduplicated_across_calls() {
    let provider = Arc::new(MockLlmProvider::new());
    let hit = "docs/biology/leaf.txt:12:Chlorophyll breaks down in autumn.";
    provider.queue_response(MockLlmProvider::tool_call_response(
        "rg_search",
        json!({ "pattern": hit }),
    ));
    provider.queue_response(MockLlmProvider::multi_tool_call_response(vec![
        ("rg_search", json!({ "pattern": hit })),
        (
            "rg_search",
            json!({ "pattern": "docs/atp.md-3-ATP stores energy." }),
        ),
    ]));
    let agent = agent(provider.clone(), AgentConfig::default());

    let result = agent.ask("Why do leaves change color?").await.unwrap();

    let citations = &result.response.citations;
    assert_eq!(citations.len(), 2);
    assert_eq!(citations[0].location, "leaf.txt");
    assert_eq!(citations[0].text, "Chlorophyll breaks down in autumn.");
    assert_eq!(citations[1].location, "atp.md");
    assert_eq!(result.tool_calls.len(), 3);
}

#[tokio::test]
async fn test_citations_capped() {
    let provider = Arc::new(MockLlmProvider::new());
    let output = "docs/a.txt:1:one\n--\ndocs/b.txt:1:two\n--\ndocs/c.txt:1:three";
    provider.queue_response(MockLlmProvider::tool_call_response(
        "rg_search",
        json!({ "pattern": output }),
    ));
    let config = AgentConfig {
        max_citations: 2,
        ..AgentConfig::default()
    };
    let agent = agent(provider, config);

    let result = agent.ask("cap").await.unwrap();

    let locations: Vec<&str> = result
        .response
        .citations
        .iter()
        .map(|c| c.location.as_str())
        .collect();
    assert_eq!(locations, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_no_matches_output_yields_no_citations() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response(
        "rg_search",
        json!({ "pattern": NO_MATCHES }),
    ));
    let agent = agent(provider.clone(), AgentConfig::default());

    let result = agent.ask("nothing").await.unwrap();

    assert!(result.response.citations.is_empty());
    let results = tool_results(&provider);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, NO_MATCHES);
}

#[tokio::test]
async fn test_tool_failure_becomes_error_text() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response("broken", json!({})));
    let agent = agent(provider.clone(), AgentConfig::default());

    let result = agent.ask("fail please").await.unwrap();

    let results = tool_results(&provider);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, "Error: Tool 'broken' execution failed: boom");
    assert!(results[0].2);
    assert_eq!(result.response.answer, "mock answer");
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response("teleport", json!({})));
    let agent = agent(provider.clone(), AgentConfig::default());

    let result = agent.ask("?").await.unwrap();

    assert_eq!(tool_results(&provider)[0].1, "Unknown tool: teleport");
    assert_eq!(result.tool_calls[0].name, "teleport");
}

#[tokio::test]
async fn test_tool_call_log_in_order() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response(
        "rg_search",
        json!({"pattern": "first"}),
    ));
    provider.queue_response(MockLlmProvider::tool_call_response(
        "rg_search",
        json!({"pattern": "second"}),
    ));
    let agent = agent(provider, AgentConfig::default());

    let result = agent.ask("log").await.unwrap();

    let patterns: Vec<&str> = result
        .tool_calls
        .iter()
        .map(|call| call.arguments["pattern"].as_str().unwrap())
        .collect();
    assert_eq!(patterns, vec!["first", "second"]);
}

#[tokio::test]
async fn test_model_error_propagates() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_error(LlmError::Timeout { timeout_secs: 5 });
    let agent = agent(provider, AgentConfig::default());

    let err = agent.ask("slow model").await.unwrap_err();
    assert!(matches!(
        err,
        GrepragError::Llm(LlmError::Timeout { timeout_secs: 5 })
    ));
}

#[tokio::test]
async fn test_malformed_final_answer_is_structured_output_error() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_structured(json!({"question": "q"}));
    let agent = agent(provider, AgentConfig::default());

    let err = agent.ask("q").await.unwrap_err();
    assert!(matches!(
        err,
        GrepragError::Llm(LlmError::StructuredOutput { .. })
    ));
}

#[tokio::test]
async fn test_final_answer_failure_propagates_after_search() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_response(MockLlmProvider::tool_call_response(
        "rg_search",
        json!({"pattern": "a.md:1:alpha"}),
    ));
    provider.queue_structured_error(LlmError::RateLimited {
        retry_after_secs: 7,
    });
    let agent = agent(provider.clone(), AgentConfig::default());

    let err = agent.ask("alpha").await.unwrap_err();
    assert!(matches!(
        err,
        GrepragError::Llm(LlmError::RateLimited {
            retry_after_secs: 7
        })
    ));
    // Tool turn, closing turn, then the final structured call.
    assert_eq!(provider.requests().len(), 3);
}
