//! Bounded tool-use conversation with the LLM.
//!
//! The exchange moves through three states: waiting for the model, waiting
//! for tool results, and done. Each model call with tools enabled counts as a
//! turn. When the model asks for tools on the last allowed turn, every
//! pending call is answered with the exhaustion notice and one final call is
//! made with tools disabled, so the conversation always ends.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ResearchError;
use crate::llm::{ContentBlock, LlmClient, Message, MessageRequest, Role, ToolChoice};

/// Executes tool calls requested by the model.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Result text for one call. Failures are reported in the text.
    async fn handle(&self, name: &str, input: &Value) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLimits {
    /// Model calls allowed with tools enabled.
    pub max_turns: usize,
    /// Tool result sent for calls left pending once turns run out.
    pub exhausted_notice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOutcome {
    pub text: String,
    /// Total model calls, including a forced final call.
    pub turns: usize,
    pub forced_final: bool,
    /// Tool calls passed to the handler.
    pub tool_calls: usize,
}

#[derive(Debug)]
struct ToolCall {
    id: String,
    name: String,
    input: Value,
}

#[derive(Debug)]
enum State {
    AwaitingModel { tools_enabled: bool },
    AwaitingToolResult { calls: Vec<ToolCall>, exhausted: bool },
    Done(String),
}

/// Run `request` to completion, answering tool calls through `handler`.
///
/// `request.messages` holds the opening messages; the tools in
/// `request.tools` stay declared for every call.
///
/// # Errors
///
/// Returns the first error from the LLM client. No partial text is returned.
pub async fn run_conversation(
    llm: &LlmClient,
    mut request: MessageRequest,
    limits: &ConversationLimits,
    handler: &dyn ToolHandler,
) -> Result<ConversationOutcome, ResearchError> {
    let mut turns = 0;
    let mut tool_calls = 0;
    let mut forced_final = false;
    let mut state = State::AwaitingModel {
        tools_enabled: limits.max_turns > 0,
    };

    loop {
        state = match state {
            State::AwaitingModel { tools_enabled } => {
                request.tool_choice = if request.tools.is_empty() {
                    None
                } else if tools_enabled {
                    Some(ToolChoice::Auto)
                } else {
                    Some(ToolChoice::None)
                };
                let response = llm.send(&request).await?;
                turns += 1;

                let calls: Vec<ToolCall> = response
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        }),
                        _ => None,
                    })
                    .collect();

                if tools_enabled && response.wants_tools() && !calls.is_empty() {
                    request.messages.push(Message {
                        role: Role::Assistant,
                        content: response
                            .content
                            .into_iter()
                            .filter(|block| !matches!(block, ContentBlock::Other))
                            .collect(),
                    });
                    State::AwaitingToolResult {
                        calls,
                        exhausted: turns >= limits.max_turns,
                    }
                } else {
                    State::Done(response.text())
                }
            }
            State::AwaitingToolResult { calls, exhausted } => {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    let content = if exhausted {
                        limits.exhausted_notice.clone()
                    } else {
                        tool_calls += 1;
                        tracing::debug!(tool = %call.name, "handling tool call");
                        handler.handle(&call.name, &call.input).await
                    };
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: call.id,
                        content,
                    });
                }
                request.messages.push(Message {
                    role: Role::User,
                    content: results,
                });
                if exhausted {
                    forced_final = true;
                }
                State::AwaitingModel {
                    tools_enabled: !exhausted,
                }
            }
            State::Done(text) => {
                return Ok(ConversationOutcome {
                    text,
                    turns,
                    forced_final,
                    tool_calls,
                });
            }
        };
    }
}
