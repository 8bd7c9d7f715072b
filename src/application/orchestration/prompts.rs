//! Prompt builders for the planning and synthesis calls.

use serde_json::{json, Value};

use crate::domain::capability::AgentCapabilities;
use crate::domain::flow::{AgentResponse, OrchestrationFlow};
use crate::domain::session::{ContextMessage, ContextRole};

/// Context messages shown to the planner.
pub const PLANNER_CONTEXT_MESSAGES: usize = 6;

const PLANNER_ROLE: &str = "You are the planning component of a multi-agent assistant. \
Choose which capabilities to invoke to answer the user's latest message. \
Only use capabilities from the catalog below, with parameters matching their declared types. \
Use several decisions when independent lookups are needed. \
When one capability needs the output of another, return a `workflow` whose steps reference \
earlier results with ${step_id} or ${step_id.field} placeholders instead of decisions. \
If nothing in the catalog fits, return an empty decision list.";

const SYNTHESIS_ROLE: &str = "You are the voice of a multi-agent assistant. \
Write the final answer to the user from the capability results below. \
Results marked ERROR: failed; do not quote them, do not mention errors or internal details, \
and briefly say that part of the request could not be completed right now. \
Be concise and answer in the user's language.";

/// JSON schema the planner must follow.
pub fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "decisions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "agent": {"type": "string"},
                        "capability": {"type": "string"},
                        "parameters": {"type": "object"},
                        "priority": {"type": "integer"}
                    },
                    "required": ["capability", "parameters"]
                }
            },
            "reasoning": {"type": "string"},
            "workflow": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "steps": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "capability": {"type": "string"},
                                "parameters": {"type": "object"},
                                "dependencies": {"type": "array", "items": {"type": "string"}}
                            },
                            "required": ["id", "capability"]
                        }
                    }
                },
                "required": ["steps"]
            }
        },
        "required": ["decisions", "reasoning"]
    })
}

/// JSON schema for the synthesis reply.
pub fn synthesis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "response": {"type": "string"},
            "reasoning": {"type": "string"}
        },
        "required": ["response"]
    })
}

/// Renders the public catalog, grouped by agent.
pub fn render_catalog(catalog: &[AgentCapabilities]) -> String {
    let mut out = String::new();
    for agent in catalog {
        out.push_str(&format!("## Agent `{}`: {}\n", agent.agent, agent.description));
        for cap in &agent.capabilities {
            out.push_str(&format!("- `{}`: {}\n", cap.name, cap.description));
            for p in &cap.parameters {
                out.push_str(&format!(
                    "    - {} ({}{}): {}\n",
                    p.name,
                    p.param_type,
                    if p.required { ", required" } else { "" },
                    p.description
                ));
            }
            for example in &cap.examples {
                out.push_str(&format!("    e.g. \"{}\"\n", example));
            }
        }
    }
    out
}

fn render_flows(flows: &[OrchestrationFlow]) -> String {
    flows
        .iter()
        .map(|f| format!("- {}", f.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_messages(messages: &[ContextMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let who = match m.role() {
                ContextRole::User => "user",
                ContextRole::Agent => "assistant",
                ContextRole::System => "system",
            };
            format!("{}: {}", who, m.content())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for the planning call.
pub fn decision_system_prompt(
    catalog: &[AgentCapabilities],
    recent_flows: &[OrchestrationFlow],
    recent_messages: &[ContextMessage],
) -> String {
    let mut prompt = format!("{}\n\n# Capability catalog\n{}", PLANNER_ROLE, render_catalog(catalog));
    if !recent_flows.is_empty() {
        prompt.push_str("\n# Previous flows\n");
        prompt.push_str(&render_flows(recent_flows));
        prompt.push('\n');
    }
    if !recent_messages.is_empty() {
        prompt.push_str("\n# Recent conversation\n");
        prompt.push_str(&render_messages(recent_messages));
        prompt.push('\n');
    }
    prompt
}

/// Renders one response line for synthesis: JSON for successes, an `ERROR:` marker otherwise.
pub fn render_response(response: &AgentResponse) -> String {
    if response.success {
        let body = response.response.clone().unwrap_or(Value::Null);
        format!("[{}/{}] {}", response.agent, response.capability, body)
    } else {
        format!(
            "[{}/{}] ERROR: {}",
            response.agent,
            response.capability,
            response.error.as_deref().unwrap_or("unknown failure")
        )
    }
}

/// System prompt for the synthesis call.
pub fn synthesis_system_prompt() -> &'static str {
    SYNTHESIS_ROLE
}

/// User turn for the synthesis call.
pub fn synthesis_user_prompt(original_input: &str, responses: &[AgentResponse]) -> String {
    let results = if responses.is_empty() {
        "(no capabilities were run)".to_string()
    } else {
        responses
            .iter()
            .map(render_response)
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "User message:\n{}\n\nCapability results:\n{}",
        original_input, results
    )
}
