//! End-to-end tests for message processing.
//!
//! These tests drive `Orchestrator::process_message` with a mock LLM and the
//! in-memory session store:
//! 1. Single-capability plans reach the handler and the synthesized answer
//! 2. Capability failures never leak to the user
//! 3. Context compression bounds session memory
//! 4. Planner timeouts fall back to the general capability
//! 5. Store and adapter failures still produce a response

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{registry, user, Counters, FailingSessionStore, SlowPlanner};
use maestro::adapters::llm::{MockError, MockLlmAdapter};
use maestro::adapters::InMemorySessionStore;
use maestro::application::orchestration::APOLOGY_RESPONSE;
use maestro::application::{Orchestrator, SessionManager};
use maestro::config::AppConfig;
use maestro::domain::flow::{FlowStatus, StageStatus};
use maestro::domain::session::{
    compress_context, ContextMessage, ContextRole, ConversationContext, HeuristicSummarizer,
};
use maestro::ports::SessionStore;

fn orchestrator(
    counters: &Counters,
    llm: MockLlmAdapter,
    store: InMemorySessionStore,
) -> Orchestrator {
    Orchestrator::new(registry(counters), Arc::new(llm), Arc::new(store))
}

// =============================================================================
// Scenario A: single decision
// =============================================================================

#[tokio::test]
async fn price_question_runs_market_price_once() {
    let counters = Counters::default();
    let llm = MockLlmAdapter::new()
        .with_json(json!({
            "decisions": [{
                "agent": "market",
                "capability": "market_price",
                "parameters": {"ticker": "KAS"},
                "priority": 1
            }],
            "reasoning": "user asked for a price"
        }))
        .with_json(json!({
            "response": "KAS is trading at $0.12 right now.",
            "reasoning": "market_price result"
        }));
    let store = InMemorySessionStore::new();
    let o = orchestrator(&counters, llm.clone(), store.clone());

    let result = o
        .process_message("alice", "What is the price of KAS?", None)
        .await;

    assert!(result.response.contains("KAS"));
    assert_eq!(Counters::get(&counters.market_price), 1);
    assert_eq!(result.actions.len(), 1);
    assert_eq!(result.actions[0].agent, "market");
    assert_eq!(result.actions[0].action, "market_price");
    assert_eq!(result.actions[0].parameters["ticker"], "KAS");
    assert!(result.actions[0].success);

    // the synthesis prompt carries the handler output
    let synthesis_prompt = &llm.get_calls()[1].conversation[1].content;
    assert!(synthesis_prompt.contains(r#""ticker":"KAS""#));

    let session = store.get(&user("alice")).await.unwrap().unwrap();
    let flow = &session.flows()[0];
    assert_eq!(flow.overall_status(), FlowStatus::Completed);
    assert!(!flow.decision_stage().fallback_used);
    assert_eq!(flow.decision_stage().decisions[0].capability, "market_price");
}

// =============================================================================
// Scenario B: failing capability
// =============================================================================

#[tokio::test]
async fn capability_failure_is_hidden_from_user() {
    let counters = Counters::default();
    let llm = MockLlmAdapter::new()
        .with_json(json!({
            "decisions": [
                {"capability": "market_price", "parameters": {"ticker": "KAS"}},
                {"capability": "get_balance", "parameters": {}}
            ],
            "reasoning": "price and balance"
        }))
        .with_json(json!({
            "response": "KAS is at $0.12. Your balance failed: rate limited. Error 429 from upstream.",
            "reasoning": ""
        }));
    let store = InMemorySessionStore::new();
    let o = orchestrator(&counters, llm, store.clone());

    let result = o
        .process_message("alice", "price of KAS and my balance", None)
        .await;

    assert!(!result.response.contains("rate limited"));
    assert!(!result.response.contains("Error"));
    assert!(result.response.contains("KAS"));

    let balance = &result.actions[1];
    assert_eq!(balance.action, "get_balance");
    assert!(!balance.success);
    assert_eq!(balance.error.as_deref(), Some("rate limited"));

    let session = store.get(&user("alice")).await.unwrap().unwrap();
    let responses = &session.flows()[0].execution_stage().responses;
    assert!(responses[0].success);
    assert_eq!(responses[1].error.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn all_failures_mark_execution_failed_but_still_answer() {
    let counters = Counters::default();
    let llm = MockLlmAdapter::new()
        .with_json(json!({
            "decisions": [{"capability": "get_balance", "parameters": {}}],
            "reasoning": "balance"
        }))
        .with_json(json!({"response": "I couldn't reach your wallet just now.", "reasoning": ""}));
    let store = InMemorySessionStore::new();
    let o = orchestrator(&counters, llm, store.clone());

    let result = o.process_message("alice", "my balance?", None).await;

    assert_eq!(result.response, "I couldn't reach your wallet just now.");
    let session = store.get(&user("alice")).await.unwrap().unwrap();
    let flow = &session.flows()[0];
    assert_eq!(flow.execution_stage().status, StageStatus::Failed);
    assert_eq!(flow.overall_status(), FlowStatus::Failed);
}

// =============================================================================
// Scenario C: compression
// =============================================================================

#[tokio::test]
async fn sixty_messages_compress_to_sixteen() {
    let mut context = ConversationContext::new();
    for i in 0..60 {
        let role = if i % 2 == 0 {
            ContextRole::User
        } else {
            ContextRole::Agent
        };
        context.push(ContextMessage::new(role, format!("message {}", i)));
    }

    let compressed = compress_context(&mut context, 50, &HeuristicSummarizer::default()).await;

    assert!(compressed);
    assert_eq!(context.len(), 16);
    assert_eq!(context.messages()[0].role(), ContextRole::System);
    assert_eq!(context.messages()[15].content(), "message 59");

    // already below the threshold
    let again = compress_context(&mut context, 50, &HeuristicSummarizer::default()).await;
    assert!(!again);
    assert_eq!(context.len(), 16);
}

#[tokio::test]
async fn long_conversations_stay_bounded_in_session() {
    let counters = Counters::default();
    let store = InMemorySessionStore::new();
    let mut config = AppConfig::default();
    config.session.max_history_length = 10;
    let sessions = Arc::new(SessionManager::from_config(
        &config.session,
        Arc::new(store.clone()),
    ));
    let llm = MockLlmAdapter::new();
    let o = Orchestrator::from_config(&config, registry(&counters), Arc::new(llm), sessions, None);

    for i in 0..12 {
        o.process_message("alice", &format!("question {}", i), None)
            .await;
    }

    let session = store.get(&user("alice")).await.unwrap().unwrap();
    assert!(session.context().len() <= 10);
    assert_eq!(session.message_count(), 12);
    assert_eq!(session.last_message(), Some("question 11"));
}

// =============================================================================
// Scenario E: planner timeout
// =============================================================================

#[tokio::test]
async fn planner_timeout_falls_back_to_general_query() {
    let counters = Counters::default();
    // the stalled planner call never reaches the queue
    let inner = MockLlmAdapter::new()
        .with_json(json!({"response": "Here is what I know about that.", "reasoning": ""}));
    let llm = SlowPlanner {
        inner,
        delay: Duration::from_secs(3),
    };
    let store = InMemorySessionStore::new();
    let mut config = AppConfig::default();
    config.llm.timeout_secs = 1;
    let sessions = Arc::new(SessionManager::from_config(
        &config.session,
        Arc::new(store.clone()),
    ));
    let o = Orchestrator::from_config(&config, registry(&counters), Arc::new(llm), sessions, None);

    let result = o.process_message("alice", "tell me something", None).await;

    assert_eq!(Counters::get(&counters.general_query), 1);
    assert_eq!(result.actions[0].action, "general_query");
    assert_eq!(result.actions[0].parameters["query"], "tell me something");

    let session = store.get(&user("alice")).await.unwrap().unwrap();
    let flow = &session.flows()[0];
    assert_eq!(flow.overall_status(), FlowStatus::Completed);
    assert!(flow.decision_stage().fallback_used);
    assert!(flow.decision_stage().reasoning.starts_with("fallback: "));
}

#[tokio::test]
async fn invalid_plan_falls_back() {
    let counters = Counters::default();
    let llm = MockLlmAdapter::new()
        .with_json(json!({
            "decisions": [
                {"capability": "launch_rockets", "parameters": {}},
                {"capability": "market_price", "parameters": {"ticker": 7}}
            ],
            "reasoning": "bad plan"
        }))
        .with_json(json!({"response": "Let me help with that.", "reasoning": ""}));
    let o = orchestrator(&counters, llm, InMemorySessionStore::new());

    let result = o.process_message("alice", "do things", None).await;

    assert_eq!(Counters::get(&counters.market_price), 0);
    assert_eq!(Counters::get(&counters.general_query), 1);
    assert_eq!(result.actions.len(), 1);
    assert_eq!(result.actions[0].action, "general_query");
}

// =============================================================================
// Never fails
// =============================================================================

#[tokio::test]
async fn every_failure_still_produces_a_response() {
    let counters = Counters::default();
    let llm = MockLlmAdapter::new()
        .with_error(MockError::Unavailable {
            message: "planner down".into(),
        })
        .with_error(MockError::Network {
            message: "synthesis down".into(),
        });
    let o = Orchestrator::new(
        registry(&counters),
        Arc::new(llm),
        Arc::new(FailingSessionStore),
    );

    let result = o.process_message("alice", "anything", None).await;

    assert_eq!(result.response, APOLOGY_RESPONSE);
    assert_eq!(result.actions.len(), 1);
    assert_eq!(result.actions[0].action, "general_query");
    assert_eq!(o.health().await.active_sessions, 0);
}

#[tokio::test]
async fn concurrent_messages_from_one_user_are_all_recorded() {
    let counters = Counters::default();
    let store = InMemorySessionStore::new();
    let o = Arc::new(orchestrator(
        &counters,
        MockLlmAdapter::new().with_delay(Duration::from_millis(5)),
        store.clone(),
    ));

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let o = o.clone();
            tokio::spawn(async move { o.process_message("alice", &format!("q{}", i), None).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let session = store.get(&user("alice")).await.unwrap().unwrap();
    assert_eq!(session.message_count(), 5);
    assert_eq!(session.flows().len(), 5);
}

#[tokio::test]
async fn previous_flows_reach_the_planner() {
    let counters = Counters::default();
    let llm = MockLlmAdapter::new();
    let o = orchestrator(&counters, llm.clone(), InMemorySessionStore::new());

    o.process_message("alice", "first question", None).await;
    llm.clear_calls();
    o.process_message("alice", "second question", None).await;

    let planner_prompt = &llm.get_calls()[0].conversation[0].content;
    assert!(planner_prompt.contains("first question"));
    assert!(planner_prompt.contains("market_price"));
}
