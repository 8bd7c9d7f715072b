//! Synthesis stage - writes the user-facing answer from capability results.
//!
//! Failed results reach the model only as `ERROR:` markers, and whatever
//! the model writes is sanitized so raw failure messages never leak to the
//! user. If the model call itself fails a fixed apology is returned.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::domain::flow::AgentResponse;
use crate::ports::{generate_typed, ChatMessage, GenerationOptions, LlmAdapter};

use super::prompts::{synthesis_schema, synthesis_system_prompt, synthesis_user_prompt};

/// Returned when the synthesis call fails.
pub const APOLOGY_RESPONSE: &str =
    "I'm sorry, I couldn't put together an answer right now. Please try again in a moment.";

/// Used when sanitizing leaves nothing to say.
pub const GRACEFUL_FALLBACK: &str =
    "I wasn't able to complete that request right now. Please try again shortly.";

static LEAKY_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(errors?|exceptions?|stack ?traces?|tracebacks?|panicked)\b")
        .expect("leaky terms pattern")
});

/// Shortest failure message treated as leak-worthy text.
const MIN_FAILURE_MESSAGE_LEN: usize = 4;

#[derive(Debug, Deserialize)]
struct SynthesisReply {
    response: String,
    #[serde(default)]
    reasoning: String,
}

/// Final text plus audit details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub response: String,
    pub reasoning: String,
    /// Set when the model call failed and the apology was used.
    pub error: Option<String>,
}

impl SynthesisOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub struct SynthesisStage {
    llm: Arc<dyn LlmAdapter>,
    options: GenerationOptions,
    timeout: Duration,
}

impl SynthesisStage {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self {
            llm,
            options: GenerationOptions::new().with_temperature(0.7).with_max_tokens(1000),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Produces the user-facing answer. Never fails.
    pub async fn synthesize(&self, text: &str, responses: &[AgentResponse]) -> SynthesisOutcome {
        let conversation = vec![
            ChatMessage::system(synthesis_system_prompt()),
            ChatMessage::user(synthesis_user_prompt(text, responses)),
        ];
        let schema = synthesis_schema();

        let reply = tokio::time::timeout(
            self.timeout,
            generate_typed::<SynthesisReply>(
                self.llm.as_ref(),
                &conversation,
                &schema,
                &self.options,
            ),
        )
        .await;

        let failure = match reply {
            Ok(Ok(reply)) => {
                return SynthesisOutcome {
                    response: sanitize_response(&reply.response, responses),
                    reasoning: reply.reasoning,
                    error: None,
                };
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("synthesis timed out after {}ms", self.timeout.as_millis()),
        };

        warn!(error = %failure, "Synthesis failed, returning apology");
        SynthesisOutcome {
            response: APOLOGY_RESPONSE.to_string(),
            reasoning: String::new(),
            error: Some(failure),
        }
    }
}

/// Removes sentences that mention failures or quote raw failure messages.
///
/// Falls back to [`GRACEFUL_FALLBACK`] if nothing is left.
pub fn sanitize_response(text: &str, responses: &[AgentResponse]) -> String {
    let failure_messages: Vec<String> = responses
        .iter()
        .filter(|r| !r.success)
        .filter_map(|r| r.error.as_deref())
        .map(|m| m.trim().to_lowercase())
        .filter(|m| m.len() >= MIN_FAILURE_MESSAGE_LEN)
        .collect();

    let kept: String = split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            !LEAKY_TERMS.is_match(sentence)
                && !failure_messages.iter().any(|m| lower.contains(m.as_str()))
        })
        .collect();

    let kept = kept.trim();
    if kept.is_empty() {
        GRACEFUL_FALLBACK.to_string()
    } else {
        kept.to_string()
    }
}

/// Splits text after sentence terminators and newlines, keeping the
/// delimiters and trailing whitespace with each piece.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if !boundary {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        parts.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::{MockError, MockLlmAdapter};
    use proptest::prelude::*;
    use serde_json::json;

    fn responses() -> Vec<AgentResponse> {
        vec![
            AgentResponse::succeeded("market", "market_price", json!({"ticker": "KAS", "price": 0.12}), 5),
            AgentResponse::failed("portfolio", "get_balance", "rate limited", 2),
        ]
    }

    #[tokio::test]
    async fn returns_model_response() {
        let mock = MockLlmAdapter::new().with_json(json!({
            "response": "KAS trades at $0.12.",
            "reasoning": "used market_price"
        }));
        let stage = SynthesisStage::new(Arc::new(mock.clone()));

        let outcome = stage.synthesize("price of KAS?", &responses()).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.response, "KAS trades at $0.12.");
        assert_eq!(outcome.reasoning, "used market_price");

        let prompt = &mock.get_calls()[0].conversation[1].content;
        assert!(prompt.contains("ERROR: rate limited"));
        assert!(prompt.contains(r#""price":0.12"#));
    }

    #[tokio::test]
    async fn leaked_failure_text_is_removed() {
        let mock = MockLlmAdapter::new().with_json(json!({
            "response": "KAS trades at $0.12. Your balance lookup failed: rate limited. Error code 429!",
            "reasoning": ""
        }));
        let stage = SynthesisStage::new(Arc::new(mock));

        let outcome = stage.synthesize("price and balance", &responses()).await;

        assert_eq!(outcome.response, "KAS trades at $0.12.");
    }

    #[tokio::test]
    async fn adapter_failure_returns_apology() {
        let mock = MockLlmAdapter::new().with_error(MockError::Unavailable {
            message: "overloaded".into(),
        });
        let stage = SynthesisStage::new(Arc::new(mock));

        let outcome = stage.synthesize("hi", &responses()).await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.response, APOLOGY_RESPONSE);
        assert!(outcome.error.unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn timeout_returns_apology() {
        let mock = MockLlmAdapter::new()
            .with_json(json!({"response": "late"}))
            .with_delay(Duration::from_millis(200));
        let stage = SynthesisStage::new(Arc::new(mock)).with_timeout(Duration::from_millis(20));

        let outcome = stage.synthesize("hi", &[]).await;

        assert_eq!(outcome.response, APOLOGY_RESPONSE);
    }

    #[test]
    fn fully_leaky_text_becomes_graceful_fallback() {
        let text = "Error: rate limited";
        assert_eq!(sanitize_response(text, &responses()), GRACEFUL_FALLBACK);
    }

    #[test]
    fn sanitizer_keeps_line_structure() {
        let text = "Prices:\n- KAS: $0.12\n- ETH: unavailable due to an error\n";
        assert_eq!(sanitize_response(text, &[]), "Prices:\n- KAS: $0.12");
    }

    #[test]
    fn failure_words_match_whole_words_only() {
        let text = "Terrorism financing fell this year. Mirror sites are up.";
        assert_eq!(sanitize_response(text, &[]), text);

        let text = "Prices are up. Errors occurred upstream.";
        assert_eq!(sanitize_response(text, &[]), "Prices are up.");
    }

    #[test]
    fn decimals_do_not_split_sentences() {
        assert_eq!(split_sentences("It is 0.12 today. Ok"), vec!["It is 0.12 today. ", "Ok"]);
    }

    #[test]
    fn fixed_texts_are_clean() {
        assert_eq!(sanitize_response(APOLOGY_RESPONSE, &[]), APOLOGY_RESPONSE);
        assert_eq!(sanitize_response(GRACEFUL_FALLBACK, &[]), GRACEFUL_FALLBACK);
    }

    proptest! {
        #[test]
        fn sanitized_output_never_mentions_error(text in "[a-zA-Z .!?\n]{0,80}") {
            let out = sanitize_response(&text, &[]);
            prop_assert!(!LEAKY_TERMS.is_match(&out));
            prop_assert!(!out.is_empty());
        }
    }
}
