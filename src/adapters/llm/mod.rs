//! Language model adapters.

mod llm_summarizer;
mod mock_llm;
mod openai_adapter;

pub use llm_summarizer::LlmSummarizer;
pub use mock_llm::{MockCall, MockError, MockLlmAdapter, MockReply};
pub use openai_adapter::{OpenAiAdapter, OpenAiConfig};
