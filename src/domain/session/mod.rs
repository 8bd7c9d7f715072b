//! Session module - per-user conversational memory.
//!
//! Sessions are created lazily on a user's first message, mutated on every
//! message and evicted after a period of inactivity. Their context is kept
//! bounded by [`compress_context`].

mod compression;
mod context;
#[allow(clippy::module_inception)]
mod session;

pub use compression::{
    compress_context, compress_context_with, keep_recent, needs_compression, CompressionError,
    ContextSummarizer, HeuristicSummarizer, SUMMARY_PREFIX,
};
pub use context::{ContextMessage, ContextRole, ConversationContext};
pub use session::Session;
