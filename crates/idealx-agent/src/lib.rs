pub mod anthropic;
pub mod anthropic_stream;
pub mod prompt;
pub mod provider;
pub mod responder;
pub mod stream;

pub use anthropic::AnthropicProvider;
pub use provider::{LlmProvider, ProviderError};
pub use responder::{ForumContext, ModelResponder, UrlContent};
pub use stream::StreamEvent;
