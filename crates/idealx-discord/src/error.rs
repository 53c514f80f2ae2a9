use idealx_agent::ProviderError;

/// Errors produced by the Discord adapter and the event engine.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured")]
    NoToken,

    #[error("webhook request not authorized: {0}")]
    Unauthorized(String),

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("gateway session ended unexpectedly: {0}")]
    Session(String),
}
