pub mod config;
pub mod error;
pub mod state;
pub mod types;

pub use config::IdealxConfig;
pub use error::{IdealxError, Result};
pub use state::MemoryState;
pub use types::{Author, ConversationTurn, RawMessage, Role, TargetScope, ThreadIdentity};
