//! 核心层：错误类型、会话生命周期、循环阶段

pub mod error;
pub mod session;
pub mod state;

pub use error::{ContextError, ProviderError, ResearchError};
pub use session::Session;
pub use state::LoopPhase;
