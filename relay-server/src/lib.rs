//! HTTP relay that flattens chat conversations into a single prompt and
//! forwards it to an OpenAI-compatible completion endpoint, streaming the
//! reply back as Server-Sent Events or returning it whole.

pub mod config;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod streaming;

pub use config::RelayConfig;
pub use error::RelayError;
pub use llm::{CompletionBackend, Fragment, FragmentStream, LlmService};
pub use prompt::format_prompt;
pub use server::{create_router, run_server, AppState};
