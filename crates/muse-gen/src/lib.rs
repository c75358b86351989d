//! Caption generation for Muse Canvas.
//!
//! Builds prompts, calls the captioning backend with retry and model
//! fallback, repairs near-miss JSON, and runs cancellable batches.

pub mod backend;
pub mod cancel;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod prompt;
pub mod repair;
pub mod retry;

pub use backend::{CaptionBackend, ContentRequest, Credentials, GeminiBackend};
pub use cancel::{CancellationSource, CancellationToken};
pub use error::{GenerationError, Result};
pub use generator::{CaptionGenerator, CaptionJob};
pub use orchestrator::{BatchHandle, BatchOutcome, BatchReport, BatchState, Orchestrator};
pub use repair::{ParsedCaptions, parse_captions, repair_json};
pub use retry::RetryPolicy;
