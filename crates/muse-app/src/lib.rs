//! Muse Canvas application layer.
//!
//! Ties the interaction engine, caption generation and persistence into one
//! [`Session`] a UI host can drive.

pub mod banner;
pub mod import;
pub mod session;

pub use banner::Banner;
pub use import::{ImportError, ImportFile, prepare_image};
pub use session::{BackendConnector, EnvLookup, GeminiConnector, Session, SessionEvent};
