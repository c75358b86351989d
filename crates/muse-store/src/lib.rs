//! Persistence for Muse Canvas.
//!
//! Personas and canvas items live in a replace-all collections database;
//! settings live in a separate JSON file. Saves are debounced and written
//! off the async threads.

pub mod database;
pub mod debounce;
pub mod error;
pub mod rehydrate;
pub mod settings;

pub use database::{Database, MemoryStorage, Storage, StoredState, acquire, dispose};
pub use debounce::{Debouncer, SAVE_DEBOUNCE, SaveRequest};
pub use error::{Result, StoreError};
pub use rehydrate::rehydrate;
pub use settings::SettingsStore;
