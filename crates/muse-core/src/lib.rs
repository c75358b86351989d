pub mod config;
pub mod history;
pub mod id;
pub mod layout;
pub mod model;
pub mod persona;
pub mod viewport;

pub use config::{AppSettings, CanvasConfig};
pub use history::VersionInfo;
pub use id::ItemId;
pub use layout::{CanvasSize, ItemMetrics, Placement};
pub use model::*;
pub use persona::{Persona, PersonaBook, PersonaError};
pub use viewport::{ViewTransform, WheelInput};
