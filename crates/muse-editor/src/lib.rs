pub mod controller;
pub mod gesture;
pub mod hit;
pub mod input;
pub mod selection;
pub mod shortcuts;
pub mod store;

pub use controller::CanvasController;
pub use gesture::{CanvasMutation, GestureDisambiguator, GestureState};
pub use input::{InputEvent, Modifiers, PointerButton};
pub use selection::Selection;
pub use store::CanvasStore;
