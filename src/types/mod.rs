//! Type definitions for generation turns.

pub mod image;
pub mod message;
pub mod turn;

pub use image::{GeneratedImage, ImageFormat};
pub use message::{Message, Role, Snapshot};
pub use turn::{ChatTurnRequest, ImageTurnRequest, TurnEnd, TurnInput, TurnOutcome};
