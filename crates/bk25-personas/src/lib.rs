pub mod registry;
pub mod types;

pub use registry::{PersonaRegistry, PromptTurn};
pub use types::{Persona, PersonaError, Personality};
