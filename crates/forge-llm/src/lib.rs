//! AI text generation: the capability trait, the Gemini backend, and the
//! command-synthesis adapter that turns free-text model replies into
//! structured command drafts.

pub mod codegen;
pub mod gemini;
pub mod generate;
pub mod mock;

pub use codegen::{CodeGenerator, CommandDraft, ParseError};
pub use gemini::{GeminiClient, GeminiConfig};
pub use generate::{GenerationError, GenerationRequest, TextGenerator};
pub use mock::MockGenerator;
