pub mod core;
pub mod extract;
pub mod types;

pub use crate::core::Bk25Core;
pub use extract::{extract_first_code_block, ExtractedCode};
pub use types::{ChatOutcome, ChatRequest, ChannelView, SystemStatus};
