pub mod orchestrator;
pub mod parser;

pub use orchestrator::{parse_full_response, Phase, StreamEvent, StreamOrchestrator, StreamOutcome};
pub use parser::{ChunkParser, FeedOutcome};
