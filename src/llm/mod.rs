pub mod client;
pub mod message;
pub mod prompts;

pub use client::{ByteStream, GenerationClient, Generator};
pub use message::{Attachment, ChatMessage, GenerateRequest, Sender};
