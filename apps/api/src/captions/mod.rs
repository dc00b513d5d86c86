// Caption generation: prompt building, completion parsing, and the upload handler.
// All model calls go through llm_client.

pub mod handlers;
pub mod language;
pub mod models;
pub mod parser;
pub mod prompts;
