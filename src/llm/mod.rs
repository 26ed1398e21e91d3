//! Remote model collaborators reached over HTTP (Ollama or OpenAI-compatible).

pub mod embeddings;
pub mod intent;
