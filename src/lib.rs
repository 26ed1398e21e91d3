//! # code-search
//!
//! Contextual code search over a corpus of source files: snippet extraction,
//! query understanding, embedding retrieval and multi-factor ranking.
//!
//! ## Architecture
//!
//! ```text
//!   source files ──► Snippet Extractor ──► corpus generation ◄── Embedding Index
//!                    (tree-sitter,          (copy-and-swap)       (vectors by id)
//!                     regex, lines)                │
//!                                                  ▼
//!   raw query ──► Query Processor ──► lexical + semantic retrieval
//!                 (keywords, intent,               │
//!                  expansion, topics)              ▼
//!                                          Ranking Engine
//!                                   (six sub-scores, boosts, caps)
//!                                                  │
//!                                                  ▼
//!                                       paginated SearchResponse
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment / TOML configuration with load-time validation
//! - [`error`] - Caller errors and fatal configuration errors
//! - [`models`] - Snippets, requests, results
//! - [`chunking`] - Snippet Extractor: structural, pattern and line-group strategies
//! - [`embedding`] - `Embedder` trait, hashing and hybrid strategies, startup registry
//! - [`llm`] - Remote embedding API client and zero-shot intent classifier
//! - [`query`] - Query Processor
//! - [`rank`] - Ranking Engine
//! - [`search`] - Vector store, embedding index, lexical scoring and the orchestrating [`search::Engine`]
//! - [`sources`] - Directory walking for index builds
//! - [`state`] - Published corpus generations

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod models;
pub mod query;
pub mod rank;
pub mod search;
pub mod sources;
pub mod state;
