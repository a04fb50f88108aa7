//! findex - a multi-threaded full-text search engine.
//!
//! The binary wires [`engine::SearchEngine`] to stdin/stdout; the library
//! surface exists so integration tests can drive the engine against
//! in-memory buffers.

pub mod engine;
pub mod log;

pub use engine::{EngineError, EngineOptions, SearchEngine};
