//! Vector index implementations that need no native dependencies.
//!
//! The persistent SQLite index lives in the app crate; the in-memory index
//! here backs tests and embedded (WASM) use.

pub mod memory;

pub use memory::InMemoryIndex;
