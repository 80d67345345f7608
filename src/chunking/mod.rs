//! Document chunking system
//!
//! Features:
//! - Separator-priority text splitting
//! - Two-level parent/child hierarchy with context previews
//! - Configurable chunk sizes with overlap

mod splitter;

pub use splitter::*;
