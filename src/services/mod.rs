//! Services built on the primitives: document highlighting, theme lookup, logging

pub mod document;
#[cfg(feature = "runtime")]
pub mod logging;
pub mod registry;

pub use document::DocumentHighlighter;
pub use registry::ThemeRegistry;
