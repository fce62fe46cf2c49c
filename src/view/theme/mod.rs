//! Highlight themes
//!
//! - `attribute`: the theme attribute family and per-key merging
//! - `types`: settings, themes and scope resolution (no I/O)
//! - `loader`: JSON and `.tmTheme` file formats

pub mod attribute;
mod loader;
mod types;

pub use attribute::{AttributeSet, Capability, ThemeAttribute};
pub use loader::ThemeFile;
pub use types::*;
