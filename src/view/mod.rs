//! Output side of the theming engine
//!
//! Themes resolve scopes to attributes, which are written into a
//! [`styled_text::StyledText`] buffer. `render` bridges that buffer to ratatui.

pub mod color;
pub mod render;
pub mod styled_text;
pub mod theme;
