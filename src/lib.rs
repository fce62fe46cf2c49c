//! Scope-based syntax theming
//!
//! Grammars split lines into tokens carrying scope stacks; themes bind scopes
//! to attributes; the application pass writes those attributes into a
//! [`view::styled_text::StyledText`] buffer.

pub mod config;
pub mod primitives;
pub mod services;
pub mod view;
