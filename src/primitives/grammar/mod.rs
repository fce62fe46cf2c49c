//! TextMate grammars
//!
//! - `types`: the pattern model and rule resolution
//! - `loader`: file formats and grammar discovery
//! - `pattern_regex`: Oniguruma regexes searched from a line position

mod loader;
mod pattern_regex;
mod types;

pub use loader::{GrammarLoader, LocalGrammarLoader};
pub use pattern_regex::{PatternRegex, RegexMatch};
pub use types::*;
