//! Oniguruma regexes for grammar patterns
//!
//! TextMate grammars are written against Oniguruma syntax: look-around,
//! `\G` and back-references inside a single pattern are all common. Searches
//! always run over the whole line starting from a position, so look-behind
//! sees the text before it and `\G` anchors at that position.

use onig::{Regex, Region, SearchOptions};
use std::fmt;
use std::ops::Range;

/// A compiled grammar regex together with its source
pub struct PatternRegex {
    source: String,
    regex: Regex,
}

impl PatternRegex {
    pub fn new(source: &str) -> Result<Self, onig::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First match starting at or after `pos`
    pub fn search_at(&self, text: &str, pos: usize) -> Option<RegexMatch> {
        if pos > text.len() {
            return None;
        }
        let mut region = Region::new();
        self.regex.search_with_options(
            text,
            pos,
            text.len(),
            SearchOptions::SEARCH_OPTION_NONE,
            Some(&mut region),
        )?;
        let groups = (0..region.len())
            .map(|index| region.pos(index).map(|(start, end)| start..end))
            .collect();
        Some(RegexMatch { groups })
    }

    /// Whether the regex matches anywhere in `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.search_at(text, 0).is_some()
    }
}

impl fmt::Debug for PatternRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatternRegex({:?})", self.source)
    }
}

/// Byte ranges of a match and its capture groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    groups: Vec<Option<Range<usize>>>,
}

impl RegexMatch {
    /// The whole match
    pub fn range(&self) -> Range<usize> {
        self.get(0).unwrap_or(0..0)
    }

    /// Range of group `index`, if it participated in the match
    pub fn get(&self, index: usize) -> Option<Range<usize>> {
        self.groups.get(index).cloned().flatten()
    }
}
