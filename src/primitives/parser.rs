//! Grammar registry and tokenizer entry point
//!
//! A [`Parser`] owns every registered grammar so that cross-grammar includes
//! (`source.css` inside HTML, for example) can be resolved. Tokenization
//! itself lives in [`crate::primitives::tokenizer`].

use crate::config::MissingPatternPolicy;
use crate::primitives::grammar::Grammar;
use crate::primitives::scope_name::ScopeName;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Longest line the tokenizer runs patterns against by default
pub const DEFAULT_MAX_LINE_LENGTH: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// What to do when an include names nothing
    pub missing_pattern: MissingPatternPolicy,
    /// Lines longer than this (in bytes) get a single root-scope token
    pub max_line_length: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            missing_pattern: MissingPatternPolicy::Warn,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[derive(Debug, Default)]
pub struct Parser {
    grammars: HashMap<String, Arc<Grammar>>,
    options: ParserOptions,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            grammars: HashMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Register `grammar` under its scope name, replacing any previous one
    pub fn register(&mut self, grammar: Grammar) -> Arc<Grammar> {
        let grammar = Arc::new(grammar);
        let scope = grammar.scope_name().as_str().to_string();
        if self.grammars.insert(scope, grammar.clone()).is_some() {
            tracing::debug!("replaced grammar {}", grammar.scope_name());
        }
        grammar
    }

    pub fn grammar(&self, scope_name: &str) -> Option<&Arc<Grammar>> {
        self.grammars.get(scope_name)
    }

    pub fn grammars(&self) -> impl Iterator<Item = &Arc<Grammar>> {
        self.grammars.values()
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    /// First grammar (by scope name) whose file types match `path`
    pub fn grammar_for_file(&self, path: &Path) -> Option<&Arc<Grammar>> {
        let mut candidates: Vec<&Arc<Grammar>> = self
            .grammars
            .values()
            .filter(|grammar| grammar.matches_file(path))
            .collect();
        candidates.sort_by(|a, b| a.scope_name().cmp(b.scope_name()));
        candidates.into_iter().next()
    }

    /// Grammar whose first-line pattern matches `line` (shebangs, modelines)
    pub fn grammar_for_first_line(&self, line: &str) -> Option<&Arc<Grammar>> {
        let mut candidates: Vec<&Arc<Grammar>> = self
            .grammars
            .values()
            .filter(|grammar| grammar.matches_first_line(line))
            .collect();
        candidates.sort_by(|a, b| a.scope_name().cmp(b.scope_name()));
        candidates.into_iter().next()
    }

    /// Whether this exact grammar instance is the one registered under its scope
    pub fn is_registered(&self, grammar: &Grammar) -> bool {
        self.grammars
            .get(grammar.scope_name().as_str())
            .is_some_and(|registered| std::ptr::eq(registered.as_ref(), grammar))
    }

    pub(crate) fn expect_grammar(&self, scope_name: &ScopeName) -> &Grammar {
        match self.grammars.get(scope_name.as_str()) {
            Some(grammar) => grammar,
            None => panic!("grammar {scope_name} used before being registered with the parser"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::grammar::Repository;

    fn grammar(scope: &str, file_types: &[&str]) -> Grammar {
        Grammar::new(scope, Vec::new(), Repository::default())
            .with_file_types(file_types.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut parser = Parser::default();
        assert!(parser.is_empty());
        let rust = parser.register(grammar("source.rust", &["rs"]));
        assert!(parser.is_registered(&rust));
        assert!(parser.grammar("source.rust").is_some());
        assert!(parser.grammar("source.go").is_none());

        let detached = grammar("source.rust", &["rs"]);
        assert!(!parser.is_registered(&detached));
    }

    #[test]
    fn test_register_replaces_same_scope() {
        let mut parser = Parser::default();
        let first = parser.register(grammar("source.rust", &["rs"]));
        parser.register(grammar("source.rust", &["rs", "ron"]));
        assert_eq!(parser.len(), 1);
        assert!(!parser.is_registered(&first));
    }

    #[test]
    fn test_grammar_for_file() {
        let mut parser = Parser::default();
        parser.register(grammar("source.rust", &["rs"]));
        parser.register(grammar("source.toml", &["toml", "Cargo.lock"]));

        let found = parser.grammar_for_file(Path::new("src/lib.rs")).unwrap();
        assert_eq!(found.scope_name().as_str(), "source.rust");
        let found = parser.grammar_for_file(Path::new("Cargo.lock")).unwrap();
        assert_eq!(found.scope_name().as_str(), "source.toml");
        assert!(parser.grammar_for_file(Path::new("notes.txt")).is_none());
    }

    #[test]
    fn test_default_options() {
        let options = ParserOptions::default();
        assert_eq!(options.missing_pattern, MissingPatternPolicy::Warn);
        assert_eq!(options.max_line_length, 20_000);
    }
}
