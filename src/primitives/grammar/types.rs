//! Grammar data types and rule resolution (no filesystem access)

use crate::config::MissingPatternPolicy;
use crate::primitives::line_state::{LineState, Scope};
use crate::primitives::parser::Parser;
use crate::primitives::scope_name::ScopeName;
use crate::primitives::tokenized_line::{Token, TokenizedLine};
use crate::view::styled_text::{AttributeKey, AttributeValue, StyledText};
use crate::view::theme::HighlightTheme;
use super::pattern_regex::{PatternRegex, RegexMatch};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static BACK_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([1-9])").expect("back-reference regex is valid"));

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("failed to read grammar: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid grammar JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid grammar plist: {0}")]
    Plist(#[from] plist::Error),
    #[error("grammar {grammar}: invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        grammar: String,
        pattern: String,
        #[source]
        source: onig::Error,
    },
    #[error("grammar {grammar}: {reason}")]
    InvalidPattern { grammar: String, reason: String },
    #[error("grammar {grammar}: repository has no pattern named {name:?}")]
    MissingPattern { grammar: String, name: String },
    #[error("grammar {grammar}: included grammar {include:?} is not registered")]
    MissingGrammar { grammar: String, include: String },
    #[error("unsupported grammar file format: {path}")]
    UnsupportedFormat { path: String },
}

/// Capture group index to scope, sorted by index
pub type Captures = Vec<(usize, ScopeName)>;

/// A single-regex pattern
#[derive(Debug)]
pub struct MatchPattern {
    pub scope: Option<ScopeName>,
    pub regex: PatternRegex,
    pub captures: Captures,
}

/// End regex of a begin/end pattern
#[derive(Debug)]
pub enum EndPattern {
    Static(Arc<PatternRegex>),
    /// Source containing `\1`..`\9`, compiled per begin match
    BackReferencing(String),
}

impl EndPattern {
    pub(crate) fn compile(grammar: &ScopeName, source: &str) -> Result<Self, GrammarError> {
        if BACK_REFERENCE.is_match(source) {
            return Ok(EndPattern::BackReferencing(source.to_string()));
        }
        compile_regex(grammar, source).map(|regex| EndPattern::Static(Arc::new(regex)))
    }

    pub fn as_str(&self) -> &str {
        match self {
            EndPattern::Static(regex) => regex.as_str(),
            EndPattern::BackReferencing(source) => source,
        }
    }

    /// The end regex for a scope opened by `begin`, matched against `line`
    pub fn resolve(
        &self,
        line: &str,
        begin: &RegexMatch,
    ) -> Result<Arc<PatternRegex>, onig::Error> {
        match self {
            EndPattern::Static(regex) => Ok(regex.clone()),
            EndPattern::BackReferencing(source) => {
                let substituted = BACK_REFERENCE.replace_all(source, |caps: &regex::Captures<'_>| {
                    let index: usize = caps[1].parse().unwrap_or(0);
                    begin
                        .get(index)
                        .and_then(|range| line.get(range))
                        .map(regex::escape)
                        .unwrap_or_default()
                });
                PatternRegex::new(&substituted).map(Arc::new)
            }
        }
    }
}

/// A region delimited by a begin and an end regex
#[derive(Debug)]
pub struct BeginEndPattern {
    pub scope: Option<ScopeName>,
    pub content_scope: Option<ScopeName>,
    pub begin: PatternRegex,
    pub end: EndPattern,
    pub begin_captures: Captures,
    pub end_captures: Captures,
    pub patterns: Vec<Pattern>,
    /// Grammar whose repository the nested patterns refer to
    grammar: ScopeName,
    nested: OnceCell<Vec<Rule>>,
}

impl BeginEndPattern {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        grammar: ScopeName,
        scope: Option<ScopeName>,
        content_scope: Option<ScopeName>,
        begin: PatternRegex,
        end: EndPattern,
        begin_captures: Captures,
        end_captures: Captures,
        patterns: Vec<Pattern>,
    ) -> Self {
        Self {
            scope,
            content_scope,
            begin,
            end,
            begin_captures,
            end_captures,
            patterns,
            grammar,
            nested: OnceCell::new(),
        }
    }

    /// Rules active inside the region, resolved on first use
    ///
    /// Resolution is deferred so that recursive grammars (`$self` inside a
    /// block) terminate.
    pub fn rules(&self, parser: &Parser) -> Result<&[Rule], GrammarError> {
        self.nested
            .get_or_try_init(|| {
                let grammar = parser.expect_grammar(&self.grammar);
                let mut rules = Vec::new();
                let mut visiting = Vec::new();
                for pattern in &self.patterns {
                    pattern.resolve_into(parser, grammar, &mut visiting, &mut rules)?;
                }
                Ok(rules)
            })
            .map(Vec::as_slice)
    }
}

/// Target of an `include`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include {
    /// `$self` / `$base`
    SelfGrammar,
    /// `#name`
    Repository(String),
    /// `other.scope` or `other.scope#name`
    Grammar { scope: String, name: Option<String> },
}

impl Include {
    pub fn parse(include: &str) -> Self {
        match include {
            "$self" | "$base" => Include::SelfGrammar,
            _ => match include.split_once('#') {
                Some(("", name)) => Include::Repository(name.to_string()),
                Some((scope, name)) => Include::Grammar {
                    scope: scope.to_string(),
                    name: Some(name.to_string()),
                },
                None => Include::Grammar {
                    scope: include.to_string(),
                    name: None,
                },
            },
        }
    }
}

/// A grammar fragment as written in the grammar file
#[derive(Debug, Clone)]
pub enum Pattern {
    Match(Arc<MatchPattern>),
    BeginEnd(Arc<BeginEndPattern>),
    Include(Include),
    /// A bare list of patterns
    Group(Vec<Pattern>),
}

/// A resolved pattern the tokenizer can match directly
#[derive(Debug, Clone)]
pub enum Rule {
    Match(Arc<MatchPattern>),
    BeginEnd(Arc<BeginEndPattern>),
}

impl Rule {
    /// The regex that starts a match of this rule
    pub fn regex(&self) -> &PatternRegex {
        match self {
            Rule::Match(pattern) => &pattern.regex,
            Rule::BeginEnd(pattern) => &pattern.begin,
        }
    }
}

impl Pattern {
    /// Flatten this pattern into rules, following includes
    pub fn resolve(&self, parser: &Parser, grammar: &Grammar) -> Result<Vec<Rule>, GrammarError> {
        let mut rules = Vec::new();
        self.resolve_into(parser, grammar, &mut Vec::new(), &mut rules)?;
        Ok(rules)
    }

    fn resolve_into(
        &self,
        parser: &Parser,
        grammar: &Grammar,
        visiting: &mut Vec<String>,
        rules: &mut Vec<Rule>,
    ) -> Result<(), GrammarError> {
        match self {
            Pattern::Match(pattern) => rules.push(Rule::Match(pattern.clone())),
            Pattern::BeginEnd(pattern) => rules.push(Rule::BeginEnd(pattern.clone())),
            Pattern::Group(patterns) => {
                for pattern in patterns {
                    pattern.resolve_into(parser, grammar, visiting, rules)?;
                }
            }
            Pattern::Include(include) => {
                let (target, key) = match include {
                    Include::SelfGrammar => (grammar, format!("{}$self", grammar.scope_name())),
                    Include::Repository(name) => {
                        return resolve_repository(parser, grammar, name, visiting, rules);
                    }
                    Include::Grammar { scope, name } => {
                        let Some(other) = parser.grammar(scope) else {
                            return missing(
                                parser,
                                GrammarError::MissingGrammar {
                                    grammar: grammar.scope_name().to_string(),
                                    include: scope.clone(),
                                },
                            );
                        };
                        if let Some(name) = name {
                            return resolve_repository(parser, other, name, visiting, rules);
                        }
                        (other.as_ref(), format!("{scope}$self"))
                    }
                };
                if visiting.contains(&key) {
                    tracing::warn!("include cycle through {key} in {}", grammar.scope_name());
                    return Ok(());
                }
                visiting.push(key);
                for pattern in &target.patterns {
                    pattern.resolve_into(parser, target, visiting, rules)?;
                }
                visiting.pop();
            }
        }
        Ok(())
    }
}

fn resolve_repository(
    parser: &Parser,
    grammar: &Grammar,
    name: &str,
    visiting: &mut Vec<String>,
    rules: &mut Vec<Rule>,
) -> Result<(), GrammarError> {
    let Some(pattern) = grammar.repository.get(name) else {
        return missing(
            parser,
            GrammarError::MissingPattern {
                grammar: grammar.scope_name().to_string(),
                name: name.to_string(),
            },
        );
    };
    let key = format!("{}#{name}", grammar.scope_name());
    if visiting.contains(&key) {
        tracing::warn!("include cycle through {key}");
        return Ok(());
    }
    visiting.push(key);
    let result = pattern.resolve_into(parser, grammar, visiting, rules);
    visiting.pop();
    result
}

fn missing(parser: &Parser, err: GrammarError) -> Result<(), GrammarError> {
    match parser.options().missing_pattern {
        MissingPatternPolicy::Warn => {
            tracing::warn!("{err}; resolving it to no rules");
            Ok(())
        }
        MissingPatternPolicy::Error => Err(err),
    }
}

pub(crate) fn compile_regex(grammar: &ScopeName, source: &str) -> Result<PatternRegex, GrammarError> {
    PatternRegex::new(source).map_err(|source_err| GrammarError::InvalidRegex {
        grammar: grammar.to_string(),
        pattern: source.to_string(),
        source: source_err,
    })
}

/// Named, reusable patterns of a grammar
#[derive(Debug, Clone, Default)]
pub struct Repository {
    patterns: BTreeMap<String, Pattern>,
}

impl Repository {
    pub fn new(patterns: BTreeMap<String, Pattern>) -> Self {
        Self { patterns }
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A language grammar
///
/// Grammars are registered with a [`Parser`], which resolves includes between
/// them. Rule resolution happens once per grammar and is shared by every line
/// tokenized with it.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) name: Option<String>,
    pub(crate) scope_name: ScopeName,
    pub(crate) file_types: Vec<String>,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) repository: Repository,
    pub(crate) folding_start_marker: Option<PatternRegex>,
    pub(crate) folding_stop_marker: Option<PatternRegex>,
    pub(crate) first_line_match: Option<PatternRegex>,
    rules: OnceCell<Vec<Rule>>,
    resolutions: AtomicUsize,
}

impl Grammar {
    pub fn new(scope_name: impl Into<ScopeName>, patterns: Vec<Pattern>, repository: Repository) -> Self {
        Self {
            name: None,
            scope_name: scope_name.into(),
            file_types: Vec::new(),
            patterns,
            repository,
            folding_start_marker: None,
            folding_stop_marker: None,
            first_line_match: None,
            rules: OnceCell::new(),
            resolutions: AtomicUsize::new(0),
        }
    }

    pub fn with_file_types(mut self, file_types: Vec<String>) -> Self {
        self.file_types = file_types;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn scope_name(&self) -> &ScopeName {
        &self.scope_name
    }

    pub fn file_types(&self) -> &[String] {
        &self.file_types
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Root rules, resolved on first access and memoized
    ///
    /// # Panics
    ///
    /// Panics when this grammar has not been registered with `parser`.
    pub fn rules(&self, parser: &Parser) -> Result<&[Rule], GrammarError> {
        assert!(
            parser.is_registered(self),
            "grammar {} used before being registered with the parser",
            self.scope_name
        );
        self.rules
            .get_or_try_init(|| {
                self.resolutions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("resolving rules for grammar {}", self.scope_name);
                let mut rules = Vec::new();
                for pattern in &self.patterns {
                    rules.extend(pattern.resolve(parser, self)?);
                }
                Ok(rules)
            })
            .map(Vec::as_slice)
    }

    /// How many times root rule resolution has run
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// State for the first line of a document: just the root scope
    pub fn create_first_line_state(
        &self,
        parser: &Parser,
        theme: &HighlightTheme,
    ) -> Result<LineState, GrammarError> {
        let rules = self.rules(parser)?.to_vec();
        let root = Scope::new(Some(self.scope_name.clone()), &[], theme).with_rules(rules);
        Ok(LineState::new(root))
    }

    /// Attributes the theme gives the root scope, for seeding editor defaults
    ///
    /// Themes a one-character token carrying only the root scope (outside the
    /// selection) and reads back what was written.
    pub fn base_attributes(
        &self,
        parser: &Parser,
        theme: &HighlightTheme,
    ) -> Result<BTreeMap<AttributeKey, AttributeValue>, GrammarError> {
        let state = self.create_first_line_state(parser, theme)?;
        let mut line = TokenizedLine::new();
        line.add_token(Token::new(0..1, state.stack().to_vec()));

        let mut text = StyledText::new(" ");
        line.apply_theme(&mut text, 0, false, true);
        Ok(text.attributes_at(0))
    }

    /// Whether `path` is handled by this grammar, by extension or file name
    pub fn matches_file(&self, path: &Path) -> bool {
        let file_name = path.file_name().and_then(|name| name.to_str());
        let extension = path.extension().and_then(|ext| ext.to_str());
        self.file_types.iter().any(|file_type| {
            Some(file_type.as_str()) == extension || Some(file_type.as_str()) == file_name
        })
    }

    pub fn matches_first_line(&self, line: &str) -> bool {
        self.first_line_match
            .as_ref()
            .is_some_and(|regex| regex.is_match(line))
    }

    pub fn is_folding_start(&self, line: &str) -> bool {
        self.folding_start_marker
            .as_ref()
            .is_some_and(|regex| regex.is_match(line))
    }

    pub fn is_folding_stop(&self, line: &str) -> bool {
        self.folding_stop_marker
            .as_ref()
            .is_some_and(|regex| regex.is_match(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingPatternPolicy;
    use crate::primitives::parser::ParserOptions;
    use crate::view::theme::{ThemeAttribute, ThemeSetting};

    fn grammar(json: &str) -> Grammar {
        Grammar::from_json_str(json).unwrap()
    }

    fn theme() -> HighlightTheme {
        HighlightTheme::new(
            "plain",
            vec![ThemeSetting::new("source", vec![ThemeAttribute::Bold])],
        )
        .unwrap()
    }

    const REPOSITORY_GRAMMAR: &str = r##"{
        "scopeName": "source.repo",
        "patterns": [
            { "include": "#keywords" },
            { "match": "\\d+", "name": "constant.numeric" }
        ],
        "repository": {
            "keywords": {
                "patterns": [
                    { "match": "\\bif\\b", "name": "keyword.control" },
                    { "include": "#more" }
                ]
            },
            "more": { "match": "\\belse\\b", "name": "keyword.control" }
        }
    }"##;

    #[test]
    fn test_include_parse() {
        assert_eq!(Include::parse("$self"), Include::SelfGrammar);
        assert_eq!(Include::parse("$base"), Include::SelfGrammar);
        assert_eq!(Include::parse("#strings"), Include::Repository("strings".into()));
        assert_eq!(
            Include::parse("source.js#expr"),
            Include::Grammar {
                scope: "source.js".into(),
                name: Some("expr".into())
            }
        );
        assert_eq!(
            Include::parse("source.css"),
            Include::Grammar {
                scope: "source.css".into(),
                name: None
            }
        );
    }

    #[test]
    fn test_rules_flatten_repository_in_order() {
        let mut parser = Parser::default();
        let grammar = parser.register(grammar(REPOSITORY_GRAMMAR));
        let rules = grammar.rules(&parser).unwrap();
        let sources: Vec<&str> = rules.iter().map(|rule| rule.regex().as_str()).collect();
        assert_eq!(sources, [r"\bif\b", r"\belse\b", r"\d+"]);
    }

    #[test]
    fn test_rules_are_memoized() {
        let mut parser = Parser::default();
        let grammar = parser.register(grammar(REPOSITORY_GRAMMAR));
        let first = grammar.rules(&parser).unwrap().len();
        let second = grammar.rules(&parser).unwrap().len();
        assert_eq!(first, second);
        assert_eq!(grammar.resolution_count(), 1);
    }

    #[test]
    #[should_panic(expected = "used before being registered")]
    fn test_unregistered_grammar_panics() {
        let parser = Parser::default();
        let grammar = grammar(REPOSITORY_GRAMMAR);
        let _ = grammar.rules(&parser);
    }

    #[test]
    fn test_missing_pattern_policies() {
        let json = r##"{ "scopeName": "source.gap", "patterns": [{ "include": "#nowhere" }] }"##;

        let mut lenient = Parser::default();
        let grammar_a = lenient.register(grammar(json));
        assert!(grammar_a.rules(&lenient).unwrap().is_empty());

        let mut strict = Parser::new(ParserOptions {
            missing_pattern: MissingPatternPolicy::Error,
            ..ParserOptions::default()
        });
        let grammar_b = strict.register(grammar(json));
        let err = grammar_b.rules(&strict).unwrap_err();
        assert!(matches!(
            err,
            GrammarError::MissingPattern { ref grammar, ref name }
                if grammar == "source.gap" && name == "nowhere"
        ));
    }

    #[test]
    fn test_include_cycle_is_broken() {
        let json = r##"{
            "scopeName": "source.loop",
            "patterns": [{ "include": "#a" }],
            "repository": {
                "a": { "patterns": [{ "include": "#b" }, { "match": "a" }] },
                "b": { "patterns": [{ "include": "#a" }, { "match": "b" }] }
            }
        }"##;
        let mut parser = Parser::default();
        let grammar = parser.register(grammar(json));
        let sources: Vec<&str> = grammar
            .rules(&parser)
            .unwrap()
            .iter()
            .map(|rule| rule.regex().as_str())
            .collect();
        assert_eq!(sources, ["b", "a"]);
    }

    #[test]
    fn test_cross_grammar_include() {
        let mut parser = Parser::default();
        parser.register(grammar(
            r#"{ "scopeName": "source.inner", "patterns": [{ "match": "x" }],
                 "repository": { "y": { "match": "y" } } }"#,
        ));
        let outer = parser.register(grammar(
            r#"{ "scopeName": "source.outer",
                 "patterns": [{ "include": "source.inner" }, { "include": "source.inner#y" }] }"#,
        ));
        let sources: Vec<&str> = outer
            .rules(&parser)
            .unwrap()
            .iter()
            .map(|rule| rule.regex().as_str())
            .collect();
        assert_eq!(sources, ["x", "y"]);
    }

    #[test]
    fn test_back_referencing_end() {
        let grammar_scope = ScopeName::new("source.heredoc");
        let end = EndPattern::compile(&grammar_scope, r"^\1$").unwrap();
        assert!(matches!(end, EndPattern::BackReferencing(_)));

        let begin = PatternRegex::new(r"<<(\w+)").unwrap();
        let line = "<<EOF";
        let found = begin.search_at(line, 0).unwrap();
        let resolved = end.resolve(line, &found).unwrap();
        assert!(resolved.is_match("EOF"));
        assert!(!resolved.is_match("EOFX"));

        let dotted = EndPattern::compile(&grammar_scope, r"\1").unwrap();
        let line = "<<a.b";
        let found = PatternRegex::new(r"<<([\w.]+)").unwrap().search_at(line, 0).unwrap();
        let resolved = dotted.resolve(line, &found).unwrap();
        assert!(resolved.is_match("a.b"));
        assert!(!resolved.is_match("axb"));
    }

    #[test]
    fn test_base_attributes() {
        let mut parser = Parser::default();
        let grammar = parser.register(grammar(REPOSITORY_GRAMMAR));
        let base = grammar.base_attributes(&parser, &theme()).unwrap();
        assert_eq!(base.get(&AttributeKey::Bold), Some(&AttributeValue::Bold));
        assert!(base.contains_key(&AttributeKey::ParagraphStyle));
    }

    #[test]
    fn test_file_and_folding_helpers() {
        let grammar = grammar(
            r#"{ "scopeName": "source.c", "fileTypes": ["c", "h", "Makefile"],
                 "foldingStartMarker": "\\{\\s*$", "foldingStopMarker": "^\\s*\\}",
                 "firstLineMatch": "^#!.*\\bcc\\b", "patterns": [] }"#,
        );
        assert!(grammar.matches_file(Path::new("src/main.c")));
        assert!(grammar.matches_file(Path::new("Makefile")));
        assert!(!grammar.matches_file(Path::new("main.rs")));
        assert!(grammar.is_folding_start("int main() {"));
        assert!(grammar.is_folding_stop("  }"));
        assert!(grammar.matches_first_line("#!/usr/bin/env cc"));
    }
}
