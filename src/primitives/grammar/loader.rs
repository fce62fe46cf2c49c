//! Grammar file parsing and discovery
//!
//! TextMate grammars come as JSON (`.tmLanguage.json`) or property lists
//! (`.tmLanguage`). Both deserialize into the same raw shape, which is then
//! compiled: regexes are built eagerly so a broken grammar fails at load time,
//! while includes stay symbolic until the grammar is registered and used.

use crate::primitives::grammar::types::{
    compile_regex, BeginEndPattern, Captures, EndPattern, Grammar, GrammarError, Include,
    MatchPattern, Pattern, Repository,
};
use crate::primitives::parser::Parser;
use crate::primitives::scope_name::ScopeName;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrammar {
    scope_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    file_types: Vec<String>,
    #[serde(default)]
    patterns: Vec<RawPattern>,
    #[serde(default)]
    repository: BTreeMap<String, RawPattern>,
    #[serde(default)]
    folding_start_marker: Option<String>,
    #[serde(default)]
    folding_stop_marker: Option<String>,
    #[serde(default)]
    first_line_match: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPattern {
    name: Option<String>,
    content_name: Option<String>,
    #[serde(rename = "match")]
    match_regex: Option<String>,
    begin: Option<String>,
    end: Option<String>,
    include: Option<String>,
    #[serde(default)]
    captures: BTreeMap<String, RawCapture>,
    #[serde(default)]
    begin_captures: BTreeMap<String, RawCapture>,
    #[serde(default)]
    end_captures: BTreeMap<String, RawCapture>,
    patterns: Option<Vec<RawPattern>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCapture {
    name: Option<String>,
}

struct Compiler {
    grammar: ScopeName,
}

impl Compiler {
    fn pattern(&self, raw: RawPattern) -> Result<Pattern, GrammarError> {
        if let Some(include) = raw.include {
            return Ok(Pattern::Include(Include::parse(&include)));
        }

        if let Some(source) = raw.match_regex {
            return Ok(Pattern::Match(Arc::new(MatchPattern {
                scope: raw.name.map(ScopeName::new),
                regex: compile_regex(&self.grammar, &source)?,
                captures: self.captures(raw.captures),
            })));
        }

        if let Some(begin) = raw.begin {
            let end = raw.end.ok_or_else(|| GrammarError::InvalidPattern {
                grammar: self.grammar.to_string(),
                reason: format!("begin pattern {begin:?} has no end"),
            })?;
            // `captures` applies to both ends unless overridden
            let begin_captures = if raw.begin_captures.is_empty() {
                self.captures_ref(&raw.captures)
            } else {
                self.captures(raw.begin_captures)
            };
            let end_captures = if raw.end_captures.is_empty() {
                self.captures_ref(&raw.captures)
            } else {
                self.captures(raw.end_captures)
            };
            let patterns = self.patterns(raw.patterns.unwrap_or_default())?;
            return Ok(Pattern::BeginEnd(Arc::new(BeginEndPattern::new(
                self.grammar.clone(),
                raw.name.map(ScopeName::new),
                raw.content_name.map(ScopeName::new),
                compile_regex(&self.grammar, &begin)?,
                EndPattern::compile(&self.grammar, &end)?,
                begin_captures,
                end_captures,
                patterns,
            ))));
        }

        match raw.patterns {
            Some(patterns) => Ok(Pattern::Group(self.patterns(patterns)?)),
            None => Err(GrammarError::InvalidPattern {
                grammar: self.grammar.to_string(),
                reason: "pattern has none of match, begin, include or patterns".to_string(),
            }),
        }
    }

    fn patterns(&self, raw: Vec<RawPattern>) -> Result<Vec<Pattern>, GrammarError> {
        raw.into_iter().map(|pattern| self.pattern(pattern)).collect()
    }

    fn captures(&self, raw: BTreeMap<String, RawCapture>) -> Captures {
        self.captures_ref(&raw)
    }

    fn captures_ref(&self, raw: &BTreeMap<String, RawCapture>) -> Captures {
        let mut captures: Captures = raw
            .iter()
            .filter_map(|(index, capture)| {
                let Ok(index) = index.parse::<usize>() else {
                    tracing::warn!("{}: ignoring capture key {index:?}", self.grammar);
                    return None;
                };
                let name = capture.name.as_ref()?;
                Some((index, ScopeName::new(name.as_str())))
            })
            .collect();
        captures.sort_by_key(|(index, _)| *index);
        captures
    }
}

impl Grammar {
    fn from_raw(raw: RawGrammar) -> Result<Self, GrammarError> {
        let compiler = Compiler {
            grammar: ScopeName::new(raw.scope_name.as_str()),
        };
        let patterns = compiler.patterns(raw.patterns)?;
        let repository = raw
            .repository
            .into_iter()
            .map(|(name, pattern)| Ok((name, compiler.pattern(pattern)?)))
            .collect::<Result<BTreeMap<_, _>, GrammarError>>()?;
        let optional = |source: Option<String>| {
            source
                .map(|source| compile_regex(&compiler.grammar, &source))
                .transpose()
        };

        let mut grammar = Grammar::new(
            compiler.grammar.clone(),
            patterns,
            Repository::new(repository),
        )
        .with_file_types(raw.file_types);
        grammar.name = raw.name;
        grammar.folding_start_marker = optional(raw.folding_start_marker)?;
        grammar.folding_stop_marker = optional(raw.folding_stop_marker)?;
        grammar.first_line_match = optional(raw.first_line_match)?;
        Ok(grammar)
    }

    pub fn from_json_str(json: &str) -> Result<Self, GrammarError> {
        Self::from_raw(serde_json::from_str(json)?)
    }

    /// Parse a `.tmLanguage` property list (XML or binary)
    pub fn from_plist_bytes(bytes: &[u8]) -> Result<Self, GrammarError> {
        Self::from_raw(plist::from_bytes(bytes)?)
    }

    /// Load a grammar file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self, GrammarError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?),
            Some("tmLanguage") | Some("plist") => Self::from_plist_bytes(&std::fs::read(path)?),
            _ => Err(GrammarError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

fn is_grammar_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json" | "tmLanguage" | "plist")
    )
}

/// Source of grammars for a [`Parser`]
pub trait GrammarLoader {
    /// Every grammar this loader can find, each with its own load result
    fn load_grammars(&self) -> Vec<(PathBuf, Result<Grammar, GrammarError>)>;
}

/// Loads every grammar file found directly inside a set of directories
#[derive(Debug, Clone, Default)]
pub struct LocalGrammarLoader {
    dirs: Vec<PathBuf>,
}

impl LocalGrammarLoader {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl GrammarLoader for LocalGrammarLoader {
    fn load_grammars(&self) -> Vec<(PathBuf, Result<Grammar, GrammarError>)> {
        let mut loaded = Vec::new();
        for dir in &self.dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!("skipping grammar directory {}: {e}", dir.display());
                    continue;
                }
            };
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.is_file() && is_grammar_file(path))
                .collect();
            paths.sort();
            for path in paths {
                let grammar = Grammar::load(&path);
                loaded.push((path, grammar));
            }
        }
        loaded
    }
}

impl Parser {
    /// Register every grammar `loader` finds, returning how many succeeded
    ///
    /// Files that fail to load are logged and skipped.
    pub fn load_from(&mut self, loader: &dyn GrammarLoader) -> usize {
        let mut registered = 0;
        for (path, result) in loader.load_grammars() {
            match result {
                Ok(grammar) => {
                    tracing::debug!("loaded grammar {} from {}", grammar.scope_name(), path.display());
                    self.register(grammar);
                    registered += 1;
                }
                Err(e) => tracing::warn!("failed to load grammar {}: {e}", path.display()),
            }
        }
        registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_grammar_compiles() {
        let grammar = Grammar::from_json_str(
            r#"{
                "scopeName": "source.test",
                "name": "Test",
                "fileTypes": ["tst"],
                "patterns": [
                    { "match": "//.*$", "name": "comment.line" },
                    {
                        "begin": "\"", "end": "\"", "name": "string.quoted",
                        "contentName": "string.content",
                        "captures": { "0": { "name": "punctuation.quote" } },
                        "patterns": [{ "match": "\\\\.", "name": "constant.escape" }]
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(grammar.scope_name().as_str(), "source.test");
        assert_eq!(grammar.name(), Some("Test"));
        assert_eq!(grammar.patterns().len(), 2);
        let Pattern::BeginEnd(string) = &grammar.patterns()[1] else {
            panic!("expected a begin/end pattern");
        };
        assert_eq!(string.content_scope, Some(ScopeName::new("string.content")));
        assert_eq!(string.begin_captures, vec![(0, ScopeName::new("punctuation.quote"))]);
        assert_eq!(string.end_captures, string.begin_captures);
        assert_eq!(string.patterns.len(), 1);
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let err = Grammar::from_json_str(
            r#"{ "scopeName": "source.bad", "patterns": [{ "match": "(unclosed" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GrammarError::InvalidRegex { ref grammar, ref pattern, .. }
                if grammar == "source.bad" && pattern == "(unclosed"
        ));
    }

    #[test]
    fn test_oniguruma_patterns_load() {
        let grammar = Grammar::from_json_str(
            r#"{ "scopeName": "source.onig", "patterns": [
                { "begin": "(?=\\{)", "end": "(?<=\\})", "name": "meta.block" },
                { "match": "\\bfoo(?!bar)", "name": "keyword.foo" },
                { "match": "\\G\\s*", "name": "meta.leading" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(grammar.patterns().len(), 3);
    }

    #[test]
    fn test_begin_without_end_is_rejected() {
        let err = Grammar::from_json_str(
            r#"{ "scopeName": "source.bad", "patterns": [{ "begin": "<" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, GrammarError::InvalidPattern { .. }));
    }

    #[test]
    fn test_plist_grammar() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>scopeName</key>
    <string>source.ini</string>
    <key>fileTypes</key>
    <array><string>ini</string></array>
    <key>patterns</key>
    <array>
        <dict>
            <key>match</key>
            <string>^;.*$</string>
            <key>name</key>
            <string>comment.line.semicolon</string>
        </dict>
    </array>
</dict>
</plist>"#;
        let grammar = Grammar::from_plist_bytes(xml.as_bytes()).unwrap();
        assert_eq!(grammar.scope_name().as_str(), "source.ini");
        assert!(grammar.matches_file(Path::new("settings.ini")));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Grammar::load(Path::new("grammar.yaml")).unwrap_err();
        assert!(matches!(err, GrammarError::UnsupportedFormat { .. }));
    }
}
