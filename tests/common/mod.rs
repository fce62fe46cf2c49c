//! Fixtures shared by the integration tests
#![allow(dead_code)]

use linetint::primitives::grammar::Grammar;
use linetint::primitives::parser::Parser;
use linetint::primitives::tokenized_line::TokenizedLine;
use linetint::view::color::Color;
use linetint::view::theme::{HighlightTheme, ThemeAttribute, ThemeSetting};
use std::sync::Arc;

pub const BLACK: Color = Color::BLACK;
pub const GREEN: Color = Color::rgb(0, 255, 0);
pub const RED: Color = Color::rgb(255, 0, 0);
pub const BLUE: Color = Color::rgb(0, 0, 255);

/// Root `source.test`, one pattern matching `//` as `comment.line`
pub const COMMENT_GRAMMAR: &str = r#"{
    "scopeName": "source.test",
    "patterns": [{ "match": "//", "name": "comment.line" }]
}"#;

pub const RICH_GRAMMAR: &str = r##"{
    "scopeName": "source.rich",
    "fileTypes": ["rich"],
    "patterns": [
        { "include": "#comments" },
        { "match": "\\b(let|fn)\\b", "name": "keyword.other" },
        { "match": "\\b\\d+\\b", "name": "constant.numeric" },
        {
            "begin": "\"", "end": "\"", "name": "string.quoted.double",
            "patterns": [{ "match": "\\\\.", "name": "constant.character.escape" }]
        }
    ],
    "repository": {
        "comments": {
            "patterns": [
                { "match": "//.*$", "name": "comment.line.double-slash" },
                { "begin": "/\\*", "end": "\\*/", "name": "comment.block" }
            ]
        }
    }
}"##;

pub fn theme(settings: Vec<ThemeSetting>) -> HighlightTheme {
    HighlightTheme::new("test", settings).unwrap()
}

/// Root black, comments green
pub fn comment_theme() -> HighlightTheme {
    theme(vec![
        ThemeSetting::new("source", vec![ThemeAttribute::color(BLACK)]),
        ThemeSetting::new("comment", vec![ThemeAttribute::color(GREEN)]),
    ])
}

pub fn setup(json: &str) -> (Parser, Arc<Grammar>) {
    let mut parser = Parser::default();
    let grammar = parser.register(Grammar::from_json_str(json).unwrap());
    (parser, grammar)
}

/// Tokenize a single line from the first-line state
pub fn tokenize(parser: &Parser, grammar: &Grammar, theme: &HighlightTheme, line: &str) -> TokenizedLine {
    let state = grammar.create_first_line_state(parser, theme).unwrap();
    parser.tokenize_line(grammar, line, &state, theme).unwrap().0
}

/// One token per line: `range text scopes...`
pub fn dump(tokens: &TokenizedLine, line: &str) -> String {
    tokens
        .tokens()
        .iter()
        .map(|token| {
            let scopes: Vec<&str> = token.scope_names().iter().map(|s| s.as_str()).collect();
            format!(
                "{:?} {:?} {}",
                token.range,
                &line[token.range.clone()],
                scopes.join(" ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
