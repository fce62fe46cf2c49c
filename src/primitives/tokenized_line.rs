//! Tokens of one line and the theme application pass
//!
//! # Design
//!
//! Tokens are contiguous and start at offset 0, so a line's length is the end
//! of its last token. Applying the theme walks each token's scope stack from
//! the outermost scope in, writing every attribute the scope resolved to.
//! Inner scopes therefore overwrite outer ones key by key, while keys an inner
//! scope does not set keep the outer value.
//!
//! Line-level attributes (indents, alignment, spacing) are folded into one
//! [`ParagraphStyle`] that is written over the whole line at the end.

use crate::primitives::line_state::Scope;
use crate::primitives::scope_name::ScopeName;
use crate::view::styled_text::{AttributeValue, ParagraphStyle, StyledText};
use crate::view::theme::{AttributeSet, Capability};
use std::ops::Range;
use std::sync::Arc;

/// A run of text sharing one scope stack, offsets relative to the line
#[derive(Debug, Clone)]
pub struct Token {
    pub range: Range<usize>,
    /// Outermost first
    pub scopes: Vec<Arc<Scope>>,
}

impl Token {
    pub fn new(range: Range<usize>, scopes: Vec<Arc<Scope>>) -> Self {
        Self { range, scopes }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn scope_names(&self) -> Vec<&ScopeName> {
        self.scopes.iter().filter_map(|scope| scope.name()).collect()
    }

    fn has_same_scopes(&self, other: &Token) -> bool {
        self.scopes.len() == other.scopes.len()
            && self
                .scopes
                .iter()
                .zip(&other.scopes)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenizedLine {
    tokens: Vec<Token>,
}

impl TokenizedLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Line length in bytes: the end of the last token
    pub fn length(&self) -> usize {
        self.tokens.last().map_or(0, |token| token.range.end)
    }

    /// Append a token that starts where the line currently ends
    ///
    /// A trailing zero-length token is dropped before appending.
    ///
    /// # Panics
    ///
    /// Panics when `token` does not start at [`length`](Self::length).
    pub fn add_token(&mut self, token: Token) {
        self.clean_last();
        assert_eq!(
            token.range.start,
            self.length(),
            "tokens must be contiguous"
        );
        self.tokens.push(token);
    }

    pub fn add_tokens(&mut self, tokens: impl IntoIterator<Item = Token>) {
        self.clean_last();
        for token in tokens {
            self.add_token(token);
        }
    }

    /// Append, extending the last token instead when it has the same stack
    pub(crate) fn push_merging(&mut self, token: Token) {
        if token.is_empty() {
            return;
        }
        self.clean_last();
        if let Some(last) = self.tokens.last_mut() {
            if last.range.end == token.range.start && last.has_same_scopes(&token) {
                last.range.end = token.range.end;
                return;
            }
        }
        self.add_token(token);
    }

    fn clean_last(&mut self) {
        if self.tokens.last().is_some_and(Token::is_empty) {
            self.tokens.pop();
        }
    }

    /// Write this line's styling into `text`, the line starting at `loc`
    ///
    /// With `apply_base_attributes`, the line's existing attributes are cleared
    /// and every scope's unconditional attributes are written before its
    /// selection overlay. Without it only the overlay for
    /// `in_selection_scope` is written on top of what is already there.
    pub fn apply_theme(
        &self,
        text: &mut StyledText,
        loc: usize,
        in_selection_scope: bool,
        apply_base_attributes: bool,
    ) {
        let line_range = loc..loc + self.length();
        let mut paragraph = if apply_base_attributes {
            text.clear_attributes(line_range.clone());
            ParagraphStyle::default()
        } else {
            text.paragraph_style_at(loc).copied().unwrap_or_default()
        };

        for token in &self.tokens {
            let range = loc + token.range.start..loc + token.range.end;
            for scope in &token.scopes {
                if apply_base_attributes {
                    apply_attributes(scope.attributes(), text, &range, &mut paragraph);
                }
                let overlay = if in_selection_scope {
                    scope.in_selection_attributes()
                } else {
                    scope.out_selection_attributes()
                };
                apply_attributes(overlay, text, &range, &mut paragraph);
            }
        }

        text.set_attribute(line_range, AttributeValue::ParagraphStyle(paragraph));
    }
}

fn apply_attributes(
    attributes: &AttributeSet,
    text: &mut StyledText,
    range: &Range<usize>,
    paragraph: &mut ParagraphStyle,
) {
    for attribute in attributes {
        match attribute.capability() {
            Capability::Token => attribute.apply_to_range(text, range.clone()),
            Capability::Line => attribute.apply_to_paragraph(paragraph),
            Capability::Unsupported => {
                tracing::warn!("skipping theme attribute {:?}: not supported", attribute.key());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::color::Color;
    use crate::view::styled_text::{AttributeKey, TextAlignment};
    use crate::view::theme::{HighlightTheme, ThemeAttribute, ThemeSetting};

    const GREEN: Color = Color::rgb(0, 255, 0);
    const RED: Color = Color::rgb(255, 0, 0);

    fn theme() -> HighlightTheme {
        HighlightTheme::new(
            "t",
            vec![
                ThemeSetting::new("source", vec![ThemeAttribute::color(Color::BLACK)])
                    .with_selection_overlays(vec![], vec![ThemeAttribute::background(Color::WHITE)]),
                ThemeSetting::new(
                    "comment",
                    vec![
                        ThemeAttribute::color(GREEN),
                        ThemeAttribute::HeadIndent { value: 4.0 },
                        ThemeAttribute::Unsupported,
                    ],
                )
                .with_selection_overlays(vec![ThemeAttribute::color(RED)], vec![]),
            ],
        )
        .unwrap()
    }

    fn stacks(theme: &HighlightTheme) -> (Vec<Arc<Scope>>, Vec<Arc<Scope>>) {
        let root = Arc::new(Scope::new(Some("source.test".into()), &[], theme));
        let comment = Arc::new(Scope::new(Some("comment.line".into()), &[root.clone()], theme));
        (vec![root.clone()], vec![root, comment])
    }

    #[test]
    fn test_add_token_drops_empty_tail() {
        let theme = theme();
        let (root, _) = stacks(&theme);
        let mut line = TokenizedLine::new();
        line.add_token(Token::new(0..3, root.clone()));
        line.add_token(Token::new(3..3, root.clone()));
        assert_eq!(line.tokens().len(), 2);
        line.add_token(Token::new(3..5, root));
        assert_eq!(line.tokens().len(), 2);
        assert_eq!(line.length(), 5);
    }

    #[test]
    #[should_panic(expected = "tokens must be contiguous")]
    fn test_add_token_rejects_gap() {
        let theme = theme();
        let (root, _) = stacks(&theme);
        let mut line = TokenizedLine::new();
        line.add_token(Token::new(0..3, root.clone()));
        line.add_token(Token::new(4..6, root));
    }

    #[test]
    fn test_push_merging_joins_identical_stacks() {
        let theme = theme();
        let (root, comment) = stacks(&theme);
        let mut line = TokenizedLine::new();
        line.push_merging(Token::new(0..1, root.clone()));
        line.push_merging(Token::new(1..2, root.clone()));
        line.push_merging(Token::new(2..4, comment));
        line.push_merging(Token::new(4..4, root));
        assert_eq!(line.tokens().len(), 2);
        assert_eq!(line.tokens()[0].range, 0..2);
        assert_eq!(line.length(), 4);
    }

    #[test]
    fn test_apply_theme_inner_scope_overrides() {
        let theme = theme();
        let (root, comment) = stacks(&theme);
        let mut line = TokenizedLine::new();
        line.add_tokens([Token::new(0..2, comment), Token::new(2..5, root)]);

        let mut text = StyledText::new("xx// hi");
        line.apply_theme(&mut text, 2, false, true);

        assert_eq!(text.foreground_at(0), None);
        assert_eq!(text.foreground_at(2), Some(GREEN));
        assert_eq!(text.foreground_at(3), Some(GREEN));
        assert_eq!(text.foreground_at(4), Some(Color::BLACK));
        assert_eq!(text.foreground_at(6), Some(Color::BLACK));
        // out-of-selection overlay from the root scope
        assert_eq!(
            text.attribute(AttributeKey::Background, 5),
            Some(&AttributeValue::Background(Color::WHITE))
        );

        let paragraph = text.paragraph_style_at(2).unwrap();
        assert_eq!(paragraph.head_indent, 4.0);
        assert_eq!(text.paragraph_style_at(6), Some(paragraph));
        assert_eq!(paragraph.alignment, TextAlignment::Natural);
    }

    #[test]
    fn test_overlay_only_pass_keeps_base() {
        let theme = theme();
        let (root, comment) = stacks(&theme);
        let mut line = TokenizedLine::new();
        line.add_tokens([Token::new(0..2, comment), Token::new(2..5, root)]);

        let mut text = StyledText::new("// hi");
        line.apply_theme(&mut text, 0, false, true);
        line.apply_theme(&mut text, 0, true, false);

        assert_eq!(text.foreground_at(0), Some(RED));
        assert_eq!(text.foreground_at(3), Some(Color::BLACK));
        assert_eq!(text.paragraph_style_at(0).map(|p| p.head_indent), Some(4.0));
    }

    #[test]
    fn test_apply_theme_empty_line() {
        let line = TokenizedLine::new();
        let mut text = StyledText::new("");
        line.apply_theme(&mut text, 0, false, true);
        assert!(text.runs().is_empty());
    }
}
