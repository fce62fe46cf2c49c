//! Incremental highlighting of a whole document
//!
//! # Design
//!
//! Every line caches its tokens and the [`LineState`] at its end. An edit marks
//! the touched lines stale; nothing is re-tokenized until styling is asked
//! for. Re-tokenizing a stale line marks the next line stale only when the new
//! end state differs from the cached one, so an edit that does not change the
//! nesting at the end of its line costs one line of work.
//!
//! Scopes cache their theme resolution, so [`DocumentHighlighter::set_theme`]
//! throws every cached state away.

use crate::primitives::grammar::{Grammar, GrammarError};
use crate::primitives::line_state::LineState;
use crate::primitives::parser::Parser;
use crate::primitives::tokenized_line::TokenizedLine;
use crate::view::styled_text::StyledText;
use crate::view::theme::HighlightTheme;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug)]
struct LineEntry {
    text: String,
    tokens: Option<TokenizedLine>,
    end_state: Option<LineState>,
    stale: bool,
}

impl LineEntry {
    fn new(text: String) -> Self {
        Self {
            text,
            tokens: None,
            end_state: None,
            stale: true,
        }
    }
}

#[derive(Debug)]
pub struct DocumentHighlighter {
    grammar: Arc<Grammar>,
    theme: Arc<HighlightTheme>,
    lines: Vec<LineEntry>,
    /// Every line before this index is up to date
    valid: usize,
    tokenized: usize,
}

impl DocumentHighlighter {
    /// Split `text` on `\n` (dropping a trailing `\r`) into lines
    pub fn new(grammar: Arc<Grammar>, theme: Arc<HighlightTheme>, text: &str) -> Self {
        Self {
            grammar,
            theme,
            lines: split_lines(text).map(LineEntry::new).collect(),
            valid: 0,
            tokenized: 0,
        }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn theme(&self) -> &Arc<HighlightTheme> {
        &self.theme
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_text(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|line| line.text.as_str())
    }

    /// Lines tokenized since creation
    pub fn tokenized_count(&self) -> usize {
        self.tokenized
    }

    /// Replace lines `range` with `lines`
    pub fn replace_lines(&mut self, range: Range<usize>, lines: Vec<String>) {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        let inserted = lines.len();
        // The new region ends where the old one did; its old end state is what
        // re-tokenization compares against to stop early
        let carried = if end > start {
            self.lines[end - 1].end_state.take()
        } else {
            start
                .checked_sub(1)
                .and_then(|previous| self.lines[previous].end_state.clone())
        };
        self.lines
            .splice(start..end, lines.into_iter().map(LineEntry::new));

        if inserted > 0 {
            self.lines[start + inserted - 1].end_state = carried;
        } else if let Some(next) = self.lines.get_mut(start) {
            // After a pure deletion the line that moved up starts from a new state
            next.stale = true;
        }
        self.valid = self.valid.min(start);
    }

    pub fn set_theme(&mut self, theme: Arc<HighlightTheme>) {
        self.theme = theme;
        for line in &mut self.lines {
            line.tokens = None;
            line.end_state = None;
            line.stale = true;
        }
        self.valid = 0;
    }

    /// Tokens of line `index`, re-tokenizing whatever is stale before it
    pub fn tokens(&mut self, parser: &Parser, index: usize) -> Result<Option<&TokenizedLine>, GrammarError> {
        self.update(parser, index)?;
        Ok(self.lines.get(index).and_then(|line| line.tokens.as_ref()))
    }

    /// Style one line as its own text buffer
    pub fn style_line(
        &mut self,
        parser: &Parser,
        index: usize,
        in_selection_scope: bool,
    ) -> Result<Option<StyledText>, GrammarError> {
        self.update(parser, index)?;
        let Some(line) = self.lines.get(index) else {
            return Ok(None);
        };
        let mut text = StyledText::new(line.text.as_str());
        if let Some(tokens) = &line.tokens {
            tokens.apply_theme(&mut text, 0, in_selection_scope, true);
        }
        Ok(Some(text))
    }

    /// Style the whole document, lines joined by `\n`
    ///
    /// Lines whose index falls in `selected` get the in-selection overlay.
    pub fn styled_document(
        &mut self,
        parser: &Parser,
        selected: Option<Range<usize>>,
    ) -> Result<StyledText, GrammarError> {
        if !self.lines.is_empty() {
            self.update(parser, self.lines.len() - 1)?;
        }
        let mut text = StyledText::new("");
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                text.push_str("\n");
            }
            let loc = text.push_str(&line.text);
            if let Some(tokens) = &line.tokens {
                let in_selection = selected.as_ref().is_some_and(|range| range.contains(&index));
                tokens.apply_theme(&mut text, loc, in_selection, true);
            }
        }
        Ok(text)
    }

    fn update(&mut self, parser: &Parser, through: usize) -> Result<(), GrammarError> {
        let through = through.min(self.lines.len().saturating_sub(1));
        while self.valid <= through && self.valid < self.lines.len() {
            let index = self.valid;
            if self.lines[index].stale {
                self.retokenize(parser, index)?;
            }
            self.valid += 1;
        }
        Ok(())
    }

    fn retokenize(&mut self, parser: &Parser, index: usize) -> Result<(), GrammarError> {
        let start = match index {
            0 => self.grammar.create_first_line_state(parser, &self.theme)?,
            _ => match &self.lines[index - 1].end_state {
                Some(state) => state.clone(),
                None => self.grammar.create_first_line_state(parser, &self.theme)?,
            },
        };
        let (tokens, end) =
            parser.tokenize_line(&self.grammar, &self.lines[index].text, &start, &self.theme)?;
        self.tokenized += 1;

        let line = &mut self.lines[index];
        let unchanged = line
            .end_state
            .as_ref()
            .is_some_and(|previous| previous.is_equivalent(&end));
        line.tokens = Some(tokens);
        line.end_state = Some(end);
        line.stale = false;

        if unchanged {
            tracing::trace!("line {index} end state unchanged, stopping re-tokenization");
        } else if let Some(next) = self.lines.get_mut(index + 1) {
            next.stale = true;
        }
        Ok(())
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
}
