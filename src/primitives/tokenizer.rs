//! Line tokenizer
//!
//! # Design
//!
//! Each step searches from the current position for the earliest match among
//! the end regex of the innermost region and the rules of the innermost scope.
//! The end regex wins a tie on start position, then rules win in declaration
//! order. Text between matches becomes a token with the current stack.
//!
//! At the end of the line only end regexes are tried, so regions closed by
//! `$` or a lookahead close on the line that opened them. Zero-width matches
//! that would not move the tokenizer forward consume one character instead,
//! and a zero-width begin is never pushed twice at the same position.

use crate::primitives::grammar::{
    BeginEndPattern, Captures, Grammar, GrammarError, MatchPattern, RegexMatch, Rule,
};
use crate::primitives::line_state::{LineState, Scope};
use crate::primitives::parser::Parser;
use crate::primitives::tokenized_line::{Token, TokenizedLine};
use crate::view::theme::HighlightTheme;
use std::ops::Range;
use std::sync::Arc;

enum Step {
    End,
    Match(Arc<MatchPattern>),
    Begin(Arc<BeginEndPattern>),
}

struct Found {
    matched: RegexMatch,
    step: Step,
}

impl Parser {
    /// Tokenize one line (without its terminator) starting from `state`
    ///
    /// Returns the tokens and the state the next line starts from.
    pub fn tokenize_line(
        &self,
        grammar: &Grammar,
        line: &str,
        state: &LineState,
        theme: &HighlightTheme,
    ) -> Result<(TokenizedLine, LineState), GrammarError> {
        // Resolves (and checks registration of) the grammar up front
        grammar.rules(self)?;

        let mut stack = state.stack().to_vec();
        let mut tokens = TokenizedLine::new();

        if line.len() > self.options().max_line_length {
            tracing::debug!(
                "line of {} bytes exceeds max_line_length, not tokenizing",
                line.len()
            );
            tokens.push_merging(Token::new(0..line.len(), stack.clone()));
            return Ok((tokens, LineState::from_stack(stack)));
        }

        let mut pos = 0;
        // Where each stack entry's begin match ended on this line
        let mut opened_at: Vec<Option<usize>> = vec![None; stack.len()];
        // Position and depth of the last zero-width begin, to stop it re-firing
        let mut zero_width_begin: Option<(usize, usize)> = None;

        loop {
            let Some(found) = next_match(line, pos, &stack) else {
                break;
            };
            let range = found.matched.range();
            if range.start > pos {
                tokens.push_merging(Token::new(pos..range.start, stack.clone()));
                pos = range.start;
            }

            match found.step {
                Step::End => {
                    if stack.last().is_some_and(|scope| scope.is_content()) {
                        stack.pop();
                        opened_at.pop();
                    }
                    let end_captures = stack
                        .last()
                        .and_then(|scope| scope.opened_by())
                        .map(|rule| rule.end_captures.clone())
                        .unwrap_or_default();
                    emit_captures(
                        &mut tokens,
                        line,
                        &found.matched,
                        &stack,
                        &end_captures,
                        theme,
                    );
                    stack.pop();
                    opened_at.pop();
                    pos = range.end;
                }
                Step::Match(rule) => {
                    if range.is_empty() {
                        if pos >= line.len() {
                            break;
                        }
                        pos = consume_char(&mut tokens, line, pos, &stack);
                        continue;
                    }
                    let mut match_stack = stack.clone();
                    if let Some(scope) = &rule.scope {
                        match_stack.push(Arc::new(Scope::new(Some(scope.clone()), &stack, theme)));
                    }
                    emit_captures(
                        &mut tokens,
                        line,
                        &found.matched,
                        &match_stack,
                        &rule.captures,
                        theme,
                    );
                    pos = range.end;
                }
                Step::Begin(rule) => {
                    let depth = stack.len();
                    let repeats = range.is_empty()
                        && (zero_width_begin == Some((pos, depth))
                            || reopens(&stack, &opened_at, &rule, pos));
                    if repeats {
                        if pos >= line.len() {
                            break;
                        }
                        pos = consume_char(&mut tokens, line, pos, &stack);
                        continue;
                    }
                    let end = rule.end.resolve(line, &found.matched).map_err(|source| {
                        GrammarError::InvalidRegex {
                            grammar: grammar.scope_name().to_string(),
                            pattern: rule.end.as_str().to_string(),
                            source,
                        }
                    })?;
                    let nested = rule.rules(self)?.to_vec();

                    let region = Scope::new(rule.scope.clone(), &stack, theme)
                        .with_rules(nested.clone())
                        .with_end(end, rule.clone());
                    stack.push(Arc::new(region));
                    opened_at.push(Some(range.end));
                    emit_captures(
                        &mut tokens,
                        line,
                        &found.matched,
                        &stack,
                        &rule.begin_captures,
                        theme,
                    );

                    if let Some(content) = &rule.content_scope {
                        let content = Scope::new(Some(content.clone()), &stack, theme)
                            .with_rules(nested)
                            .as_content();
                        stack.push(Arc::new(content));
                        opened_at.push(Some(range.end));
                    }
                    if range.is_empty() {
                        zero_width_begin = Some((pos, depth));
                    }
                    pos = range.end;
                }
            }
        }

        if pos < line.len() {
            tokens.push_merging(Token::new(pos..line.len(), stack.clone()));
        }
        Ok((tokens, LineState::from_stack(stack)))
    }
}

/// Whether `rule` already opened a region on the stack without consuming
/// anything since
fn reopens(
    stack: &[Arc<Scope>],
    opened_at: &[Option<usize>],
    rule: &Arc<BeginEndPattern>,
    pos: usize,
) -> bool {
    stack.iter().zip(opened_at).any(|(scope, at)| {
        *at == Some(pos) && scope.opened_by().is_some_and(|opened| Arc::ptr_eq(opened, rule))
    })
}

/// Earliest candidate at or after `pos`
fn next_match(line: &str, pos: usize, stack: &[Arc<Scope>]) -> Option<Found> {
    let top = stack.last()?;
    // A content scope shares the end regex of the region below it
    let region = if top.is_content() && stack.len() >= 2 {
        &stack[stack.len() - 2]
    } else {
        top
    };

    let mut best = region.end().and_then(|end| {
        end.search_at(line, pos).map(|matched| Found {
            matched,
            step: Step::End,
        })
    });

    if pos < line.len() {
        for rule in top.rules() {
            let Some(matched) = rule.regex().search_at(line, pos) else {
                continue;
            };
            let start = matched.range().start;
            if best
                .as_ref()
                .is_some_and(|found| found.matched.range().start <= start)
            {
                continue;
            }
            let step = match rule {
                Rule::Match(pattern) => Step::Match(pattern.clone()),
                Rule::BeginEnd(pattern) => Step::Begin(pattern.clone()),
            };
            best = Some(Found { matched, step });
        }
    }
    best
}

/// Emit one character at `pos` with the current stack; returns the new position
fn consume_char(tokens: &mut TokenizedLine, line: &str, pos: usize, stack: &[Arc<Scope>]) -> usize {
    let width = line[pos..].chars().next().map_or(1, char::len_utf8);
    tokens.push_merging(Token::new(pos..pos + width, stack.to_vec()));
    pos + width
}

/// Emit tokens for a whole match, splitting out named capture groups
///
/// Capture 0 scopes the entire match. A group inside another group is scoped
/// on top of it; groups reaching outside the match (captured in a lookahead)
/// are ignored.
fn emit_captures(
    tokens: &mut TokenizedLine,
    line: &str,
    matched: &RegexMatch,
    stack: &[Arc<Scope>],
    captures: &Captures,
    theme: &HighlightTheme,
) {
    let whole = matched.range();
    if whole.is_empty() || whole.end > line.len() {
        return;
    }

    let mut base = stack.to_vec();
    let mut groups: Vec<(Range<usize>, usize, _)> = Vec::new();
    for (index, scope) in captures {
        if *index == 0 {
            let whole_scope = Scope::new(Some(scope.clone()), &base, theme);
            base.push(Arc::new(whole_scope));
            continue;
        }
        if let Some(range) = matched.get(*index) {
            if !range.is_empty() && whole.start <= range.start && range.end <= whole.end {
                groups.push((range, *index, scope));
            }
        }
    }
    // Outer groups before the groups they contain
    groups.sort_by_key(|(range, index, _)| (range.start, std::cmp::Reverse(range.end), *index));

    // Enclosing groups still open at the cursor: (end, stack inside the group)
    let mut open: Vec<(usize, Vec<Arc<Scope>>)> = Vec::new();
    let mut cursor = whole.start;
    for (range, _, scope) in groups {
        while let Some((end, inner)) = open.last() {
            if *end > range.start {
                break;
            }
            emit(tokens, cursor..*end, inner);
            cursor = *end;
            open.pop();
        }
        if open.last().is_some_and(|(end, _)| range.end > *end) {
            continue;
        }
        let outer = open.last().map_or(&base, |(_, inner)| inner);
        emit(tokens, cursor..range.start, outer);
        let mut inner = outer.clone();
        inner.push(Arc::new(Scope::new(Some(scope.clone()), outer, theme)));
        open.push((range.end, inner));
        cursor = range.start;
    }
    while let Some((end, inner)) = open.pop() {
        emit(tokens, cursor..end, &inner);
        cursor = end;
    }
    emit(tokens, cursor..whole.end, &base);
}

fn emit(tokens: &mut TokenizedLine, range: Range<usize>, stack: &[Arc<Scope>]) {
    if !range.is_empty() {
        tokens.push_merging(Token::new(range, stack.to_vec()));
    }
}
