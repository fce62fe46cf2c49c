//! Bridge from the styled text buffer to ratatui
//!
//! Terminal cells cannot draw rounded rectangles or kerning, so rounded
//! backgrounds degrade to plain backgrounds and metric attributes are dropped.

use crate::view::styled_text::{AttributeValue, StyledRun, StyledText, TextAlignment};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use std::ops::Range;

/// Convert one run's attributes to a ratatui style
pub fn run_style(run: &StyledRun<'_>) -> Style {
    let mut style = Style::default();
    let mut has_plain_background = false;
    for value in &run.attributes {
        match value {
            AttributeValue::Foreground(color) => style = style.fg((*color).into()),
            AttributeValue::Background(color) => {
                has_plain_background = true;
                style = style.bg((*color).into());
            }
            AttributeValue::RoundedBackground(rounded) if !has_plain_background => {
                style = style.bg(rounded.color.into());
            }
            AttributeValue::Bold => style = style.add_modifier(Modifier::BOLD),
            AttributeValue::Italic => style = style.add_modifier(Modifier::ITALIC),
            AttributeValue::UnderlineStyle(_) => style = style.add_modifier(Modifier::UNDERLINED),
            AttributeValue::UnderlineColor(color) => style = style.underline_color((*color).into()),
            _ => {}
        }
    }
    style
}

/// Build a ratatui line for `range` of `text` (typically one source line)
pub fn styled_line(text: &StyledText, range: Range<usize>) -> Line<'_> {
    let alignment = text
        .paragraph_style_at(range.start)
        .map(|style| style.alignment)
        .unwrap_or_default();
    let spans: Vec<Span<'_>> = text
        .runs_in(range)
        .iter()
        .map(|run| Span::styled(run.text, run_style(run)))
        .collect();

    let line = Line::from(spans);
    match alignment {
        TextAlignment::Center => line.centered(),
        TextAlignment::Right => line.right_aligned(),
        TextAlignment::Left => line.left_aligned(),
        TextAlignment::Natural | TextAlignment::Justified => line,
    }
}
