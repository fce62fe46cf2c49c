//! Theme attributes
//!
//! A theme attribute is one styling instruction attached to a scope. Each
//! attribute has a *capability*: it either styles a token range of the styled
//! text buffer, or it mutates the paragraph style shared by the whole line.
//! Dispatch is a closed enum so the application pass handles every kind; only
//! kinds a theme file names but this crate does not know end up as
//! [`ThemeAttribute::Unsupported`] and are skipped with a warning.

use crate::view::color::Color;
use crate::view::styled_text::{
    ActionHandler, AttributeValue, ColoringStyle, ParagraphStyle, RoundedBackground,
    RoundingStyle, StyledText, TextAlignment, UnderlineStyle,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Where an attribute applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Applies to a token's range of the styled text
    Token,
    /// Mutates the line's paragraph style
    Line,
    /// Applies nowhere
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThemeAttribute {
    Color {
        color: Color,
    },
    BackgroundColor {
        color: Color,
        #[serde(default)]
        rounding: RoundingStyle,
        #[serde(default)]
        coloring: ColoringStyle,
    },
    Bold,
    Italic,
    Underline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
        #[serde(default)]
        style: UnderlineStyle,
    },
    Kerning {
        value: f32,
    },
    Ligature {
        value: u8,
    },
    HeadIndent {
        value: f32,
    },
    TailIndent {
        value: f32,
    },
    ParagraphSpacingBefore {
        value: f32,
    },
    ParagraphSpacingAfter {
        value: f32,
    },
    Alignment {
        alignment: TextAlignment,
    },
    DefaultTabInterval {
        value: f32,
    },
    Action {
        link: String,
        #[serde(skip)]
        #[schemars(skip)]
        handler: Option<ActionHandler>,
    },
    /// An attribute kind this crate does not implement
    #[serde(other)]
    Unsupported,
}

impl ThemeAttribute {
    pub fn color(color: Color) -> Self {
        ThemeAttribute::Color { color }
    }

    pub fn background(color: Color) -> Self {
        ThemeAttribute::BackgroundColor {
            color,
            rounding: RoundingStyle::None,
            coloring: ColoringStyle::Text,
        }
    }

    pub fn action(link: impl Into<String>, handler: Option<ActionHandler>) -> Self {
        ThemeAttribute::Action {
            link: link.into(),
            handler,
        }
    }

    /// Attribute category; two attributes with the same key override each other
    pub fn key(&self) -> &'static str {
        match self {
            ThemeAttribute::Color { .. } => "color",
            ThemeAttribute::BackgroundColor { .. } => "background_color",
            ThemeAttribute::Bold => "bold",
            ThemeAttribute::Italic => "italic",
            ThemeAttribute::Underline { .. } => "underline",
            ThemeAttribute::Kerning { .. } => "kerning",
            ThemeAttribute::Ligature { .. } => "ligature",
            ThemeAttribute::HeadIndent { .. } => "head_indent",
            ThemeAttribute::TailIndent { .. } => "tail_indent",
            ThemeAttribute::ParagraphSpacingBefore { .. } => "paragraph_spacing_before",
            ThemeAttribute::ParagraphSpacingAfter { .. } => "paragraph_spacing_after",
            ThemeAttribute::Alignment { .. } => "alignment",
            ThemeAttribute::DefaultTabInterval { .. } => "default_tab_interval",
            ThemeAttribute::Action { .. } => "action",
            ThemeAttribute::Unsupported => "unsupported",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            ThemeAttribute::Color { .. }
            | ThemeAttribute::BackgroundColor { .. }
            | ThemeAttribute::Bold
            | ThemeAttribute::Italic
            | ThemeAttribute::Underline { .. }
            | ThemeAttribute::Kerning { .. }
            | ThemeAttribute::Ligature { .. }
            | ThemeAttribute::Action { .. } => Capability::Token,
            ThemeAttribute::HeadIndent { .. }
            | ThemeAttribute::TailIndent { .. }
            | ThemeAttribute::ParagraphSpacingBefore { .. }
            | ThemeAttribute::ParagraphSpacingAfter { .. }
            | ThemeAttribute::Alignment { .. }
            | ThemeAttribute::DefaultTabInterval { .. } => Capability::Line,
            ThemeAttribute::Unsupported => Capability::Unsupported,
        }
    }

    /// Write a token attribute over `range`; other capabilities are a no-op
    pub fn apply_to_range(&self, text: &mut StyledText, range: Range<usize>) {
        match self {
            ThemeAttribute::Color { color } => {
                text.set_attribute(range, AttributeValue::Foreground(*color));
            }
            ThemeAttribute::BackgroundColor {
                color,
                rounding,
                coloring,
            } => {
                // Rounded backgrounds are drawn by the renderer, not as a plain fill
                let value = if *rounding == RoundingStyle::None {
                    AttributeValue::Background(*color)
                } else {
                    AttributeValue::RoundedBackground(RoundedBackground {
                        color: *color,
                        rounding: *rounding,
                        coloring: *coloring,
                    })
                };
                text.set_attribute(range, value);
            }
            ThemeAttribute::Bold => text.set_attribute(range, AttributeValue::Bold),
            ThemeAttribute::Italic => text.set_attribute(range, AttributeValue::Italic),
            ThemeAttribute::Underline { color, style } => {
                text.set_attribute(range.clone(), AttributeValue::UnderlineStyle(*style));
                if let Some(color) = color {
                    text.set_attribute(range, AttributeValue::UnderlineColor(*color));
                }
            }
            ThemeAttribute::Kerning { value } => {
                text.set_attribute(range, AttributeValue::Kerning(*value));
            }
            ThemeAttribute::Ligature { value } => {
                text.set_attribute(range, AttributeValue::Ligature(*value));
            }
            ThemeAttribute::Action { link, handler } => {
                text.set_attribute(range.clone(), AttributeValue::Link(link.clone()));
                if let Some(handler) = handler {
                    text.set_attribute(range, AttributeValue::LinkHandler(handler.clone()));
                }
            }
            ThemeAttribute::HeadIndent { .. }
            | ThemeAttribute::TailIndent { .. }
            | ThemeAttribute::ParagraphSpacingBefore { .. }
            | ThemeAttribute::ParagraphSpacingAfter { .. }
            | ThemeAttribute::Alignment { .. }
            | ThemeAttribute::DefaultTabInterval { .. }
            | ThemeAttribute::Unsupported => {}
        }
    }

    /// Mutate the paragraph style for a line attribute; other capabilities are a no-op
    pub fn apply_to_paragraph(&self, style: &mut ParagraphStyle) {
        match self {
            ThemeAttribute::HeadIndent { value } => style.head_indent = *value,
            ThemeAttribute::TailIndent { value } => style.tail_indent = *value,
            ThemeAttribute::ParagraphSpacingBefore { value } => {
                style.paragraph_spacing_before = *value
            }
            ThemeAttribute::ParagraphSpacingAfter { value } => style.paragraph_spacing = *value,
            ThemeAttribute::Alignment { alignment } => style.alignment = *alignment,
            ThemeAttribute::DefaultTabInterval { value } => style.default_tab_interval = *value,
            ThemeAttribute::Color { .. }
            | ThemeAttribute::BackgroundColor { .. }
            | ThemeAttribute::Bold
            | ThemeAttribute::Italic
            | ThemeAttribute::Underline { .. }
            | ThemeAttribute::Kerning { .. }
            | ThemeAttribute::Ligature { .. }
            | ThemeAttribute::Action { .. }
            | ThemeAttribute::Unsupported => {}
        }
    }
}

/// Attributes merged per key, last write wins
///
/// Insertion order of distinct keys is preserved; overriding a key replaces
/// the value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSet {
    attributes: Vec<ThemeAttribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, attribute: ThemeAttribute) {
        match self
            .attributes
            .iter_mut()
            .find(|existing| existing.key() == attribute.key())
        {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn merge_all<'a>(&mut self, attributes: impl IntoIterator<Item = &'a ThemeAttribute>) {
        for attribute in attributes {
            self.merge(attribute.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&ThemeAttribute> {
        self.attributes.iter().find(|attribute| attribute.key() == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ThemeAttribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a ThemeAttribute;
    type IntoIter = std::slice::Iter<'a, ThemeAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

impl FromIterator<ThemeAttribute> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = ThemeAttribute>>(iter: I) -> Self {
        let mut set = AttributeSet::new();
        for attribute in iter {
            set.merge(attribute);
        }
        set
    }
}
