//! Mutable styled text buffer
//!
//! This is the output side of the theming pass: a string plus per-key
//! attribute spans, in the manner of an attributed string. Setting an attribute
//! over a range overwrites any value for the same key inside that range and
//! leaves other keys untouched, so later writes win per key.
//!
//! Offsets are UTF-8 byte offsets into the text.

use crate::view::color::Color;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// How a rounded background rectangle is cornered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundingStyle {
    #[default]
    None,
    Full,
    Half,
    Quarter,
}

/// Whether a background covers the whole line or only the text glyphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ColoringStyle {
    Line,
    #[default]
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnderlineStyle {
    #[default]
    Single,
    Thick,
    Double,
    Dotted,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    #[default]
    Natural,
    Left,
    Right,
    Center,
    Justified,
}

/// Descriptor for a rounded background, drawn by the rendering layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedBackground {
    pub color: Color,
    pub rounding: RoundingStyle,
    pub coloring: ColoringStyle,
}

/// Line-level formatting shared by every token of a line
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParagraphStyle {
    pub alignment: TextAlignment,
    pub head_indent: f32,
    pub tail_indent: f32,
    pub paragraph_spacing_before: f32,
    pub paragraph_spacing: f32,
    pub default_tab_interval: f32,
}

/// Click handler attached to a link attribute
///
/// Handlers are runtime-only: they are compared by identity and never
/// persisted.
#[derive(Clone)]
pub struct ActionHandler(Arc<dyn Fn(&str) + Send + Sync>);

impl ActionHandler {
    pub fn new(handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(handler))
    }

    /// Invoke the handler with the link it was attached to
    pub fn invoke(&self, link: &str) {
        (self.0)(link)
    }
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionHandler(..)")
    }
}

impl PartialEq for ActionHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Native attribute keys of the styled text buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKey {
    Foreground,
    Background,
    RoundedBackground,
    Bold,
    Italic,
    UnderlineStyle,
    UnderlineColor,
    Kerning,
    Ligature,
    Link,
    LinkHandler,
    ParagraphStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Foreground(Color),
    Background(Color),
    RoundedBackground(RoundedBackground),
    Bold,
    Italic,
    UnderlineStyle(UnderlineStyle),
    UnderlineColor(Color),
    Kerning(f32),
    Ligature(u8),
    Link(String),
    LinkHandler(ActionHandler),
    ParagraphStyle(ParagraphStyle),
}

impl AttributeValue {
    pub fn key(&self) -> AttributeKey {
        match self {
            AttributeValue::Foreground(_) => AttributeKey::Foreground,
            AttributeValue::Background(_) => AttributeKey::Background,
            AttributeValue::RoundedBackground(_) => AttributeKey::RoundedBackground,
            AttributeValue::Bold => AttributeKey::Bold,
            AttributeValue::Italic => AttributeKey::Italic,
            AttributeValue::UnderlineStyle(_) => AttributeKey::UnderlineStyle,
            AttributeValue::UnderlineColor(_) => AttributeKey::UnderlineColor,
            AttributeValue::Kerning(_) => AttributeKey::Kerning,
            AttributeValue::Ligature(_) => AttributeKey::Ligature,
            AttributeValue::Link(_) => AttributeKey::Link,
            AttributeValue::LinkHandler(_) => AttributeKey::LinkHandler,
            AttributeValue::ParagraphStyle(_) => AttributeKey::ParagraphStyle,
        }
    }
}

/// Sorted, non-overlapping spans of one attribute key
#[derive(Debug, Clone, Default)]
struct SpanList {
    spans: Vec<(Range<usize>, AttributeValue)>,
}

impl SpanList {
    fn remove(&mut self, range: &Range<usize>) {
        let mut kept = Vec::with_capacity(self.spans.len() + 1);
        for (span, value) in self.spans.drain(..) {
            if span.end <= range.start || span.start >= range.end {
                kept.push((span, value));
                continue;
            }
            if span.start < range.start {
                kept.push((span.start..range.start, value.clone()));
            }
            if span.end > range.end {
                kept.push((range.end..span.end, value));
            }
        }
        self.spans = kept;
    }

    fn set(&mut self, range: Range<usize>, value: AttributeValue) {
        self.remove(&range);
        let idx = self.spans.partition_point(|(span, _)| span.start < range.start);
        self.spans.insert(idx, (range, value));
    }

    fn get(&self, offset: usize) -> Option<&AttributeValue> {
        let idx = self.spans.partition_point(|(span, _)| span.end <= offset);
        self.spans
            .get(idx)
            .filter(|(span, _)| span.contains(&offset))
            .map(|(_, value)| value)
    }
}

/// A run of text over which every attribute is constant
#[derive(Debug, Clone)]
pub struct StyledRun<'a> {
    pub range: Range<usize>,
    pub text: &'a str,
    pub attributes: Vec<&'a AttributeValue>,
}

impl StyledRun<'_> {
    pub fn get(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes.iter().copied().find(|value| value.key() == key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyledText {
    text: String,
    layers: BTreeMap<AttributeKey, SpanList>,
}

impl StyledText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            layers: BTreeMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append unstyled text, returning the offset it starts at
    pub fn push_str(&mut self, text: &str) -> usize {
        let start = self.text.len();
        self.text.push_str(text);
        start
    }

    /// Set `value` over `range`, replacing any value with the same key there
    ///
    /// Empty ranges are ignored. The range is clamped to the text length.
    pub fn set_attribute(&mut self, range: Range<usize>, value: AttributeValue) {
        let range = self.clamp(range);
        if range.is_empty() {
            return;
        }
        self.layers.entry(value.key()).or_default().set(range, value);
    }

    pub fn remove_attribute(&mut self, key: AttributeKey, range: Range<usize>) {
        let range = self.clamp(range);
        if let Some(layer) = self.layers.get_mut(&key) {
            layer.remove(&range);
        }
    }

    /// Remove every attribute over `range`
    pub fn clear_attributes(&mut self, range: Range<usize>) {
        let range = self.clamp(range);
        if range.is_empty() {
            return;
        }
        for layer in self.layers.values_mut() {
            layer.remove(&range);
        }
    }

    pub fn attribute(&self, key: AttributeKey, offset: usize) -> Option<&AttributeValue> {
        self.layers.get(&key).and_then(|layer| layer.get(offset))
    }

    /// Every attribute in effect at `offset`
    pub fn attributes_at(&self, offset: usize) -> BTreeMap<AttributeKey, AttributeValue> {
        self.layers
            .iter()
            .filter_map(|(key, layer)| layer.get(offset).map(|value| (*key, value.clone())))
            .collect()
    }

    pub fn paragraph_style_at(&self, offset: usize) -> Option<&ParagraphStyle> {
        match self.attribute(AttributeKey::ParagraphStyle, offset) {
            Some(AttributeValue::ParagraphStyle(style)) => Some(style),
            _ => None,
        }
    }

    pub fn foreground_at(&self, offset: usize) -> Option<Color> {
        match self.attribute(AttributeKey::Foreground, offset) {
            Some(AttributeValue::Foreground(color)) => Some(*color),
            _ => None,
        }
    }

    /// Split `range` into runs of constant attributes
    pub fn runs_in(&self, range: Range<usize>) -> Vec<StyledRun<'_>> {
        let range = self.clamp(range);
        let mut bounds = vec![range.start, range.end];
        for layer in self.layers.values() {
            for (span, _) in &layer.spans {
                for bound in [span.start, span.end] {
                    if bound > range.start && bound < range.end {
                        bounds.push(bound);
                    }
                }
            }
        }
        bounds.sort_unstable();
        bounds.dedup();

        bounds
            .windows(2)
            .map(|pair| {
                let run = pair[0]..pair[1];
                let attributes = self
                    .layers
                    .values()
                    .filter_map(|layer| layer.get(run.start))
                    .collect();
                StyledRun {
                    text: &self.text[run.clone()],
                    range: run,
                    attributes,
                }
            })
            .collect()
    }

    pub fn runs(&self) -> Vec<StyledRun<'_>> {
        self.runs_in(0..self.text.len())
    }

    fn clamp(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.text.len());
        range.start.min(end)..end
    }
}
