//! Theme file loading
//!
//! Two formats are understood:
//!
//! - the native JSON format ([`ThemeFile`]), which round-trips every attribute
//! - TextMate `.tmTheme` property lists, converted into settings
//!
//! Both go through [`HighlightTheme::new`], so a theme without a root setting
//! is rejected at load time.

use crate::primitives::scope_name::ScopeName;
use crate::view::color::Color;
use crate::view::styled_text::UnderlineStyle;
use crate::view::theme::attribute::ThemeAttribute;
use crate::view::theme::types::{HighlightTheme, ThemeError, ThemeSetting, ROOT_SCOPE};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Native on-disk theme format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThemeFile {
    pub name: String,
    pub settings: Vec<ThemeSetting>,
}

impl From<&HighlightTheme> for ThemeFile {
    fn from(theme: &HighlightTheme) -> Self {
        Self {
            name: theme.name().to_string(),
            settings: theme.settings().to_vec(),
        }
    }
}

impl TryFrom<ThemeFile> for HighlightTheme {
    type Error = ThemeError;

    fn try_from(file: ThemeFile) -> Result<Self, Self::Error> {
        HighlightTheme::new(file.name, file.settings)
    }
}

#[derive(Debug, Deserialize)]
struct TmTheme {
    #[serde(default)]
    name: Option<String>,
    settings: Vec<TmThemeEntry>,
}

#[derive(Debug, Deserialize)]
struct TmThemeEntry {
    #[serde(default)]
    scope: Option<String>,
    settings: TmThemeStyle,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmThemeStyle {
    foreground: Option<String>,
    background: Option<String>,
    font_style: Option<String>,
}

impl HighlightTheme {
    pub fn from_json_str(json: &str) -> Result<Self, ThemeError> {
        let file: ThemeFile = serde_json::from_str(json)?;
        file.try_into()
    }

    pub fn to_json_string(&self) -> Result<String, ThemeError> {
        Ok(serde_json::to_string_pretty(&ThemeFile::from(self))?)
    }

    /// Convert a TextMate `.tmTheme` property list
    ///
    /// `fallback_name` is used when the plist has no `name` key.
    pub fn from_tmtheme_bytes(bytes: &[u8], fallback_name: &str) -> Result<Self, ThemeError> {
        let tm: TmTheme = plist::from_bytes(bytes)?;
        let name = tm.name.unwrap_or_else(|| fallback_name.to_string());

        let mut settings = Vec::new();
        for entry in &tm.settings {
            let attributes = tm_attributes(&entry.settings).map_err(|source| {
                ThemeError::InvalidColor {
                    theme: name.clone(),
                    source,
                }
            })?;

            match entry.scope.as_deref().map(str::trim) {
                // The global entry styles every root scope
                None | Some("") => {
                    for root in [ROOT_SCOPE, "text"] {
                        settings.push(ThemeSetting::new(root, attributes.clone()));
                    }
                }
                Some(selectors) => {
                    for selector in selectors.split(',') {
                        if let Some(setting) = tm_setting(selector, &attributes) {
                            settings.push(setting);
                        }
                    }
                }
            }
        }

        HighlightTheme::new(name, settings)
    }

    /// Load a theme file, choosing the format by extension
    ///
    /// JSON themes must be valid UTF-8.
    pub fn load(path: &Path) -> Result<Self, ThemeError> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("untitled");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?),
            Some("tmTheme") | Some("plist") => Self::from_tmtheme_bytes(&std::fs::read(path)?, stem),
            _ => Err(ThemeError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

fn tm_attributes(
    style: &TmThemeStyle,
) -> Result<Vec<ThemeAttribute>, crate::view::color::ParseColorError> {
    let mut attributes = Vec::new();
    if let Some(foreground) = &style.foreground {
        attributes.push(ThemeAttribute::color(foreground.parse::<Color>()?));
    }
    if let Some(background) = &style.background {
        attributes.push(ThemeAttribute::background(background.parse::<Color>()?));
    }
    for flag in style.font_style.as_deref().unwrap_or_default().split_whitespace() {
        match flag {
            "bold" => attributes.push(ThemeAttribute::Bold),
            "italic" => attributes.push(ThemeAttribute::Italic),
            "underline" => attributes.push(ThemeAttribute::Underline {
                color: None,
                style: UnderlineStyle::Single,
            }),
            other => tracing::debug!("ignoring tmTheme font style {other:?}"),
        }
    }
    Ok(attributes)
}

/// `meta.tag string.quoted` becomes scope `string.quoted` with parent `meta.tag`
fn tm_setting(selector: &str, attributes: &[ThemeAttribute]) -> Option<ThemeSetting> {
    let selector = selector.trim();
    if selector.is_empty() {
        return None;
    }
    if selector.contains(['-', '|', '(', '&']) && selector.split_whitespace().any(is_operator) {
        tracing::warn!("skipping unsupported tmTheme selector {selector:?}");
        return None;
    }

    let mut path: Vec<&str> = selector.split_whitespace().collect();
    let scope = path.pop()?;
    Some(
        ThemeSetting::new(scope, attributes.to_vec())
            .with_parents(path.into_iter().map(ScopeName::new)),
    )
}

fn is_operator(part: &str) -> bool {
    matches!(part, "-" | "|" | "&" | "(" | ")") || part.starts_with('-') || part.starts_with('(')
}
