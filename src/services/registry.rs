//! Named themes: the built-in default plus whatever the theme directories hold

use crate::config::ThemingConfig;
use crate::view::color::Color;
use crate::view::styled_text::UnderlineStyle;
use crate::view::theme::{HighlightTheme, ThemeAttribute, ThemeError, ThemeSetting};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_THEME: &str = "default";

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    themes: BTreeMap<String, Arc<HighlightTheme>>,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeRegistry {
    /// A registry holding only the built-in theme
    pub fn new() -> Self {
        let mut registry = Self {
            themes: BTreeMap::new(),
        };
        registry.insert(builtin_default());
        registry
    }

    /// Built-in theme plus every theme in `config.theme_dirs`
    pub fn from_config(config: &ThemingConfig) -> Self {
        let mut registry = Self::new();
        registry.load_dirs(&config.theme_dirs);
        registry
    }

    /// Add or replace a theme under its own name
    pub fn insert(&mut self, theme: HighlightTheme) -> Arc<HighlightTheme> {
        let theme = Arc::new(theme);
        self.themes.insert(theme.name().to_string(), theme.clone());
        theme
    }

    /// Load every theme file in `dirs`, returning how many loaded
    ///
    /// Unreadable directories and broken files are logged and skipped.
    pub fn load_dirs(&mut self, dirs: &[PathBuf]) -> usize {
        let mut loaded = 0;
        for dir in dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("cannot read theme directory {}: {e}", dir.display());
                    continue;
                }
            };
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.is_file() && is_theme_file(path))
                .collect();
            paths.sort();

            for path in paths {
                match HighlightTheme::load(&path) {
                    Ok(theme) => {
                        tracing::debug!("loaded theme {:?} from {}", theme.name(), path.display());
                        self.insert(theme);
                        loaded += 1;
                    }
                    Err(e) => tracing::warn!("failed to load theme {}: {e}", path.display()),
                }
            }
        }
        loaded
    }

    pub fn get(&self, name: &str) -> Option<Arc<HighlightTheme>> {
        self.themes.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.themes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Look up a theme by name, or load it when `name_or_path` is a file
    pub fn resolve(&self, name_or_path: &str) -> Result<Arc<HighlightTheme>, ThemeError> {
        if let Some(theme) = self.get(name_or_path) {
            return Ok(theme);
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return HighlightTheme::load(path).map(Arc::new);
        }
        Err(ThemeError::UnknownTheme {
            name: name_or_path.to_string(),
        })
    }
}

fn is_theme_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json" | "tmTheme" | "plist")
    )
}

/// Dark theme used when nothing else is configured
pub fn builtin_default() -> HighlightTheme {
    let hex = |r, g, b| Color::rgb(r, g, b);
    let settings = vec![
        ThemeSetting::new("source", vec![ThemeAttribute::color(hex(0xD4, 0xD4, 0xD4))])
            .with_selection_overlays(
                vec![ThemeAttribute::background(hex(0x26, 0x4F, 0x78))],
                Vec::new(),
            ),
        ThemeSetting::new("text", vec![ThemeAttribute::color(hex(0xD4, 0xD4, 0xD4))]),
        ThemeSetting::new(
            "comment",
            vec![ThemeAttribute::color(hex(0x6A, 0x99, 0x55)), ThemeAttribute::Italic],
        ),
        ThemeSetting::new("string", vec![ThemeAttribute::color(hex(0xCE, 0x91, 0x78))]),
        ThemeSetting::new("constant", vec![ThemeAttribute::color(hex(0xB5, 0xCE, 0xA8))]),
        ThemeSetting::new("constant.character.escape", vec![ThemeAttribute::color(hex(0xD7, 0xBA, 0x7D))]),
        ThemeSetting::new(
            "keyword",
            vec![ThemeAttribute::color(hex(0x56, 0x9C, 0xD6)), ThemeAttribute::Bold],
        ),
        ThemeSetting::new("storage", vec![ThemeAttribute::color(hex(0x56, 0x9C, 0xD6))]),
        ThemeSetting::new("entity.name.function", vec![ThemeAttribute::color(hex(0xDC, 0xDC, 0xAA))]),
        ThemeSetting::new("entity.name.type", vec![ThemeAttribute::color(hex(0x4E, 0xC9, 0xB0))]),
        ThemeSetting::new("variable", vec![ThemeAttribute::color(hex(0x9C, 0xDC, 0xFE))]),
        ThemeSetting::new(
            "invalid",
            vec![ThemeAttribute::Underline {
                color: Some(hex(0xF4, 0x47, 0x47)),
                style: UnderlineStyle::Single,
            }],
        ),
    ];
    match HighlightTheme::new(DEFAULT_THEME, settings) {
        Ok(theme) => theme,
        Err(e) => unreachable!("built-in theme is invalid: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_default() {
        let registry = ThemeRegistry::new();
        assert_eq!(registry.names().collect::<Vec<_>>(), [DEFAULT_THEME]);
        let theme = registry.resolve(DEFAULT_THEME).unwrap();
        assert_eq!(theme.name(), DEFAULT_THEME);
    }

    #[test]
    fn test_unknown_theme() {
        let registry = ThemeRegistry::new();
        assert!(matches!(
            registry.resolve("no-such-theme"),
            Err(ThemeError::UnknownTheme { name }) if name == "no-such-theme"
        ));
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let mut registry = ThemeRegistry::new();
        assert_eq!(registry.load_dirs(&[PathBuf::from("/nonexistent/themes")]), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtin_default_styles_comments() {
        let theme = builtin_default();
        let comment = theme.resolve_stack(&["source.rust".into(), "comment.line".into()]);
        assert_eq!(comment.get("italic"), Some(&ThemeAttribute::Italic));
        assert_eq!(
            comment.get("color"),
            Some(&ThemeAttribute::color(Color::rgb(0x6A, 0x99, 0x55)))
        );
    }
}
