//! Highlight theme: ordered scope-to-attribute bindings and their resolution

use crate::primitives::scope_name::ScopeName;
use crate::view::theme::attribute::{AttributeSet, ThemeAttribute};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scope every theme must style, used as the fallback for unmatched text
pub const ROOT_SCOPE: &str = "source";

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("failed to read theme: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid theme JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid theme plist: {0}")]
    Plist(#[from] plist::Error),
    #[error("theme {theme:?}: {source}")]
    InvalidColor {
        theme: String,
        #[source]
        source: crate::view::color::ParseColorError,
    },
    #[error("theme {theme:?} has no setting for the root scope `source`")]
    MissingRootSetting { theme: String },
    #[error("unsupported theme file format: {path}")]
    UnsupportedFormat { path: String },
    #[error("no theme named {name:?}")]
    UnknownTheme { name: String },
}

/// One rule of a theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThemeSetting {
    /// Scope selector; matches this scope and every descendant
    pub scope: ScopeName,
    /// Scopes that must also be active in an enclosing context
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_scopes: Vec<ScopeName>,
    /// Unconditional styling
    #[serde(default)]
    pub attributes: Vec<ThemeAttribute>,
    /// Overlay applied when the text is inside the selection scope
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_selection_attributes: Vec<ThemeAttribute>,
    /// Overlay applied when the text is outside the selection scope
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_selection_attributes: Vec<ThemeAttribute>,
}

impl ThemeSetting {
    pub fn new(scope: impl Into<ScopeName>, attributes: Vec<ThemeAttribute>) -> Self {
        Self {
            scope: scope.into(),
            parent_scopes: Vec::new(),
            attributes,
            in_selection_attributes: Vec::new(),
            out_selection_attributes: Vec::new(),
        }
    }

    pub fn with_parents(mut self, parents: impl IntoIterator<Item = impl Into<ScopeName>>) -> Self {
        self.parent_scopes = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_selection_overlays(
        mut self,
        in_selection: Vec<ThemeAttribute>,
        out_selection: Vec<ThemeAttribute>,
    ) -> Self {
        self.in_selection_attributes = in_selection;
        self.out_selection_attributes = out_selection;
        self
    }

    /// Specificity of this setting against `scope` nested inside `parents`
    ///
    /// Returns `None` when the setting does not apply. Otherwise a deeper
    /// selector is more specific, then more parent constraints.
    pub fn specificity(&self, scope: &ScopeName, parents: &[&ScopeName]) -> Option<(usize, usize)> {
        if !self.scope.is_ancestor_or_equal(scope) {
            return None;
        }
        let parents_present = self.parent_scopes.iter().all(|required| {
            parents
                .iter()
                .any(|active| required.is_ancestor_or_equal(active))
        });
        parents_present.then(|| (self.scope.depth(), self.parent_scopes.len()))
    }

    fn is_root(&self) -> bool {
        self.parent_scopes.is_empty() && self.scope.as_str() == ROOT_SCOPE
    }
}

/// Attributes resolved for one scope, cached by the scope for its lifetime
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedStyle {
    pub attributes: AttributeSet,
    pub in_selection: AttributeSet,
    pub out_selection: AttributeSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightTheme {
    name: String,
    settings: Vec<ThemeSetting>,
}

impl HighlightTheme {
    /// Build a theme, rejecting it when nothing styles the root scope
    pub fn new(name: impl Into<String>, settings: Vec<ThemeSetting>) -> Result<Self, ThemeError> {
        let theme = Self {
            name: name.into(),
            settings,
        };
        if !theme.settings.iter().any(ThemeSetting::is_root) {
            return Err(ThemeError::MissingRootSetting { theme: theme.name });
        }
        Ok(theme)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &[ThemeSetting] {
        &self.settings
    }

    /// Resolve the style of `scope` nested inside `parents` (outermost first)
    ///
    /// Matching settings are applied from least to most specific, ties in
    /// declaration order, merging per attribute key so the last applied wins.
    pub fn resolve_scope(&self, scope: &ScopeName, parents: &[&ScopeName]) -> ResolvedStyle {
        let mut matches: Vec<((usize, usize), &ThemeSetting)> = self
            .settings
            .iter()
            .filter_map(|setting| {
                setting
                    .specificity(scope, parents)
                    .map(|specificity| (specificity, setting))
            })
            .collect();
        // Stable sort keeps declaration order among equally specific settings
        matches.sort_by_key(|(specificity, _)| *specificity);

        let mut resolved = ResolvedStyle::default();
        for (_, setting) in matches {
            resolved.attributes.merge_all(&setting.attributes);
            resolved.in_selection.merge_all(&setting.in_selection_attributes);
            resolved.out_selection.merge_all(&setting.out_selection_attributes);
        }
        resolved
    }

    /// Effective unconditional attributes for a whole scope stack
    ///
    /// Folds each scope's resolution from the outermost to the innermost, the
    /// same order the application pass writes them in.
    pub fn resolve_stack(&self, stack: &[ScopeName]) -> AttributeSet {
        let mut effective = AttributeSet::new();
        for (depth, scope) in stack.iter().enumerate() {
            let parents: Vec<&ScopeName> = stack[..depth].iter().collect();
            effective.merge_all(&self.resolve_scope(scope, &parents).attributes);
        }
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::color::Color;

    const BLACK: Color = Color::BLACK;
    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);
    const GREEN: Color = Color::rgb(0, 255, 0);

    fn theme(settings: Vec<ThemeSetting>) -> HighlightTheme {
        HighlightTheme::new("test", settings).unwrap()
    }

    #[test]
    fn test_missing_root_setting_is_rejected() {
        let err = HighlightTheme::new(
            "broken",
            vec![ThemeSetting::new("comment", vec![ThemeAttribute::color(GREEN)])],
        )
        .unwrap_err();
        assert!(matches!(err, ThemeError::MissingRootSetting { theme } if theme == "broken"));
    }

    #[test]
    fn test_most_specific_wins_regardless_of_order() {
        let theme = theme(vec![
            ThemeSetting::new("source.swift.keyword", vec![ThemeAttribute::color(BLUE)]),
            ThemeSetting::new("source", vec![ThemeAttribute::color(RED)]),
        ]);
        let keyword = ScopeName::new("source.swift.keyword");
        let resolved = theme.resolve_scope(&keyword, &[]);
        assert_eq!(resolved.attributes.get("color"), Some(&ThemeAttribute::color(BLUE)));

        let stack = [ScopeName::new("source"), keyword];
        assert_eq!(
            theme.resolve_stack(&stack).get("color"),
            Some(&ThemeAttribute::color(BLUE))
        );
    }

    #[test]
    fn test_non_conflicting_keys_compose() {
        let theme = theme(vec![
            ThemeSetting::new("source", vec![ThemeAttribute::color(BLACK)]),
            ThemeSetting::new("keyword", vec![ThemeAttribute::color(RED)]),
            ThemeSetting::new("keyword", vec![ThemeAttribute::Bold]),
        ]);
        let resolved = theme.resolve_scope(&"keyword".into(), &[]);
        assert_eq!(resolved.attributes.len(), 2);
        assert_eq!(resolved.attributes.get("color"), Some(&ThemeAttribute::color(RED)));
        assert_eq!(resolved.attributes.get("bold"), Some(&ThemeAttribute::Bold));
    }

    #[test]
    fn test_parent_scopes_must_be_active() {
        let theme = theme(vec![
            ThemeSetting::new("source", vec![ThemeAttribute::color(BLACK)]),
            ThemeSetting::new("string", vec![ThemeAttribute::color(GREEN)])
                .with_parents(["meta.embedded"]),
        ]);
        let string = ScopeName::new("string.quoted");
        let source = ScopeName::new("source.test");
        let embedded = ScopeName::new("meta.embedded.block");

        assert!(theme.resolve_scope(&string, &[&source]).attributes.is_empty());
        assert_eq!(
            theme
                .resolve_scope(&string, &[&source, &embedded])
                .attributes
                .get("color"),
            Some(&ThemeAttribute::color(GREEN))
        );
    }

    #[test]
    fn test_selection_overlays_resolved_separately() {
        let theme = theme(vec![ThemeSetting::new("source", vec![ThemeAttribute::color(BLACK)])
            .with_selection_overlays(
                vec![ThemeAttribute::background(BLUE)],
                vec![ThemeAttribute::color(RED)],
            )]);
        let resolved = theme.resolve_scope(&"source.rust".into(), &[]);
        assert_eq!(resolved.attributes.get("color"), Some(&ThemeAttribute::color(BLACK)));
        assert_eq!(
            resolved.in_selection.get("background_color"),
            Some(&ThemeAttribute::background(BLUE))
        );
        assert_eq!(resolved.out_selection.get("color"), Some(&ThemeAttribute::color(RED)));
    }

    #[test]
    fn test_unmatched_scope_resolves_empty() {
        let theme = theme(vec![ThemeSetting::new("source", vec![ThemeAttribute::color(BLACK)])]);
        assert_eq!(
            theme.resolve_scope(&"text.plain".into(), &[]),
            ResolvedStyle::default()
        );
    }
}
