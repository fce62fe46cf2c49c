//! Scopes and the per-line scope stack
//!
//! A [`Scope`] is one level of nesting at some point in a document. Its theme
//! style is resolved once, when the scope is created, so tokens sharing a
//! scope share the resolution. The [`LineState`] at the end of a line is what
//! the next line starts from.

use crate::primitives::grammar::{BeginEndPattern, PatternRegex, Rule};
use crate::primitives::scope_name::ScopeName;
use crate::view::theme::{AttributeSet, HighlightTheme, ResolvedStyle};
use std::sync::Arc;

#[derive(Debug)]
pub struct Scope {
    name: Option<ScopeName>,
    rules: Vec<Rule>,
    end: Option<Arc<PatternRegex>>,
    opened_by: Option<Arc<BeginEndPattern>>,
    is_content: bool,
    style: ResolvedStyle,
}

impl Scope {
    /// A scope nested in `parents` (outermost first), styled by `theme`
    pub fn new(name: Option<ScopeName>, parents: &[Arc<Scope>], theme: &HighlightTheme) -> Self {
        let style = match &name {
            Some(name) => {
                let parent_names: Vec<&ScopeName> =
                    parents.iter().filter_map(|scope| scope.name()).collect();
                theme.resolve_scope(name, &parent_names)
            }
            None => ResolvedStyle::default(),
        };
        Self {
            name,
            rules: Vec::new(),
            end: None,
            opened_by: None,
            is_content: false,
            style,
        }
    }

    /// Rules that can match while this scope is innermost
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Region scope closed by `end`
    pub fn with_end(mut self, end: Arc<PatternRegex>, opened_by: Arc<BeginEndPattern>) -> Self {
        self.end = Some(end);
        self.opened_by = Some(opened_by);
        self
    }

    /// Mark as the `contentName` scope of the region below it
    pub fn as_content(mut self) -> Self {
        self.is_content = true;
        self
    }

    pub fn name(&self) -> Option<&ScopeName> {
        self.name.as_ref()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn end(&self) -> Option<&PatternRegex> {
        self.end.as_deref()
    }

    pub fn opened_by(&self) -> Option<&Arc<BeginEndPattern>> {
        self.opened_by.as_ref()
    }

    pub fn is_content(&self) -> bool {
        self.is_content
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.style.attributes
    }

    pub fn in_selection_attributes(&self) -> &AttributeSet {
        &self.style.in_selection
    }

    pub fn out_selection_attributes(&self) -> &AttributeSet {
        &self.style.out_selection
    }

    /// Same name, same region, same end regex
    fn is_equivalent(&self, other: &Scope) -> bool {
        let same_region = match (&self.opened_by, &other.opened_by) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.name == other.name
            && self.is_content == other.is_content
            && same_region
            && self.end().map(PatternRegex::as_str) == other.end().map(PatternRegex::as_str)
    }
}

/// Scope stack at a line boundary, outermost first
#[derive(Debug, Clone)]
pub struct LineState {
    stack: Vec<Arc<Scope>>,
}

impl LineState {
    pub fn new(root: Scope) -> Self {
        Self {
            stack: vec![Arc::new(root)],
        }
    }

    pub(crate) fn from_stack(stack: Vec<Arc<Scope>>) -> Self {
        debug_assert!(!stack.is_empty(), "line state lost its root scope");
        Self { stack }
    }

    pub fn stack(&self) -> &[Arc<Scope>] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Scope names from the outermost in, skipping anonymous scopes
    pub fn scope_names(&self) -> Vec<&ScopeName> {
        self.stack.iter().filter_map(|scope| scope.name()).collect()
    }

    /// Whether lines after this one would tokenize the same as after `other`
    pub fn is_equivalent(&self, other: &LineState) -> bool {
        self.stack.len() == other.stack.len()
            && self
                .stack
                .iter()
                .zip(&other.stack)
                .all(|(a, b)| Arc::ptr_eq(a, b) || a.is_equivalent(b))
    }
}
