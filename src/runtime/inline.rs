//! Inline rewrite rules: regex substitutions run over token and default-line output, so
//! `*bold*` style markup can be configured per site.

use regex::Regex;

use crate::errors::BobbinError;

#[derive(Debug, Clone)]
struct InlineRule {
    pattern: Regex,
    template: String,
}

/// An ordered list of `pattern -> template` substitutions. Templates use the regex
/// crate's `$1` / `${name}` capture syntax.
#[derive(Debug, Clone, Default)]
pub struct InlineRules {
    rules: Vec<InlineRule>,
}

impl InlineRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pattern: &str, template: impl Into<String>) -> Result<(), BobbinError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| BobbinError::config(format!("inline pattern {pattern:?}: {e}")))?;
        self.rules.push(InlineRule {
            pattern,
            template: template.into(),
        });
        Ok(())
    }

    /// Runs every rule over `text`, in declaration order.
    pub fn apply(&self, text: String) -> String {
        self.rules.iter().fold(text, |text, rule| {
            rule.pattern
                .replace_all(&text, rule.template.as_str())
                .into_owned()
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
