//! Placeholder substitution for the Dockerfile build recipes.
//!
//! Templates reference parameters as `{{ name }}` (inner whitespace is
//! optional).  Rendering fails on the first placeholder that has no
//! matching field in [`TemplateParams`] rather than leaving it in the
//! output, so a typo in a recipe never reaches the engine.

use crate::error::{Result, RunnerError};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Values available to build recipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParams {
    pub mongo_version: String,
}

impl TemplateParams {
    pub fn new(mongo_version: impl Into<String>) -> Self {
        Self {
            mongo_version: mongo_version.into(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "mongo_version" => Some(&self.mongo_version),
            _ => None,
        }
    }
}

/// Names of all placeholders `source` declares, in order of appearance.
pub fn placeholders(template: &str, source: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut rest = source;
    let mut consumed = 0;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open.find(CLOSE).ok_or(RunnerError::MalformedTemplate {
            template: template.to_string(),
            offset: consumed + start,
        })?;
        names.push(after_open[..end].trim().to_string());
        let advance = start + OPEN.len() + end + CLOSE.len();
        consumed += advance;
        rest = &rest[advance..];
    }
    Ok(names)
}

/// Substitutes every placeholder in `source`.  `template` names the recipe
/// in error messages.  All declared placeholders are checked against
/// `params` before any output is produced.
pub fn render(template: &str, source: &str, params: &TemplateParams) -> Result<String> {
    if let Some(missing) = placeholders(template, source)?
        .into_iter()
        .find(|name| params.lookup(name).is_none())
    {
        return Err(RunnerError::UnresolvedPlaceholder {
            template: template.to_string(),
            name: missing,
        });
    }

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        // Terminated and known: checked above.
        let end = after_open.find(CLOSE).unwrap_or(after_open.len());
        out.push_str(params.lookup(after_open[..end].trim()).unwrap_or_default());
        rest = after_open.get(end + CLOSE.len()..).unwrap_or_default();
    }
    out.push_str(rest);
    Ok(out)
}
