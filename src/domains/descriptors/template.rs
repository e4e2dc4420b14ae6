//! URI templates for resources.
//!
//! Supports the subset of RFC 6570 that resource authors need:
//! `{name}` matches a single path segment and `{+name}` (reserved expansion)
//! matches the rest of the URI including `/`.

use regex::Regex;
use std::fmt;

use super::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, reserved: bool },
}

/// A parsed, matchable URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
    placeholders: Vec<String>,
    pattern: Regex,
}

impl UriTemplate {
    /// Parse a template such as `file://data/{id}`.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::UnbalancedBraces(pos)),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::UnbalancedBraces(pos));
                    }

                    let (name, reserved) = match name.strip_prefix('+') {
                        Some(rest) => (rest.to_string(), true),
                        None => (name, false),
                    };
                    if !is_valid_name(&name) {
                        return Err(TemplateError::InvalidPlaceholder(name));
                    }
                    if placeholders.contains(&name) {
                        return Err(TemplateError::DuplicatePlaceholder(name));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    placeholders.push(name.clone());
                    segments.push(Segment::Placeholder { name, reserved });
                }
                '}' => return Err(TemplateError::UnbalancedBraces(pos)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let pattern = build_pattern(&segments);

        Ok(Self {
            raw: raw.to_string(),
            segments,
            placeholders,
            pattern,
        })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// A template without placeholders addresses exactly one resource.
    pub fn is_concrete(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Match a URI and extract placeholder values in template order.
    pub fn matches(&self, uri: &str) -> Option<Vec<(String, String)>> {
        let captures = self.pattern.captures(uri)?;
        self.placeholders
            .iter()
            .enumerate()
            .map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect()
    }

    /// Expand the template with the given values.
    pub fn expand(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Placeholder { name, .. } => lookup(name).unwrap_or_default(),
            })
            .collect()
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for UriTemplate {}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn build_pattern(segments: &[Segment]) -> Regex {
    let mut pattern = String::from("^");
    for segment in segments {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder { reserved: false, .. } => pattern.push_str("([^/]+)"),
            Segment::Placeholder { reserved: true, .. } => pattern.push_str("(.+)"),
        }
    }
    pattern.push('$');
    // Literals are escaped and placeholders use fixed groups.
    Regex::new(&pattern).unwrap_or_else(|e| unreachable!("generated pattern is invalid: {e}"))
}
