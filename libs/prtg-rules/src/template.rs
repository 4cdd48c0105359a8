//! Format templates with `{entity.<field>}` / `{parent.<field>}` placeholders
//!
//! Two operations are provided:
//! - [`Template::render`]: substitute every placeholder with a value
//! - [`Template::extract`]: reverse a rendered string, recovering the value
//!   that one target placeholder had when the template was applied
//!
//! Extraction builds an anchored regex: literal fragments are escaped, each
//! occurrence of the target placeholder becomes a greedy capture group, and
//! every other placeholder becomes either its known value (escaped) or a lazy
//! wildcard. All captures of the target must agree.

use regex::Regex;
use std::fmt;

use crate::error::TemplateError;

/// Object a placeholder reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    Entity,
    Parent,
}

impl Root {
    fn as_str(self) -> &'static str {
        match self {
            Root::Entity => "entity",
            Root::Parent => "parent",
        }
    }
}

/// `{root.field}` reference inside a template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    pub root: Root,
    pub field: String,
}

impl Placeholder {
    pub fn entity(field: impl Into<String>) -> Self {
        Self {
            root: Root::Entity,
            field: field.into(),
        }
    }

    pub fn parent(field: impl Into<String>) -> Self {
        Self {
            root: Root::Parent,
            field: field.into(),
        }
    }

    fn parse(body: &str) -> Result<Self, TemplateError> {
        let invalid = || TemplateError::InvalidPlaceholder(body.to_string());
        let (root, field) = body.split_once('.').ok_or_else(invalid)?;
        let root = match root.trim() {
            "entity" => Root::Entity,
            "parent" => Root::Parent,
            _ => return Err(invalid()),
        };
        let field = field.trim();
        if field.is_empty()
            || !field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid());
        }
        Ok(Self {
            root,
            field: field.to_string(),
        })
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}.{}}}", self.root.as_str(), self.field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// Outcome of reversing a rendered value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The value had the template's shape; carries the recovered target value
    Matched(String),
    /// The value does not have the template's shape
    NoMatch,
    /// The target occurs several times and the occurrences disagree
    Inconsistent(Vec<String>),
}

/// Parsed format template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template; `{{` and `}}` are literal braces
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                },
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                },
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        if inner == '{' {
                            return Err(TemplateError::Unterminated(offset));
                        }
                        body.push(inner);
                    }
                    if !closed {
                        return Err(TemplateError::Unterminated(offset));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(Placeholder::parse(&body)?));
                },
                '}' => return Err(TemplateError::UnmatchedBrace(offset)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholders in order of appearance (duplicates included)
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(placeholder) => Some(placeholder),
            Segment::Literal(_) => None,
        })
    }

    pub fn contains(&self, placeholder: &Placeholder) -> bool {
        self.placeholders().any(|p| p == placeholder)
    }

    /// Substitute every placeholder with the value given by `resolve`
    pub fn render<F>(&self, mut resolve: F) -> Result<String, TemplateError>
    where
        F: FnMut(&Placeholder) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(placeholder) => {
                    let value = resolve(placeholder)
                        .ok_or_else(|| TemplateError::MissingValue(placeholder.to_string()))?;
                    out.push_str(&value);
                },
            }
        }
        Ok(out)
    }

    /// Recover the value of `target` from a string this template rendered
    ///
    /// `fill` supplies known values for the other placeholders; placeholders
    /// it returns `None` for match anything.
    pub fn extract<F>(
        &self,
        target: &Placeholder,
        text: &str,
        mut fill: F,
    ) -> Result<Extraction, TemplateError>
    where
        F: FnMut(&Placeholder) -> Option<String>,
    {
        if !self.contains(target) {
            return Err(TemplateError::MissingTarget(target.to_string()));
        }

        let mut pattern = String::from("(?s)^");
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Field(placeholder) if placeholder == target => pattern.push_str("(.*)"),
                Segment::Field(placeholder) => match fill(placeholder) {
                    Some(value) => pattern.push_str(&regex::escape(&value)),
                    None => pattern.push_str(".*"),
                },
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| TemplateError::Pattern(e.to_string()))?;
        let Some(captures) = regex.captures(text) else {
            return Ok(Extraction::NoMatch);
        };

        let values: Vec<String> = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();

        match values.split_first() {
            Some((first, rest)) if rest.iter().all(|v| v == first) => {
                Ok(Extraction::Matched(first.clone()))
            },
            Some(_) => Ok(Extraction::Inconsistent(values)),
            None => Ok(Extraction::NoMatch),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn values(p: &Placeholder) -> Option<String> {
        match (p.root, p.field.as_str()) {
            (Root::Parent, "name") => Some("Core".to_string()),
            (Root::Entity, "name") => Some("switch-01".to_string()),
            (Root::Entity, "objid") => Some("2001".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_parse_segments_and_escapes() {
        let template = Template::parse("{{literal}} {parent.name} - {entity.name}").unwrap();
        let placeholders: Vec<_> = template.placeholders().cloned().collect();
        assert_eq!(
            placeholders,
            vec![Placeholder::parent("name"), Placeholder::entity("name")]
        );
        assert_eq!(template.render(values).unwrap(), "{literal} Core - switch-01");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Template::parse("{entity.name"),
            Err(TemplateError::Unterminated(0))
        ));
        assert!(matches!(
            Template::parse("a } b"),
            Err(TemplateError::UnmatchedBrace(2))
        ));
        assert!(matches!(
            Template::parse("{map.name}"),
            Err(TemplateError::InvalidPlaceholder(_))
        ));
        assert!(matches!(
            Template::parse("{entity}"),
            Err(TemplateError::InvalidPlaceholder(_))
        ));
        assert!(matches!(
            Template::parse("{entity.na-me}"),
            Err(TemplateError::InvalidPlaceholder(_))
        ));
    }

    #[test]
    fn test_render_missing_value() {
        let template = Template::parse("{parent.location}").unwrap();
        let err = template.render(values).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No value for placeholder {parent.location}"
        );
    }

    #[test]
    fn test_extract_with_wildcards() {
        let template = Template::parse("{parent.name} - {entity.name}").unwrap();
        let target = Placeholder::entity("name");

        let result = template.extract(&target, "Core - switch-01", |_| None).unwrap();
        assert_eq!(result, Extraction::Matched("switch-01".to_string()));

        // Greedy wildcard: the other placeholder takes everything up to the last separator
        let result = template.extract(&target, "Europe - West - sw01", |_| None).unwrap();
        assert_eq!(result, Extraction::Matched("sw01".to_string()));

        let result = template.extract(&target, "switch-01", |_| None).unwrap();
        assert_eq!(result, Extraction::NoMatch);
    }

    #[test]
    fn test_extract_with_known_values() {
        let template = Template::parse("{parent.name} - {entity.name}").unwrap();
        let target = Placeholder::entity("name");
        let parent_only = |p: &Placeholder| match p.root {
            Root::Parent => Some("Core".to_string()),
            Root::Entity => None,
        };

        let result = template.extract(&target, "Core - x", parent_only).unwrap();
        assert_eq!(result, Extraction::Matched("x".to_string()));

        let result = template.extract(&target, "Edge - x", parent_only).unwrap();
        assert_eq!(result, Extraction::NoMatch);
    }

    #[test]
    fn test_extract_escapes_regex_metacharacters() {
        let template = Template::parse("[{entity.name}] (*)").unwrap();
        let target = Placeholder::entity("name");
        let result = template.extract(&target, "[web] (*)", |_| None).unwrap();
        assert_eq!(result, Extraction::Matched("web".to_string()));
        let result = template.extract(&target, "[web] (x)", |_| None).unwrap();
        assert_eq!(result, Extraction::NoMatch);
    }

    #[test]
    fn test_extract_repeated_target_consistency() {
        let template = Template::parse("{entity.name}/{entity.name}").unwrap();
        let target = Placeholder::entity("name");

        let result = template.extract(&target, "ab/ab", |_| None).unwrap();
        assert_eq!(result, Extraction::Matched("ab".to_string()));

        let result = template.extract(&target, "ab/cd", |_| None).unwrap();
        assert_eq!(
            result,
            Extraction::Inconsistent(vec!["ab".to_string(), "cd".to_string()])
        );
    }

    #[test]
    fn test_extract_requires_target() {
        let template = Template::parse("{parent.name}").unwrap();
        let err = template
            .extract(&Placeholder::entity("name"), "Core", |_| None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingTarget(_)));
    }
}
