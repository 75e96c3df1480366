//! Attribute expressions.
//!
//! Markers carry a parenthesized, comma-separated list of `key` or
//! `key(value)` items:
//!
//! ```text
//! PROPERTY(EditAnywhere, Category("Stats"), Meta(Range(10.0|200.0), Hidden))
//! ```
//!
//! A value is a range literal `min|max[|step]`, a number, a quoted string,
//! `true`/`false`, or a nested list. The result is an ordered [`AttributeMap`]
//! so that generated code lists attributes in declaration order.

use crate::error::{ReflectError, Result, SourceLocation};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Step applied to range literals that do not spell one out
pub const DEFAULT_RANGE_STEP: f64 = 1.0;

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    Map(AttributeMap),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&AttributeMap> {
        match self {
            AttributeValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Ordered mapping of attribute keys to values
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AttributeMap {
    entries: IndexMap<String, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; returns false (and leaves the map untouched) when the key exists
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render in attribute-expression syntax.
    ///
    /// The output parses back to an equal map: flags render as bare keys,
    /// nested maps (ranges included) as `Key(sub(value), ...)`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(key);
            match value {
                AttributeValue::Bool(true) => {}
                AttributeValue::Bool(false) => out.push_str("(false)"),
                AttributeValue::Number(n) => out.push_str(&format!("({})", format_number(*n))),
                AttributeValue::String(s) => out.push_str(&format!("(\"{}\")", escape_string(s))),
                AttributeValue::Map(m) => out.push_str(&format!("({})", m.render())),
            }
        }
        out
    }
}

/// Render a number in its shortest round-tripping form
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parse the inside of a marker's parentheses.
///
/// # Arguments
///
/// * `text` - attribute list without the enclosing parentheses
/// * `file` - file the text came from, for error reporting
/// * `origin` - location of the first character of `text`
pub fn parse_attributes(text: &str, file: &Path, origin: SourceLocation) -> Result<AttributeMap> {
    let mut parser = AttributeParser {
        chars: text.char_indices().collect(),
        pos: 0,
        file,
        origin,
        text,
    };
    let map = parser.parse_list(false)?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unbalanced parentheses"));
    }
    Ok(map)
}

struct AttributeParser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    file: &'a Path,
    origin: SourceLocation,
    text: &'a str,
}

impl<'a> AttributeParser<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(o, _)| o)
            .unwrap_or(self.text.len())
    }

    /// Location of the current position, relative to the marker origin
    fn location(&self) -> SourceLocation {
        let consumed = &self.text[..self.offset()];
        let newlines = consumed.matches('\n').count() as u32;
        match consumed.rfind('\n') {
            Some(nl) => SourceLocation::new(
                self.origin.line + newlines,
                (consumed[nl + 1..].chars().count() + 1) as u32,
            ),
            None => SourceLocation::new(
                self.origin.line,
                self.origin.column + consumed.chars().count() as u32,
            ),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ReflectError {
        ReflectError::MalformedAttribute {
            file: self.file.to_path_buf(),
            location: self.location(),
            reason: reason.into(),
        }
    }

    /// `item (',' item)*`, stopping before `)` when nested
    fn parse_list(&mut self, nested: bool) -> Result<AttributeMap> {
        let mut map = AttributeMap::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => {
                    if nested {
                        return Err(self.error("unbalanced parentheses"));
                    }
                    return Ok(map);
                }
                Some(')') => {
                    if nested {
                        return Ok(map);
                    }
                    return Err(self.error("unbalanced parentheses"));
                }
                _ => {}
            }

            let key_location = self.location();
            let key = self.parse_key()?;
            self.skip_ws();
            let value = if self.peek() == Some('(') {
                self.bump();
                let value = self.parse_value()?;
                self.skip_ws();
                if self.bump() != Some(')') {
                    return Err(self.error("unbalanced parentheses"));
                }
                value
            } else {
                AttributeValue::Bool(true)
            };

            if !map.insert(key.clone(), value) {
                return Err(ReflectError::MalformedAttribute {
                    file: self.file.to_path_buf(),
                    location: key_location,
                    reason: format!("duplicate attribute '{}'", key),
                });
            }

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') if nested => return Ok(map),
                None if !nested => return Ok(map),
                None => return Err(self.error("unbalanced parentheses")),
                Some(')') => return Err(self.error("unbalanced parentheses")),
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String> {
        let mut key = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == ':' {
                key.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if key.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected attribute name, found '{}'", c)),
                None => self.error("expected attribute name"),
            });
        }
        Ok(key)
    }

    /// Value inside `key( ... )`
    fn parse_value(&mut self) -> Result<AttributeValue> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.parse_numeric(),
            _ => {
                let start = self.pos;
                let word = self.peek_word();
                if matches!(word.as_str(), "true" | "false") {
                    self.pos = start + word.chars().count();
                    self.skip_ws();
                    if self.peek() == Some(')') {
                        return Ok(AttributeValue::Bool(word == "true"));
                    }
                    self.pos = start;
                }
                Ok(AttributeValue::Map(self.parse_list(true)?))
            }
        }
    }

    fn peek_word(&self) -> String {
        self.chars[self.pos..]
            .iter()
            .map(|&(_, c)| c)
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect()
    }

    fn parse_string(&mut self) -> Result<AttributeValue> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(AttributeValue::String(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    /// Number or `min|max[|step]` range
    fn parse_numeric(&mut self) -> Result<AttributeValue> {
        let location = self.location();
        let mut parts = vec![self.parse_number()?];
        loop {
            self.skip_ws();
            if self.peek() != Some('|') {
                break;
            }
            self.bump();
            self.skip_ws();
            parts.push(self.parse_number()?);
        }

        match parts.as_slice() {
            [n] => Ok(AttributeValue::Number(*n)),
            [min, max] | [min, max, _] => {
                let step = parts.get(2).copied().unwrap_or(DEFAULT_RANGE_STEP);
                if min > max {
                    return Err(ReflectError::MalformedAttribute {
                        file: self.file.to_path_buf(),
                        location,
                        reason: format!("range minimum {} exceeds maximum {}", min, max),
                    });
                }
                let mut range = AttributeMap::new();
                range.insert("min", AttributeValue::Number(*min));
                range.insert("max", AttributeValue::Number(*max));
                range.insert("step", AttributeValue::Number(step));
                Ok(AttributeValue::Map(range))
            }
            _ => Err(ReflectError::MalformedAttribute {
                file: self.file.to_path_buf(),
                location,
                reason: "range literal takes at most min|max|step".to_string(),
            }),
        }
    }

    fn parse_number(&mut self) -> Result<f64> {
        let location = self.location();
        let mut literal = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_') {
                literal.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        let trimmed = literal.trim_end_matches(['f', 'F']);
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ReflectError::MalformedAttribute {
                file: self.file.to_path_buf(),
                location,
                reason: format!("invalid numeric literal '{}'", literal),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<AttributeMap> {
        parse_attributes(text, Path::new("test.h"), SourceLocation::new(3, 10))
    }

    #[test]
    fn test_flags_and_values() {
        let map = parse(r#"EditAnywhere, Category("Combat Stats"), Speed(2.5f), Visible(false)"#).unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["EditAnywhere", "Category", "Speed", "Visible"]);
        assert_eq!(map.get("EditAnywhere"), Some(&AttributeValue::Bool(true)));
        assert_eq!(map.get("Category").and_then(|v| v.as_str()), Some("Combat Stats"));
        assert_eq!(map.get("Speed").and_then(|v| v.as_number()), Some(2.5));
        assert_eq!(map.get("Visible").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn test_range_with_default_step() {
        let map = parse("Meta(Range(10.0|200.0))").unwrap();
        let range = map
            .get("Meta")
            .and_then(|v| v.as_map())
            .and_then(|m| m.get("Range"))
            .and_then(|v| v.as_map())
            .unwrap();
        assert_eq!(range.get("min").and_then(|v| v.as_number()), Some(10.0));
        assert_eq!(range.get("max").and_then(|v| v.as_number()), Some(200.0));
        assert_eq!(range.get("step").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn test_range_with_explicit_step() {
        let map = parse("Range(-1|1|0.25)").unwrap();
        let range = map.get("Range").and_then(|v| v.as_map()).unwrap();
        assert_eq!(range.get("min").and_then(|v| v.as_number()), Some(-1.0));
        assert_eq!(range.get("step").and_then(|v| v.as_number()), Some(0.25));
    }

    #[test]
    fn test_render_reparses_to_equal_map() {
        let map = parse(r#"Meta(Range(10.0|200.0), Tooltip("say \"hi\"")), Replicated, Weight(0.5)"#).unwrap();
        let rendered = map.render();
        assert_eq!(
            rendered,
            r#"Meta(Range(min(10), max(200), step(1)), Tooltip("say \"hi\"")), Replicated, Weight(0.5)"#
        );
        assert_eq!(parse(&rendered).unwrap(), map);
    }

    #[test]
    fn test_empty_list() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse("Meta(Range(1|2)").unwrap_err();
        assert!(matches!(err, ReflectError::MalformedAttribute { .. }));
        assert!(err.to_string().contains("unbalanced"));

        assert!(parse("Meta)").is_err());
    }

    #[test]
    fn test_bad_numeric_literal() {
        let err = parse("Range(1.2.3|5)").unwrap_err();
        match err {
            ReflectError::MalformedAttribute { location, reason, .. } => {
                assert_eq!(location, SourceLocation::new(3, 16));
                assert!(reason.contains("1.2.3"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for text in ["Speed(1e999)", "Weight(+nan)", "Speed(-1e400)", "Range(0|inf)"] {
            let err = parse(text).unwrap_err();
            assert!(
                matches!(err, ReflectError::MalformedAttribute { .. }),
                "{} gave {:?}",
                text,
                err
            );
        }
        let map = parse("Speed(1e30)").unwrap();
        assert_eq!(parse(&map.render()).unwrap(), map);
    }

    #[test]
    fn test_min_greater_than_max() {
        let err = parse("Range(10|1)").unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_duplicate_key() {
        let err = parse("Hidden, Hidden").unwrap_err();
        assert!(err.to_string().contains("duplicate attribute 'Hidden'"));
    }

    #[test]
    fn test_multiline_location() {
        let err = parse("A,\n  B(1|x)").unwrap_err();
        match err {
            ReflectError::MalformedAttribute { location, .. } => {
                assert_eq!(location, SourceLocation::new(4, 7));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
