//! Annotation scanner.
//!
//! Walks the token stream of one source file and lazily yields
//! [`ScanEvent`]s for the reflection markers it finds, together with the
//! braces, namespaces and visibility labels needed to track scopes.
//! Everything else in the file is skipped.

pub mod lexer;

use crate::error::{ReflectError, Result, SourceLocation};
use crate::model::Visibility;
use lexer::{Lexer, Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

/// Marker spellings recognized by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Markers preceding a class/struct/enum declaration
    pub container: Vec<String>,
    pub property: Vec<String>,
    pub function: Vec<String>,
    /// Marker placed inside a container body where generated code is inlined
    pub generated_body: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            container: vec!["CLASS".to_string(), "STRUCT".to_string(), "ENUM".to_string()],
            property: vec!["PROPERTY".to_string()],
            function: vec!["FUNCTION".to_string()],
            generated_body: vec!["GENERATED_BODY".to_string()],
        }
    }
}

impl Vocabulary {
    pub fn classify(&self, word: &str) -> Option<MarkerKind> {
        let hit = |list: &[String]| list.iter().any(|m| m == word);
        if hit(&self.container) {
            Some(MarkerKind::Container)
        } else if hit(&self.property) {
            Some(MarkerKind::Property)
        } else if hit(&self.function) {
            Some(MarkerKind::Function)
        } else if hit(&self.generated_body) {
            Some(MarkerKind::GeneratedBody)
        } else {
            None
        }
    }

    /// All marker names, for validation
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.container
            .iter()
            .chain(&self.property)
            .chain(&self.function)
            .chain(&self.generated_body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Container,
    Property,
    Function,
    GeneratedBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Marker(MarkerKind),
    Visibility(Visibility),
    /// `namespace name {`; the name (possibly `a::b`, empty when anonymous)
    /// is in [`ScanEvent::declaration`] and the brace is consumed
    Namespace,
    OpenBrace,
    CloseBrace,
}

/// One annotation (or scope token) found in a source file
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub kind: EventKind,
    pub location: SourceLocation,
    /// Text between the marker's parentheses
    pub attributes: String,
    pub attributes_location: SourceLocation,
    /// Declaration following the marker, without its terminator
    pub declaration: String,
    pub declaration_location: SourceLocation,
    /// Enum bodies are captured whole; `None` when the file ended inside one
    pub body: Option<String>,
}

impl ScanEvent {
    fn scope(kind: EventKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            attributes: String::new(),
            attributes_location: location,
            declaration: String::new(),
            declaration_location: location,
            body: None,
        }
    }
}

/// Lazy event stream over one file
pub struct Scanner<'s> {
    source: &'s str,
    file: PathBuf,
    vocabulary: &'s Vocabulary,
    tokens: Peekable<Lexer<'s>>,
}

impl<'s> Scanner<'s> {
    pub fn new(source: &'s str, file: &Path, vocabulary: &'s Vocabulary) -> Self {
        Self {
            source,
            file: file.to_path_buf(),
            vocabulary,
            tokens: Lexer::new(source).peekable(),
        }
    }

    fn next_is(&mut self, punct: &str) -> bool {
        let source = self.source;
        matches!(self.tokens.peek(), Some(t) if t.is_punct(source, punct))
    }

    fn malformed(&self, location: SourceLocation, reason: impl Into<String>) -> ReflectError {
        ReflectError::MalformedDeclaration {
            file: self.file.clone(),
            location,
            reason: reason.into(),
        }
    }

    /// Consume tokens through the `close` matching an already consumed `open`.
    /// Returns the closing token, or `None` at end of input.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Option<Token> {
        let mut depth = 1usize;
        for token in self.tokens.by_ref() {
            if token.kind != TokenKind::Punct {
                continue;
            }
            let text = token.text(self.source);
            if text == open {
                depth += 1;
            } else if text == close {
                depth -= 1;
                if depth == 0 {
                    return Some(token);
                }
            }
        }
        None
    }

    /// Consume a marker's argument list through its closing `)`.
    ///
    /// The list never runs past a `;`, `{`, `}` or another marker. That token
    /// is left unread so scanning resumes there, and its location is returned
    /// as the error position.
    fn attribute_group(&mut self, open: &Token) -> std::result::Result<Token, SourceLocation> {
        let source = self.source;
        let mut depth = 1usize;
        let mut last = open.location;
        loop {
            let Some(token) = self.tokens.peek() else {
                return Err(last);
            };
            let (kind, text, location) = (token.kind, token.text(source), token.location);
            match kind {
                TokenKind::Punct => match text {
                    ";" | "{" | "}" => return Err(location),
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            return self.tokens.next().ok_or(location);
                        }
                    }
                    _ => {}
                },
                TokenKind::Ident if self.vocabulary.classify(text).is_some() => return Err(location),
                _ => {}
            }
            last = location;
            self.tokens.next();
        }
    }

    /// Read tokens until one of `terminators` at nesting depth 0
    fn read_until(&mut self, terminators: &[&str]) -> (Option<Token>, Option<Token>) {
        let mut first = None;
        let mut depth = 0usize;
        for token in self.tokens.by_ref() {
            let text = token.text(self.source);
            if token.kind == TokenKind::Punct {
                if depth == 0 && terminators.contains(&text) {
                    return (first, Some(token));
                }
                match text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            if first.is_none() {
                first = Some(token);
            }
        }
        (first, None)
    }

    fn marker(&mut self, kind: MarkerKind, marker: Token) -> Result<ScanEvent> {
        let Some(open) = self.tokens.next() else {
            return Err(self.malformed(marker.location, "unexpected end of file"));
        };
        let close = self
            .attribute_group(&open)
            .map_err(|location| ReflectError::MalformedAttribute {
                file: self.file.clone(),
                location,
                reason: "unbalanced parentheses".to_string(),
            })?;

        let mut event = ScanEvent::scope(EventKind::Marker(kind), marker.location);
        event.attributes = self.source[open.span.end..close.span.start].to_string();
        event.attributes_location = SourceLocation::new(open.location.line, open.location.column + 1);

        match kind {
            MarkerKind::GeneratedBody => Ok(event),
            MarkerKind::Container => self.container_declaration(event),
            MarkerKind::Property => {
                let (first, end) = self.read_until(&[";"]);
                match (first, end) {
                    (Some(first), Some(end)) => {
                        event.declaration = self.source[first.span.start..end.span.start].trim().to_string();
                        event.declaration_location = first.location;
                        Ok(event)
                    }
                    _ => Err(self.malformed(marker.location, "expected ';' after property declaration")),
                }
            }
            MarkerKind::Function => {
                let (first, end) = self.read_until(&[";", "{"]);
                match (first, end) {
                    (Some(first), Some(end)) => {
                        event.declaration = self.source[first.span.start..end.span.start].trim().to_string();
                        event.declaration_location = first.location;
                        if end.is_punct(self.source, "{") && self.skip_balanced("{", "}").is_none() {
                            return Err(self.malformed(first.location, "unterminated function body"));
                        }
                        Ok(event)
                    }
                    _ => Err(self.malformed(marker.location, "expected function declaration")),
                }
            }
        }
    }

    fn container_declaration(&mut self, mut event: ScanEvent) -> Result<ScanEvent> {
        let (first, end) = self.read_until(&["{", ";"]);
        let (Some(first), Some(end)) = (first, end) else {
            return Err(self.malformed(event.location, "expected container declaration"));
        };
        if end.is_punct(self.source, ";") {
            return Err(self.malformed(first.location, "annotated declaration has no body"));
        }
        event.declaration = self.source[first.span.start..end.span.start].trim().to_string();
        event.declaration_location = first.location;

        if first.text(self.source) == "enum" {
            event.body = self
                .skip_balanced("{", "}")
                .map(|close| self.source[end.span.end..close.span.start].to_string());
            if event.body.is_some() && self.next_is(";") {
                self.tokens.next();
            }
        }
        Ok(event)
    }

    /// After `namespace`: an event for a namespace body, `None` for aliases
    /// and using-directives
    fn namespace(&mut self, keyword: Token) -> Option<ScanEvent> {
        let (first, end) = self.read_until(&["{", ";"]);
        let end = end.filter(|t| t.is_punct(self.source, "{"))?;
        let mut event = ScanEvent::scope(EventKind::Namespace, keyword.location);
        if let Some(first) = first {
            event.declaration = self.source[first.span.start..end.span.start].trim().to_string();
            event.declaration_location = first.location;
        }
        Some(event)
    }
}

impl<'s> Iterator for Scanner<'s> {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let token = self.tokens.next()?;
            match token.kind {
                TokenKind::Ident => {
                    let word = token.text(self.source);
                    if word == "namespace" {
                        match self.namespace(token) {
                            Some(event) => return Some(Ok(event)),
                            None => continue,
                        }
                    }
                    if let Some(kind) = self.vocabulary.classify(word) {
                        if self.next_is("(") {
                            return Some(self.marker(kind, token));
                        }
                        continue;
                    }
                    if let Some(visibility) = Visibility::from_keyword(word) {
                        if self.next_is(":") {
                            self.tokens.next();
                            return Some(Ok(ScanEvent::scope(
                                EventKind::Visibility(visibility),
                                token.location,
                            )));
                        }
                    }
                }
                TokenKind::Punct => match token.text(self.source) {
                    "{" => return Some(Ok(ScanEvent::scope(EventKind::OpenBrace, token.location))),
                    "}" => return Some(Ok(ScanEvent::scope(EventKind::CloseBrace, token.location))),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Result<ScanEvent>> {
        let vocabulary = Vocabulary::default();
        Scanner::new(source, Path::new("test.h"), &vocabulary).collect()
    }

    fn kinds(source: &str) -> Vec<EventKind> {
        scan(source).into_iter().map(|e| e.unwrap().kind).collect()
    }

    #[test]
    fn test_class_with_members() {
        let source = r#"
#include "Actor.h"
CLASS(Abstract)
class Player : public Actor {
    GENERATED_BODY()
public:
    PROPERTY(EditAnywhere, Meta(Range(0|100)))
    float Health = 100.0f;

    FUNCTION()
    void Heal(float amount) { Health += amount; }
};
"#;
        let events: Vec<ScanEvent> = scan(source).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![
                EventKind::Marker(MarkerKind::Container),
                EventKind::Marker(MarkerKind::GeneratedBody),
                EventKind::Visibility(Visibility::Public),
                EventKind::Marker(MarkerKind::Property),
                EventKind::Marker(MarkerKind::Function),
                EventKind::CloseBrace,
            ]
        );
        assert_eq!(events[0].attributes, "Abstract");
        assert_eq!(events[0].declaration, "class Player : public Actor");
        assert_eq!(events[0].declaration_location, SourceLocation::new(4, 1));
        assert_eq!(events[1].location, SourceLocation::new(5, 5));
        assert_eq!(events[3].attributes, "EditAnywhere, Meta(Range(0|100))");
        assert_eq!(events[3].attributes_location, SourceLocation::new(7, 14));
        assert_eq!(events[3].declaration, "float Health = 100.0f");
        assert_eq!(events[4].declaration, "void Heal(float amount)");
    }

    #[test]
    fn test_enum_body_captured() {
        let events: Vec<ScanEvent> = scan("ENUM() enum class Color : uint8_t { Red, Green = 4 };\nint x;")
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].declaration, "enum class Color : uint8_t");
        assert_eq!(events[0].body.as_deref(), Some(" Red, Green = 4 "));
    }

    #[test]
    fn test_ignores_unrelated_text_and_marker_without_parens() {
        let source = "int CLASS = 3; struct a { void f(); } // PROPERTY()\n";
        assert_eq!(kinds(source), vec![EventKind::OpenBrace, EventKind::CloseBrace]);
    }

    #[test]
    fn test_namespaces() {
        let source = "using namespace std;\nnamespace fs = std::filesystem;\nnamespace game::core { namespace { } }";
        let events: Vec<ScanEvent> = scan(source).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![
                EventKind::Namespace,
                EventKind::Namespace,
                EventKind::CloseBrace,
                EventKind::CloseBrace
            ]
        );
        assert_eq!(events[0].declaration, "game::core");
        assert_eq!(events[0].location, SourceLocation::new(3, 1));
        assert_eq!(events[1].declaration, "");
    }

    #[test]
    fn test_base_specifier_is_not_a_visibility_label() {
        let source = "class A : public B { private: int x; };";
        assert_eq!(
            kinds(source),
            vec![
                EventKind::OpenBrace,
                EventKind::Visibility(Visibility::Private),
                EventKind::CloseBrace
            ]
        );
    }

    #[test]
    fn test_property_initializer_braces() {
        let events: Vec<ScanEvent> = scan("PROPERTY() std::vector<int> Values{1, 2}; }")
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(events[0].declaration, "std::vector<int> Values{1, 2}");
        assert_eq!(events[1].kind, EventKind::CloseBrace);
    }

    #[test]
    fn test_unbalanced_marker_parentheses() {
        let events = scan("PROPERTY(Meta(Range(1|2)) int x;");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(ReflectError::MalformedAttribute { .. })));
    }

    #[test]
    fn test_unclosed_marker_arguments_stop_at_statement_end() {
        let source = "STRUCT() struct Bad { GENERATED_BODY() PROPERTY(Range(1|2) int A; };\nSTRUCT() struct Good { PROPERTY() int B; };";
        let events = scan(source);
        match &events[2] {
            Err(ReflectError::MalformedAttribute { location, .. }) => assert_eq!(*location, SourceLocation::new(1, 65)),
            other => panic!("unexpected event: {:?}", other),
        }
        let rest: Vec<EventKind> = events[3..].iter().map(|e| e.as_ref().unwrap().kind).collect();
        assert_eq!(
            rest,
            vec![
                EventKind::CloseBrace,
                EventKind::Marker(MarkerKind::Container),
                EventKind::Marker(MarkerKind::Property),
                EventKind::CloseBrace
            ]
        );
    }

    #[test]
    fn test_unclosed_marker_arguments_stop_at_next_marker() {
        let events = scan("STRUCT() struct S { PROPERTY(Meta(\n PROPERTY() int B; };");
        assert!(matches!(
            events[1],
            Err(ReflectError::MalformedAttribute { location, .. }) if location == SourceLocation::new(2, 2)
        ));
        assert_eq!(events[2].as_ref().unwrap().kind, EventKind::Marker(MarkerKind::Property));
        assert_eq!(events[2].as_ref().unwrap().declaration, "int B");
    }

    #[test]
    fn test_forward_declaration_is_malformed() {
        let events = scan("CLASS() class Foo; int y;");
        assert!(matches!(events[0], Err(ReflectError::MalformedDeclaration { .. })));
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocabulary = Vocabulary {
            container: vec!["REFLECT".to_string()],
            property: vec!["FIELD".to_string()],
            function: vec![],
            generated_body: vec![],
        };
        let events: Vec<ScanEvent> = Scanner::new("REFLECT() struct S { FIELD() int a; CLASS() };", Path::new("s.h"), &vocabulary)
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind, EventKind::Marker(MarkerKind::Property));
    }
}
