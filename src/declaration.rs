//! Declaration payload parsing.
//!
//! The scanner hands over the raw text following each marker. These helpers
//! pull out just enough structure for reflection: container headers, member
//! variables, function signatures and enumerators. Errors are plain reasons;
//! the builder attaches file and location.

use crate::model::{ContainerKind, EnumeratorRecord, ParameterRecord, TypeRef};
use crate::scanner::lexer::{Lexer, TokenKind};

/// Keywords that qualify a declaration without naming its type
const QUALIFIERS: &[&str] = &[
    "volatile", "static", "mutable", "inline", "constexpr", "virtual", "explicit",
    "typename", "struct", "class", "enum", "extern", "thread_local", "friend",
];

/// Parsed `class Name : public Base` header
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHeader {
    pub kind: ContainerKind,
    pub name: String,
    pub bases: Vec<TypeRef>,
    pub underlying: Option<TypeRef>,
}

/// Parsed member function signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: TypeRef,
    pub parameters: Vec<ParameterRecord>,
    pub is_static: bool,
    pub is_const: bool,
}

fn tokenize(text: &str) -> Vec<&str> {
    Lexer::new(text).map(|t| &text[t.span]).collect()
}

fn is_ident(token: &str) -> bool {
    token
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false)
}

fn depth_delta(token: &str) -> isize {
    match token {
        "(" | "[" | "{" | "<" => 1,
        ")" | "]" | "}" | ">" => -1,
        _ => 0,
    }
}

/// Split at `separator` tokens that sit outside any bracket pair
fn split_top_level<'a>(tokens: &[&'a str], separator: &str) -> Vec<Vec<&'a str>> {
    let mut parts = vec![Vec::new()];
    let mut depth = 0isize;
    for &token in tokens {
        if depth == 0 && token == separator {
            parts.push(Vec::new());
            continue;
        }
        depth += depth_delta(token);
        if let Some(part) = parts.last_mut() {
            part.push(token);
        }
    }
    parts
}

/// Index of the first `target` outside brackets
fn find_top_level(tokens: &[&str], targets: &[&str]) -> Option<usize> {
    let mut depth = 0isize;
    for (i, &token) in tokens.iter().enumerate() {
        if depth == 0 && targets.contains(&token) {
            return Some(i);
        }
        depth += depth_delta(token);
    }
    None
}

/// Index of the bracket closing the one opened at `open`
fn matching_close(tokens: &[&str], open: usize) -> Option<usize> {
    let mut depth = 0isize;
    for (i, &token) in tokens.iter().enumerate().skip(open) {
        depth += depth_delta(token);
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

/// Build a [`TypeRef`] from the tokens of a type
pub fn parse_type(tokens: &[&str]) -> TypeRef {
    let mut ty = TypeRef::default();
    let mut i = 0;
    let mut previous_scope = false;
    while i < tokens.len() {
        let token = tokens[i];
        match token {
            "const" => ty.is_const |= !ty.is_pointer,
            "*" => ty.is_pointer = true,
            "&" => ty.is_reference = true,
            "[" => {
                ty.is_array = true;
                if let Some(close) = matching_close(tokens, i) {
                    i = close;
                }
            }
            "<" => {
                if let Some(close) = matching_close(tokens, i) {
                    ty.template_args = split_top_level(&tokens[i + 1..close], ",")
                        .into_iter()
                        .filter(|arg| !arg.is_empty())
                        .map(|arg| parse_type(&arg))
                        .collect();
                    i = close;
                } else {
                    break;
                }
            }
            "::" => {
                ty.raw_name.push_str("::");
                previous_scope = true;
                i += 1;
                continue;
            }
            t if QUALIFIERS.contains(&t) => {}
            t if is_ident(t) || t.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') => {
                if !ty.raw_name.is_empty() && !previous_scope {
                    ty.raw_name.push(' ');
                }
                ty.raw_name.push_str(t);
            }
            _ => {}
        }
        previous_scope = false;
        i += 1;
    }
    ty
}

/// Parse `Type name [= init]` into its type and name.
///
/// Unnamed declarations (function parameters such as `int`) yield an empty name.
pub fn parse_variable(text: &str) -> Result<(TypeRef, String), String> {
    let tokens = tokenize(text);
    parse_variable_tokens(&tokens)
}

fn parse_variable_tokens(tokens: &[&str]) -> Result<(TypeRef, String), String> {
    let end = find_top_level(tokens, &["=", "{", ":"]).unwrap_or(tokens.len());
    let mut decl = &tokens[..end];

    let mut is_array = false;
    while decl.last() == Some(&"]") {
        let open = decl.iter().rposition(|t| *t == "[").ok_or("unbalanced array brackets")?;
        decl = &decl[..open];
        is_array = true;
    }

    if decl.is_empty() {
        return Err("empty declaration".to_string());
    }

    let last = decl[decl.len() - 1];
    let names_variable = is_ident(last)
        && decl.len() > 1
        && !matches!(decl[decl.len() - 2], "::")
        && !(decl.len() == 1 || QUALIFIERS.contains(&last) || last == "const");

    let (type_tokens, name) = if names_variable {
        (&decl[..decl.len() - 1], last.to_string())
    } else {
        (decl, String::new())
    };

    let mut ty = parse_type(type_tokens);
    if ty.raw_name.is_empty() {
        return Err(format!("cannot determine the type of '{}'", tokens.join(" ")));
    }
    ty.is_array |= is_array;
    Ok((ty, name))
}

/// Parse a member function signature
pub fn parse_function(text: &str) -> Result<FunctionSignature, String> {
    let tokens = tokenize(text);
    let open = find_top_level(&tokens, &["("]).ok_or("expected parameter list")?;
    let close = matching_close(&tokens, open).ok_or("unbalanced parameter list")?;

    let head = &tokens[..open];
    let name = head
        .last()
        .filter(|t| is_ident(t))
        .ok_or("expected function name")?
        .to_string();
    let prefix = &head[..head.len() - 1];

    let return_type = if prefix.iter().any(|t| is_ident(t) && !QUALIFIERS.contains(t)) {
        parse_type(prefix)
    } else {
        TypeRef::named("void")
    };

    let mut parameters = Vec::new();
    let params = &tokens[open + 1..close];
    if !(params.is_empty() || params == ["void"]) {
        for (i, param) in split_top_level(params, ",").into_iter().enumerate() {
            let (ty, name) = parse_variable_tokens(&param)
                .map_err(|e| format!("parameter {} of '{}': {}", i + 1, name, e))?;
            let name = if name.is_empty() { format!("arg{}", i) } else { name };
            parameters.push(ParameterRecord { name, ty });
        }
    }

    let trailing = &tokens[close + 1..];
    let trailing_end = find_top_level(trailing, &["="]).unwrap_or(trailing.len());

    Ok(FunctionSignature {
        name,
        return_type,
        parameters,
        is_static: prefix.contains(&"static"),
        is_const: trailing[..trailing_end].contains(&"const"),
    })
}

/// Parse a container header such as `class API Foo final : public Bar, Baz<int>`
pub fn parse_container_header(text: &str) -> Result<ContainerHeader, String> {
    let tokens = tokenize(text);
    let mut rest: &[&str] = &tokens;

    if rest.first() == Some(&"template") {
        let close = matching_close(rest, 1).ok_or("unbalanced template parameter list")?;
        rest = &rest[close + 1..];
    }

    let kind = match rest.first() {
        Some(&"class") => ContainerKind::Class,
        Some(&"struct") => ContainerKind::Struct,
        Some(&"enum") => ContainerKind::Enum,
        _ => return Err(format!("expected class, struct or enum in '{}'", text)),
    };
    rest = &rest[1..];
    if kind == ContainerKind::Enum && matches!(rest.first(), Some(&"class") | Some(&"struct")) {
        rest = &rest[1..];
    }

    let colon = find_top_level(rest, &[":"]);
    let head = &rest[..colon.unwrap_or(rest.len())];

    let mut name = None;
    let mut i = 0;
    while i < head.len() {
        match head[i] {
            "(" | "<" => {
                i = matching_close(head, i).ok_or("unbalanced brackets in declaration")?;
            }
            "final" => {}
            t if is_ident(t) => name = Some(t),
            _ => {}
        }
        i += 1;
    }
    let name = name.ok_or("anonymous containers cannot be reflected")?.to_string();

    let mut bases = Vec::new();
    let mut underlying = None;
    if let Some(colon) = colon {
        let tail = &rest[colon + 1..];
        if kind == ContainerKind::Enum {
            underlying = Some(parse_type(tail));
        } else {
            for base in split_top_level(tail, ",") {
                let base: Vec<&str> = base
                    .into_iter()
                    .filter(|t| !matches!(*t, "public" | "private" | "protected" | "virtual"))
                    .collect();
                if base.is_empty() {
                    return Err(format!("empty base specifier in '{}'", text));
                }
                bases.push(parse_type(&base));
            }
        }
    }

    Ok(ContainerHeader {
        kind,
        name,
        bases,
        underlying,
    })
}

/// Parse the enumerators of an enum body (text between the braces)
pub fn parse_enumerators(body: &str) -> Vec<EnumeratorRecord> {
    let tokens: Vec<_> = Lexer::new(body).collect();
    let mut enumerators = Vec::new();
    let mut start = 0;
    let mut depth = 0isize;
    for i in 0..=tokens.len() {
        let at_end = i == tokens.len();
        let separator = !at_end && depth == 0 && tokens[i].is_punct(body, ",");
        if !at_end {
            // Shifts like `1 << 2` are common in flag enums, so angles do not nest here
            depth += match tokens[i].text(body) {
                "<" | ">" => 0,
                t => depth_delta(t),
            };
        }
        if !(at_end || separator) {
            continue;
        }

        let entry = &tokens[start..i];
        start = i + 1;
        let Some(first) = entry.first() else { continue };
        if first.kind != TokenKind::Ident {
            continue;
        }
        let value = entry
            .iter()
            .position(|t| t.is_punct(body, "="))
            .and_then(|eq| {
                let last = entry.last()?;
                let value = body[entry[eq].span.end..last.span.end].trim();
                (!value.is_empty()).then(|| value.to_string())
            });
        enumerators.push(EnumeratorRecord {
            name: first.text(body).to_string(),
            value,
        });
    }
    enumerators
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_property() {
        let (ty, name) = parse_variable("float Health = 100.0f").unwrap();
        assert_eq!(name, "Health");
        assert_eq!(ty, TypeRef::named("float"));
    }

    #[test]
    fn test_parse_decorated_property() {
        let (ty, name) = parse_variable("const std::map<std::string, Item*>* Inventory").unwrap();
        assert_eq!(name, "Inventory");
        assert_eq!(ty.raw_name, "std::map");
        assert!(ty.is_const && ty.is_pointer && !ty.is_reference);
        assert_eq!(ty.template_args.len(), 2);
        assert_eq!(ty.template_args[0].raw_name, "std::string");
        assert!(ty.template_args[1].is_pointer);
        assert_eq!(ty.to_string(), "const std::map<std::string, Item*>*");
    }

    #[test]
    fn test_parse_array_and_multiword() {
        let (ty, name) = parse_variable("unsigned int Scores[4]").unwrap();
        assert_eq!(name, "Scores");
        assert_eq!(ty.raw_name, "unsigned int");
        assert!(ty.is_array);

        let (ty, name) = parse_variable("std::vector<std::vector<int>> Grid{}").unwrap();
        assert_eq!(name, "Grid");
        assert_eq!(ty.to_string(), "std::vector<std::vector<int>>");
    }

    #[test]
    fn test_parse_bitfield_and_static() {
        let (ty, name) = parse_variable("static uint32_t Flags : 3").unwrap();
        assert_eq!(name, "Flags");
        assert_eq!(ty.raw_name, "uint32_t");
    }

    #[test]
    fn test_parse_function() {
        let sig = parse_function("virtual bool Fire(int count, const Vec3& dir = Vec3(), float) const override").unwrap();
        assert_eq!(sig.name, "Fire");
        assert_eq!(sig.return_type, TypeRef::named("bool"));
        assert!(sig.is_const);
        assert!(!sig.is_static);
        let names: Vec<&str> = sig.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["count", "dir", "arg2"]);
        assert!(sig.parameters[1].ty.is_reference);
        assert!(sig.parameters[1].ty.is_const);
    }

    #[test]
    fn test_parse_static_function_without_params() {
        let sig = parse_function("static std::shared_ptr<Player> Create(void)").unwrap();
        assert!(sig.is_static);
        assert!(sig.parameters.is_empty());
        assert_eq!(sig.return_type.to_string(), "std::shared_ptr<Player>");
    }

    #[test]
    fn test_parse_function_errors() {
        assert!(parse_function("int Value").is_err());
        assert!(parse_function("void Broken(int a").is_err());
    }

    #[test]
    fn test_parse_container_header() {
        let header = parse_container_header("class GAME_API Player final : public Pawn, private ns::Listener<Player>").unwrap();
        assert_eq!(header.kind, ContainerKind::Class);
        assert_eq!(header.name, "Player");
        assert_eq!(header.bases.len(), 2);
        assert_eq!(header.bases[0].raw_name, "Pawn");
        assert_eq!(header.bases[1].raw_name, "ns::Listener");
        assert_eq!(header.bases[1].base_name(), "Listener");
    }

    #[test]
    fn test_parse_template_and_enum_headers() {
        let header = parse_container_header("template <typename T> struct alignas(16) Handle").unwrap();
        assert_eq!(header.kind, ContainerKind::Struct);
        assert_eq!(header.name, "Handle");
        assert!(header.bases.is_empty());

        let header = parse_container_header("enum class Color : uint8_t").unwrap();
        assert_eq!(header.kind, ContainerKind::Enum);
        assert_eq!(header.name, "Color");
        assert!(header.bases.is_empty());
        assert_eq!(header.underlying, Some(TypeRef::named("uint8_t")));

        assert!(parse_container_header("struct : Base").is_err());
        assert!(parse_container_header("union U").is_err());
    }

    #[test]
    fn test_parse_enumerators() {
        let values = parse_enumerators(" Red, Green = 4, Blue = Green << 1, ");
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], EnumeratorRecord { name: "Red".to_string(), value: None });
        assert_eq!(values[1].value.as_deref(), Some("4"));
        assert_eq!(values[2].value.as_deref(), Some("Green << 1"));
    }
}
