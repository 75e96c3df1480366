//! Container model.
//!
//! These types describe what the builder extracts from annotated source and
//! what the resolver and code generation backends consume. They are plain
//! structural descriptions: a [`TypeRef`] records how a type was spelled, it
//! is never bound to a declaration.

use crate::attributes::AttributeMap;
use crate::error::SourceLocation;
use serde::Serialize;
use std::fmt;

/// Kind of reflected container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Class,
    Struct,
    Enum,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Class => "class",
            ContainerKind::Struct => "struct",
            ContainerKind::Enum => "enum",
        }
    }

    /// Visibility of members declared before any section label
    pub fn default_visibility(&self) -> Visibility {
        match self {
            ContainerKind::Class => Visibility::Private,
            ContainerKind::Struct | ContainerKind::Enum => Visibility::Public,
        }
    }
}

/// Member access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }
}

/// Structural description of a declared type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TypeRef {
    /// Qualified name without decorations, e.g. `std::vector` or `unsigned int`
    pub raw_name: String,
    pub is_const: bool,
    pub is_pointer: bool,
    pub is_reference: bool,
    pub is_array: bool,
    pub template_args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            raw_name: name.into(),
            ..Default::default()
        }
    }

    /// Last `::` segment of the name, used for base lookups
    pub fn base_name(&self) -> &str {
        self.raw_name.rsplit("::").next().unwrap_or(&self.raw_name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.raw_name)?;
        if !self.template_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.template_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        if self.is_pointer {
            write!(f, "*")?;
        }
        if self.is_reference {
            write!(f, "&")?;
        }
        if self.is_array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Reflected data member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub visibility: Visibility,
    pub attributes: AttributeMap,
    pub location: SourceLocation,
}

/// Reflected function parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Reflected member function
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionRecord {
    pub name: String,
    pub return_type: TypeRef,
    pub parameters: Vec<ParameterRecord>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_const: bool,
    pub attributes: AttributeMap,
    pub location: SourceLocation,
}

/// Enumerator of a reflected enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumeratorRecord {
    pub name: String,
    /// Initializer expression as written, if any
    pub value: Option<String>,
}

/// One reflected class, struct or enum
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRecord {
    pub name: String,
    pub kind: ContainerKind,
    /// Enclosing namespaces and containers, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    /// Input path relative to the input root, `/`-separated
    pub file_id: String,
    pub location: SourceLocation,
    pub bases: Vec<TypeRef>,
    pub properties: Vec<PropertyRecord>,
    pub functions: Vec<FunctionRecord>,
    pub attributes: AttributeMap,
    /// Line of the generated-body marker inside the container, if present
    pub generated_body_line: Option<u32>,
    pub enumerators: Vec<EnumeratorRecord>,
    /// Underlying type of an enum
    pub underlying: Option<TypeRef>,
}

impl ContainerRecord {
    pub fn new(name: impl Into<String>, kind: ContainerKind, file_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            scope: Vec::new(),
            file_id: file_id.into(),
            location: SourceLocation::default(),
            bases: Vec::new(),
            properties: Vec::new(),
            functions: Vec::new(),
            attributes: AttributeMap::new(),
            generated_body_line: None,
            enumerators: Vec::new(),
            underlying: None,
        }
    }

    /// C++ name as written from global scope, e.g. `game::Pawn::Stats`
    pub fn cpp_name(&self) -> String {
        self.scope
            .iter()
            .chain(std::iter::once(&self.name))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("::")
    }

    /// Identifier prefix for generated globals, e.g. `game_Pawn_Stats`
    pub fn symbol(&self) -> String {
        self.cpp_name().replace("::", "_")
    }

    /// Stable identifier string, `file_id::cpp_name`
    pub fn qualified_id(&self) -> String {
        format!("{}::{}", self.file_id, self.cpp_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_display() {
        let mut inner = TypeRef::named("Item");
        inner.is_pointer = true;
        let mut ty = TypeRef::named("std::vector");
        ty.is_const = true;
        ty.is_reference = true;
        ty.template_args.push(inner);
        assert_eq!(ty.to_string(), "const std::vector<Item*>&");
        assert_eq!(ty.base_name(), "vector");
    }

    #[test]
    fn test_default_visibility() {
        assert_eq!(ContainerKind::Class.default_visibility(), Visibility::Private);
        assert_eq!(ContainerKind::Struct.default_visibility(), Visibility::Public);
    }

    #[test]
    fn test_qualified_id() {
        let record = ContainerRecord::new("Player", ContainerKind::Class, "Game/Player.h");
        assert_eq!(record.qualified_id(), "Game/Player.h::Player");
    }

    #[test]
    fn test_scoped_names() {
        let mut record = ContainerRecord::new("Stats", ContainerKind::Struct, "Game/Pawn.h");
        record.scope = vec!["game".to_string(), "Pawn".to_string()];
        assert_eq!(record.cpp_name(), "game::Pawn::Stats");
        assert_eq!(record.symbol(), "game_Pawn_Stats");
        assert_eq!(record.qualified_id(), "Game/Pawn.h::game::Pawn::Stats");
    }
}
