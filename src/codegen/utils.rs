//! Utility functions for code generation.

use convert_case::{Case, Casing};
use sha2::{Digest, Sha256};

use crate::attributes::AttributeValue;
use crate::model::{ParameterRecord, PropertyRecord};

/// Convert a string to Title Case
pub fn to_title_case(s: &str) -> String {
    s.to_case(Case::Title)
}

/// Escape a string for use in C++ string literals
pub fn escape_cpp_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Turn a file id such as `Game/Player.h` into an identifier (`Game_Player_h`)
pub fn file_symbol(file_id: &str) -> String {
    file_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Stable 64-bit type identifier derived from the file id and container name
pub fn stable_type_id(file_id: &str, name: &str) -> u64 {
    let digest = Sha256::digest(format!("{}::{}", file_id, name).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Editor-facing name of a property.
///
/// An explicit `DisplayName("...")` attribute wins; otherwise member prefixes
/// (`m_`, and `b` on booleans) are dropped and the rest is title-cased.
pub fn display_name(property: &PropertyRecord) -> String {
    if let Some(AttributeValue::String(name)) = property.attributes.get("DisplayName") {
        return name.clone();
    }
    let mut name = property.name.as_str();
    if let Some(stripped) = name.strip_prefix("m_") {
        name = stripped;
    }
    if property.ty.raw_name == "bool" {
        let mut chars = name.chars();
        if chars.next() == Some('b') && chars.next().map(|c| c.is_uppercase()).unwrap_or(false) {
            name = &name[1..];
        }
    }
    to_title_case(name)
}

/// `(int count, const Vec3& dir)`
pub fn parameter_list(parameters: &[ParameterRecord]) -> String {
    let params: Vec<String> = parameters
        .iter()
        .map(|p| format!("{} {}", p.ty, p.name))
        .collect();
    format!("({})", params.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeMap;
    use crate::error::SourceLocation;
    use crate::model::{TypeRef, Visibility};

    fn property(name: &str, ty: &str) -> PropertyRecord {
        PropertyRecord {
            name: name.to_string(),
            ty: TypeRef::named(ty),
            visibility: Visibility::Public,
            attributes: AttributeMap::new(),
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_title_case("MaxHealth"), "Max Health");
        assert_eq!(to_title_case("walkSpeed"), "Walk Speed");
    }

    #[test]
    fn test_escape_cpp_string() {
        assert_eq!(escape_cpp_string("hello\nworld"), "hello\\nworld");
        assert_eq!(escape_cpp_string("say \"hello\""), "say \\\"hello\\\"");
    }

    #[test]
    fn test_file_symbol() {
        assert_eq!(file_symbol("Game/Player.h"), "Game_Player_h");
    }

    #[test]
    fn test_stable_type_id_is_deterministic() {
        let a = stable_type_id("Game/Player.h", "Player");
        assert_eq!(a, stable_type_id("Game/Player.h", "Player"));
        assert_ne!(a, stable_type_id("Game/Other.h", "Player"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(&property("m_maxSpeed", "float")), "Max Speed");
        assert_eq!(display_name(&property("bIsAlive", "bool")), "Is Alive");
        assert_eq!(display_name(&property("bonus", "bool")), "Bonus");

        let mut named = property("Hp", "int");
        named
            .attributes
            .insert("DisplayName", AttributeValue::String("Hit Points".to_string()));
        assert_eq!(display_name(&named), "Hit Points");
    }
}
