//! Legacy property-table backend.
//!
//! The header part holds the generated-body macro, which declares the
//! accessor thunks as static members so they can reach non-public fields.
//! The inline part holds, per container and in this order:
//!
//! 1. a sentinel-terminated property table in declaration order,
//! 2. a sentinel-terminated function table,
//! 3. get/set accessor thunks addressing properties by table index,
//! 4. the ancestor list and an `IsA` check.
//!
//! Enums get an enumerator table instead. Tables are emitted even when
//! empty so generic runtime code can always rely on them. Without a
//! generated body the thunks are plain functions and only reach public
//! properties.

use std::fmt::{self, Write};

use crate::codegen::utils::{display_name, escape_cpp_string, file_symbol, parameter_list};
use crate::codegen::{ArtifactPart, BackendKind, CodegenBackend, GenerationOptions};
use crate::model::{ContainerKind, ContainerRecord, PropertyRecord, Visibility};
use crate::resolver::ResolvedContainer;

pub struct LegacyBackend;

impl CodegenBackend for LegacyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Legacy
    }

    fn generate(
        &self,
        container: &ResolvedContainer<'_>,
        part: ArtifactPart,
        options: &GenerationOptions,
        out: &mut String,
    ) -> fmt::Result {
        let record = container.record;
        match part {
            ArtifactPart::Header => generate_body_macro(record, options, out),
            ArtifactPart::Inline => {
                let chain: Vec<&str> = container.ancestors.iter().map(|a| a.name.as_str()).collect();
                writeln!(out)?;
                writeln!(out, "// ============================================================================")?;
                writeln!(out, "// {} {}", record.kind.as_str(), record.cpp_name())?;
                if chain.is_empty() {
                    writeln!(out, "// Ancestors: (none)")?;
                } else {
                    writeln!(out, "// Ancestors: {}", chain.join(" -> "))?;
                }
                writeln!(out, "// ============================================================================")?;

                if record.kind == ContainerKind::Enum {
                    return generate_enumerators(record, options, out);
                }
                generate_property_table(record, options, out)?;
                generate_function_table(record, options, out)?;
                generate_accessors(record, out)?;
                generate_is_a(container, out)
            }
        }
    }
}

/// Whether the set thunk may assign to this property
fn is_assignable(property: &PropertyRecord) -> bool {
    let ty = &property.ty;
    !(ty.is_array || ty.is_reference || (ty.is_const && !ty.is_pointer))
}

fn generate_body_macro(record: &ContainerRecord, options: &GenerationOptions, out: &mut String) -> fmt::Result {
    let Some(line) = record.generated_body_line else {
        return Ok(());
    };
    // Inside the class body its own simple name is in scope
    let name = &record.name;
    writeln!(out)?;
    writeln!(out, "// {} {}", record.kind.as_str(), record.cpp_name())?;
    writeln!(
        out,
        "#define {}_GENERATED_BODY_{}_{} \\",
        options.macro_prefix,
        file_symbol(&record.file_id),
        line
    )?;
    writeln!(out, "public: \\")?;
    writeln!(out, "    static const char* StaticTypeName() {{ return \"{}\"; }} \\", name)?;
    writeln!(
        out,
        "    static inline void* ReflectGetProperty({}* self, std::size_t index); \\",
        name
    )?;
    writeln!(
        out,
        "    static inline bool ReflectSetProperty({}* self, std::size_t index, const void* value); \\",
        name
    )?;
    writeln!(out, "{}:", record.kind.default_visibility().as_str())?;
    Ok(())
}

fn generate_property_table(record: &ContainerRecord, options: &GenerationOptions, out: &mut String) -> fmt::Result {
    let ns = &options.runtime_namespace;
    let symbol = record.symbol();
    writeln!(out)?;
    writeln!(out, "inline const {}::PropertyDesc {}_Properties[] = {{", ns, symbol)?;
    for property in &record.properties {
        writeln!(
            out,
            "    {{ \"{}\", \"{}\", \"{}\", \"{}\", {}::Visibility::{:?} }},",
            property.name,
            escape_cpp_string(&display_name(property)),
            escape_cpp_string(&property.ty.to_string()),
            escape_cpp_string(&property.attributes.render()),
            ns,
            property.visibility
        )?;
    }
    writeln!(out, "    {{ nullptr, nullptr, nullptr, nullptr, {}::Visibility::Public }},", ns)?;
    writeln!(out, "}};")?;
    writeln!(
        out,
        "inline constexpr std::size_t {}_PropertyCount = {};",
        symbol,
        record.properties.len()
    )?;
    Ok(())
}

fn generate_function_table(record: &ContainerRecord, options: &GenerationOptions, out: &mut String) -> fmt::Result {
    let ns = &options.runtime_namespace;
    let symbol = record.symbol();
    writeln!(out)?;
    writeln!(out, "inline const {}::FunctionDesc {}_Functions[] = {{", ns, symbol)?;
    for function in &record.functions {
        writeln!(
            out,
            "    {{ \"{}\", \"{}\", \"{}\", \"{}\", {}, {} }},",
            function.name,
            escape_cpp_string(&function.return_type.to_string()),
            escape_cpp_string(&parameter_list(&function.parameters)),
            escape_cpp_string(&function.attributes.render()),
            function.is_static,
            function.is_const
        )?;
    }
    writeln!(out, "    {{ nullptr, nullptr, nullptr, nullptr, false, false }},")?;
    writeln!(out, "}};")?;
    writeln!(
        out,
        "inline constexpr std::size_t {}_FunctionCount = {};",
        symbol,
        record.functions.len()
    )?;
    Ok(())
}

/// `switch` bodies of the get and set thunks
fn write_accessor_switches(
    properties: &[PropertyRecord],
    reachable: impl Fn(&PropertyRecord) -> bool,
) -> Result<(String, String), fmt::Error> {
    let mut get = String::new();
    let mut set = String::new();
    writeln!(get, "    switch (index) {{")?;
    writeln!(set, "    switch (index) {{")?;
    for (index, property) in properties.iter().enumerate() {
        if !reachable(property) {
            continue;
        }
        writeln!(get, "        case {}: return &self->{};", index, property.name)?;
        if is_assignable(property) {
            writeln!(
                set,
                "        case {}: self->{} = *static_cast<const decltype(self->{})*>(value); return true;",
                index, property.name, property.name
            )?;
        }
    }
    writeln!(get, "        default: (void)self; return nullptr;")?;
    writeln!(get, "    }}")?;
    writeln!(set, "        default: (void)self; (void)value; return false;")?;
    writeln!(set, "    }}")?;
    Ok((get, set))
}

fn generate_accessors(record: &ContainerRecord, out: &mut String) -> fmt::Result {
    let cpp_name = record.cpp_name();
    let symbol = record.symbol();
    let get_signature = format!("{}* self, std::size_t index", cpp_name);
    let set_signature = format!("{}* self, std::size_t index, const void* value", cpp_name);

    writeln!(out)?;
    if record.generated_body_line.is_some() {
        let (get, set) = write_accessor_switches(&record.properties, |_| true)?;
        writeln!(out, "inline void* {}::ReflectGetProperty({}) {{", cpp_name, get_signature)?;
        out.push_str(&get);
        writeln!(out, "}}")?;
        writeln!(out, "inline bool {}::ReflectSetProperty({}) {{", cpp_name, set_signature)?;
        out.push_str(&set);
        writeln!(out, "}}")?;
        writeln!(out, "inline void* {}_GetProperty({}) {{", symbol, get_signature)?;
        writeln!(out, "    return {}::ReflectGetProperty(self, index);", cpp_name)?;
        writeln!(out, "}}")?;
        writeln!(out, "inline bool {}_SetProperty({}) {{", symbol, set_signature)?;
        writeln!(out, "    return {}::ReflectSetProperty(self, index, value);", cpp_name)?;
        writeln!(out, "}}")?;
    } else {
        let (get, set) = write_accessor_switches(&record.properties, |p| p.visibility == Visibility::Public)?;
        writeln!(out, "inline void* {}_GetProperty({}) {{", symbol, get_signature)?;
        out.push_str(&get);
        writeln!(out, "}}")?;
        writeln!(out, "inline bool {}_SetProperty({}) {{", symbol, set_signature)?;
        out.push_str(&set);
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn generate_is_a(container: &ResolvedContainer<'_>, out: &mut String) -> fmt::Result {
    let name = &container.record.name;
    let symbol = container.record.symbol();
    writeln!(out)?;
    write!(out, "inline const char* const {}_Ancestors[] = {{ ", symbol)?;
    for ancestor in container.unique_ancestor_names() {
        write!(out, "\"{}\", ", ancestor)?;
    }
    writeln!(out, "nullptr }};")?;
    writeln!(out, "inline bool {}_IsA(const char* typeName) {{", symbol)?;
    writeln!(out, "    if (std::strcmp(typeName, \"{}\") == 0) return true;", name)?;
    writeln!(out, "    for (const char* const* it = {}_Ancestors; *it != nullptr; ++it) {{", symbol)?;
    writeln!(out, "        if (std::strcmp(typeName, *it) == 0) return true;")?;
    writeln!(out, "    }}")?;
    writeln!(out, "    return false;")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn generate_enumerators(record: &ContainerRecord, options: &GenerationOptions, out: &mut String) -> fmt::Result {
    let ns = &options.runtime_namespace;
    let cpp_name = record.cpp_name();
    let symbol = record.symbol();
    writeln!(out)?;
    writeln!(out, "inline const {}::EnumeratorDesc {}_Enumerators[] = {{", ns, symbol)?;
    for enumerator in &record.enumerators {
        writeln!(
            out,
            "    {{ \"{}\", static_cast<long long>({}::{}) }},",
            enumerator.name, cpp_name, enumerator.name
        )?;
    }
    writeln!(out, "    {{ nullptr, 0 }},")?;
    writeln!(out, "}};")?;
    writeln!(
        out,
        "inline constexpr std::size_t {}_EnumeratorCount = {};",
        symbol,
        record.enumerators.len()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{parse_attributes, AttributeMap};
    use crate::error::SourceLocation;
    use crate::model::{EnumeratorRecord, TypeRef};
    use std::path::Path;

    fn property(name: &str, ty: TypeRef) -> PropertyRecord {
        PropertyRecord {
            name: name.to_string(),
            ty,
            visibility: Visibility::Public,
            attributes: AttributeMap::new(),
            location: SourceLocation::default(),
        }
    }

    fn generate_part(container: &ResolvedContainer<'_>, part: ArtifactPart) -> String {
        let mut out = String::new();
        LegacyBackend
            .generate(container, part, &GenerationOptions::default(), &mut out)
            .unwrap();
        out
    }

    fn generate(container: &ResolvedContainer<'_>) -> String {
        generate_part(container, ArtifactPart::Inline)
    }

    #[test]
    fn test_empty_container_still_has_tables() {
        let record = ContainerRecord::new("Empty", ContainerKind::Struct, "e.h");
        let out = generate(&ResolvedContainer {
            record: &record,
            ancestors: vec![],
        });
        assert!(out.contains(
            "inline const ::reflect::PropertyDesc Empty_Properties[] = {\n    { nullptr, nullptr, nullptr, nullptr, ::reflect::Visibility::Public },\n};"
        ));
        assert!(out.contains("inline constexpr std::size_t Empty_PropertyCount = 0;"));
        assert!(out.contains("Empty_Functions[]"));
        assert!(out.contains("// Ancestors: (none)"));
        assert!(!out.contains("GENERATED_BODY"));
        assert!(generate_part(
            &ResolvedContainer {
                record: &record,
                ancestors: vec![],
            },
            ArtifactPart::Header
        )
        .is_empty());
    }

    #[test]
    fn test_property_order_and_accessor_indices() {
        let mut record = ContainerRecord::new("Player", ContainerKind::Class, "Game/Player.h");
        record.generated_body_line = Some(7);
        let mut fixed = TypeRef::named("int");
        fixed.is_array = true;
        record.properties = vec![
            property("C", TypeRef::named("float")),
            property("A", fixed),
            property("B", TypeRef::named("std::string")),
        ];
        let resolved = ResolvedContainer {
            record: &record,
            ancestors: vec![],
        };
        let header = generate_part(&resolved, ArtifactPart::Header);
        let out = generate(&resolved);

        let c = out.find("{ \"C\"").unwrap();
        let a = out.find("{ \"A\"").unwrap();
        let b = out.find("{ \"B\"").unwrap();
        assert!(c < a && a < b);

        assert!(header.contains("#define REFLECT_GENERATED_BODY_Game_Player_h_7 \\"));
        assert!(header.ends_with("private:\n"));
        assert!(!header.contains("Player_Properties"));
        assert!(out.contains("inline void* Player::ReflectGetProperty(Player* self, std::size_t index) {"));
        assert!(out.contains("case 0: return &self->C;"));
        assert!(out.contains("case 2: return &self->B;"));
        assert!(out.contains("case 0: self->C = *static_cast<const decltype(self->C)*>(value); return true;"));
        assert!(!out.contains("self->A ="));
        assert!(out.contains("inline constexpr std::size_t Player_PropertyCount = 3;"));
    }

    #[test]
    fn test_struct_body_macro_restores_public_access() {
        let mut record = ContainerRecord::new("Vec3", ContainerKind::Struct, "v.h");
        record.generated_body_line = Some(2);
        let header = generate_part(
            &ResolvedContainer {
                record: &record,
                ancestors: vec![],
            },
            ArtifactPart::Header,
        );
        assert!(header.ends_with(" \\\npublic:\n"));
    }

    #[test]
    fn test_thunks_without_generated_body_skip_non_public_properties() {
        let mut record = ContainerRecord::new("Loose", ContainerKind::Class, "l.h");
        let mut hidden = property("Hidden", TypeRef::named("int"));
        hidden.visibility = Visibility::Private;
        record.properties = vec![hidden, property("Shown", TypeRef::named("int"))];
        let out = generate(&ResolvedContainer {
            record: &record,
            ancestors: vec![],
        });
        assert!(out.contains("inline void* Loose_GetProperty(Loose* self, std::size_t index) {"));
        assert!(!out.contains("self->Hidden"));
        assert!(out.contains("case 1: return &self->Shown;"));
        assert!(!out.contains("ReflectGetProperty"));
        assert!(out.contains("Loose_PropertyCount = 2;"));
    }

    #[test]
    fn test_attributes_are_echoed_as_range_descriptor() {
        let mut record = ContainerRecord::new("Tank", ContainerKind::Struct, "t.h");
        let mut speed = property("Speed", TypeRef::named("float"));
        speed.attributes = parse_attributes("Meta(Range(10.0|200.0))", Path::new("t.h"), SourceLocation::new(1, 1)).unwrap();
        record.properties.push(speed);
        let out = generate(&ResolvedContainer {
            record: &record,
            ancestors: vec![],
        });
        assert!(out.contains("\"Meta(Range(min(10), max(200), step(1)))\""));
    }

    #[test]
    fn test_is_a_deduplicates_chain() {
        let a = ContainerRecord::new("A", ContainerKind::Class, "x.h");
        let b = ContainerRecord::new("B", ContainerKind::Class, "x.h");
        let c = ContainerRecord::new("C", ContainerKind::Class, "x.h");
        let d = ContainerRecord::new("D", ContainerKind::Class, "x.h");
        let out = generate(&ResolvedContainer {
            record: &d,
            ancestors: vec![&b, &a, &c, &a],
        });
        assert!(out.contains("// Ancestors: B -> A -> C -> A"));
        assert!(out.contains("inline const char* const D_Ancestors[] = { \"B\", \"A\", \"C\", nullptr };"));
    }

    #[test]
    fn test_enum_table() {
        let mut record = ContainerRecord::new("Color", ContainerKind::Enum, "c.h");
        record.enumerators = vec![
            EnumeratorRecord { name: "Red".to_string(), value: None },
            EnumeratorRecord { name: "Blue".to_string(), value: Some("4".to_string()) },
        ];
        let out = generate(&ResolvedContainer {
            record: &record,
            ancestors: vec![],
        });
        assert!(out.contains("{ \"Blue\", static_cast<long long>(Color::Blue) },"));
        assert!(out.contains("Color_EnumeratorCount = 2;"));
        assert!(!out.contains("Color_Properties"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let mut record = ContainerRecord::new("Stable", ContainerKind::Struct, "s.h");
        record.properties.push(property("X", TypeRef::named("double")));
        let resolved = ResolvedContainer {
            record: &record,
            ancestors: vec![],
        };
        let first = generate(&resolved);
        let from_threads: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| generate(&resolved))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(from_threads.iter().all(|out| *out == first));
    }
}
