//! Type-registration backend.
//!
//! Emits one `<PREFIX>_TYPE_BEGIN` ... `<PREFIX>_TYPE_END` block per
//! container into the inline part. The runtime header defines these macros;
//! generated code only supplies the data. Inactive unless
//! [`GenerationOptions::type_info`] is set.

use std::fmt::{self, Write};

use crate::codegen::utils::{escape_cpp_string, parameter_list, stable_type_id};
use crate::codegen::{ArtifactPart, BackendKind, CodegenBackend, GenerationOptions};
use crate::resolver::ResolvedContainer;

pub struct TypeInfoBackend;

impl CodegenBackend for TypeInfoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::TypeInfo
    }

    fn generate(
        &self,
        container: &ResolvedContainer<'_>,
        part: ArtifactPart,
        options: &GenerationOptions,
        out: &mut String,
    ) -> fmt::Result {
        if !options.type_info || part != ArtifactPart::Inline {
            return Ok(());
        }

        let record = container.record;
        let prefix = &options.macro_prefix;
        let cpp_name = record.cpp_name();

        writeln!(out)?;
        writeln!(
            out,
            "{}_TYPE_BEGIN({}, \"{}\", 0x{:016x}ULL)",
            prefix,
            cpp_name,
            escape_cpp_string(&record.qualified_id()),
            stable_type_id(&record.file_id, &cpp_name)
        )?;

        // Direct bases only; external ones never made it into the chain
        for base in &record.bases {
            let name = base.base_name();
            if let Some(ancestor) = container.ancestors.iter().find(|a| a.name == name) {
                writeln!(out, "    {}_TYPE_BASE({})", prefix, ancestor.cpp_name())?;
            }
        }

        for (index, property) in record.properties.iter().enumerate() {
            writeln!(
                out,
                "    {}_TYPE_PROPERTY({}, {}, \"{}\", \"{}\")",
                prefix,
                index,
                property.name,
                escape_cpp_string(&property.ty.to_string()),
                escape_cpp_string(&property.attributes.render())
            )?;
        }

        for (index, function) in record.functions.iter().enumerate() {
            writeln!(
                out,
                "    {}_TYPE_FUNCTION({}, {}, \"{}\", \"{}\")",
                prefix,
                index,
                function.name,
                escape_cpp_string(&function.return_type.to_string()),
                escape_cpp_string(&parameter_list(&function.parameters))
            )?;
        }

        for (index, enumerator) in record.enumerators.iter().enumerate() {
            writeln!(
                out,
                "    {}_TYPE_ENUMERATOR({}, {})",
                prefix, index, enumerator.name
            )?;
        }

        writeln!(out, "{}_TYPE_END({})", prefix, cpp_name)?;
        Ok(())
    }
}
