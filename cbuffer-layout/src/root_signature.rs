//! Root signature budget validation.

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::layout::ShaderLayout;
use crate::resources::ResourceDescriptorTable;

/// The root signature of the target model holds at most 64 32-bit slots.
pub const MAX_ROOT_SIGNATURE_DWORD_COUNT: u32 = 64;

/// Checks the shader against the 64-DWORD root signature budget.
///
/// Each root constant costs one slot and each descriptor table entry costs
/// one slot; this model has no 2-DWORD root descriptor entries. Exactly at
/// the budget is fine. Overflow reports one diagnostic and returns `false`,
/// leaving the layout and table intact so downstream tooling still runs; the
/// shader just is not eligible for execution.
pub fn validate_root_signature(
    shader_type: &str,
    layout: &ShaderLayout,
    resources: &ResourceDescriptorTable,
    sink: &mut dyn DiagnosticSink,
) -> bool {
    let slot_count = layout.root_32bit_constant_count + resources.len() as u32;

    if slot_count > MAX_ROOT_SIGNATURE_DWORD_COUNT {
        log::warn!(
            "shader `{shader_type}` needs {slot_count} root signature slots, budget is {MAX_ROOT_SIGNATURE_DWORD_COUNT}"
        );
        sink.report(Diagnostic {
            kind: DiagnosticKind::RootSignatureOverflow { slot_count },
            shader_type: shader_type.to_owned(),
            field_path: None,
        });

        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{classify_fields, FieldType, ShaderField, ShaderTypeDescription};
    use crate::hlsl::{HlslType, ResourceKind, ScalarKind};
    use crate::layout::plan_layout;
    use crate::resources::allocate_resource_descriptors;

    fn reflect_scalars(count: usize, resources: usize) -> (ShaderLayout, ResourceDescriptorTable) {
        let mut fields: Vec<ShaderField> = (0..count)
            .map(|i| {
                ShaderField::new(
                    format!("v{i}"),
                    FieldType::Value(HlslType::Scalar(ScalarKind::Float)),
                )
            })
            .collect();
        fields.extend((0..resources).map(|i| {
            ShaderField::new(
                format!("r{i}"),
                FieldType::Resource(ResourceKind::ReadOnlyBuffer),
            )
        }));

        let shader = ShaderTypeDescription {
            type_name: "Shader".to_owned(),
            fields,
            is_pixel_shader_like: false,
        };
        let mut diagnostics = Vec::new();
        let classified = classify_fields(&shader, &mut diagnostics);
        let table = allocate_resource_descriptors(&classified, false);

        (plan_layout(classified, false), table)
    }

    #[test]
    fn exactly_at_the_budget_is_not_flagged() {
        // 61 scalars plus the 3 implicit dispatch ids: 64 root constants.
        let (layout, table) = reflect_scalars(61, 0);
        assert_eq!(layout.root_32bit_constant_count, 64);

        let mut diagnostics = Vec::new();
        assert!(validate_root_signature(
            "Shader",
            &layout,
            &table,
            &mut diagnostics
        ));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn one_slot_over_the_budget_is_flagged_once() {
        let (layout, table) = reflect_scalars(62, 0);
        assert_eq!(layout.root_32bit_constant_count, 65);

        let mut diagnostics = Vec::new();
        assert!(!validate_root_signature(
            "Shader",
            &layout,
            &table,
            &mut diagnostics
        ));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::RootSignatureOverflow { slot_count: 65 }
        );
        assert_eq!(diagnostics[0].shader_type, "Shader");
    }

    #[test]
    fn resources_count_against_the_budget() {
        // 64 root constants leave no room for a descriptor table entry.
        let (layout, table) = reflect_scalars(61, 1);
        assert_eq!(layout.root_32bit_constant_count, 64);
        assert_eq!(table.len(), 1);

        let mut diagnostics = Vec::new();
        assert!(!validate_root_signature(
            "Shader",
            &layout,
            &table,
            &mut diagnostics
        ));
        assert_eq!(diagnostics.len(), 1);

        // One fewer constant brings it back exactly to the budget.
        let (layout, table) = reflect_scalars(60, 1);
        let mut diagnostics = Vec::new();
        assert!(validate_root_signature(
            "Shader",
            &layout,
            &table,
            &mut diagnostics
        ));
        assert!(diagnostics.is_empty());
    }
}
