//! Constant buffer layout planning for HLSL compute shaders.
//!
//! Given the ordered list of fields a shader value type captures, this crate
//! produces the two artifacts needed at dispatch time: a packed binary layout
//! describing where every captured value lives inside the GPU constant
//! buffer, and a resource binding table describing which hardware register
//! each captured resource occupies. It also checks the result against the
//! 64-DWORD root signature budget.
//!
//! Everything here is a pure function over immutable input; callers may
//! reflect many shader types in parallel without synchronization.

mod align;
mod buffer;
mod diagnostics;
mod field;
mod hlsl;
mod layout;
mod resources;
mod root_signature;

pub use align::*;
pub use buffer::*;
pub use diagnostics::*;
pub use field::*;
pub use hlsl::*;
pub use layout::*;
pub use resources::*;
pub use root_signature::*;

/// The combined reflection output for one shader type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReflection {
    pub layout: ShaderLayout,
    pub resources: ResourceDescriptorTable,
    /// False when the shader overflows the root signature budget. The layout
    /// and table are still populated so tooling can keep going, but the
    /// shader is not eligible for execution.
    pub fits_root_signature: bool,
}

/// Classifies, lays out and validates one shader type in a single pass.
///
/// Configuration errors (unsupported fields, self-referential structs, root
/// signature overflow) are appended to `sink`; they never abort reflection.
pub fn reflect(shader: &ShaderTypeDescription, sink: &mut dyn DiagnosticSink) -> ShaderReflection {
    let classified = classify_fields(shader, sink);
    let resources = allocate_resource_descriptors(&classified, shader.is_pixel_shader_like);
    let layout = plan_layout(classified, shader.is_pixel_shader_like);
    let fits_root_signature =
        validate_root_signature(&shader.type_name, &layout, &resources, sink);

    log::debug!(
        "reflected `{}`: {} bytes of constants, {} resources, fits root signature: {}",
        shader.type_name,
        layout.constant_buffer_size,
        resources.len(),
        fits_root_signature
    );

    ShaderReflection {
        layout,
        resources,
        fits_root_signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflects_a_mixed_shader_end_to_end() {
        let shader = ShaderTypeDescription {
            type_name: "BlurShader".to_owned(),
            fields: vec![
                ShaderField::new(
                    "source",
                    FieldType::Resource(ResourceKind::ReadOnlyTexture2D),
                ),
                ShaderField::new(
                    "destination",
                    FieldType::Resource(ResourceKind::ReadWriteTexture2D),
                ),
                ShaderField::new(
                    "radius",
                    FieldType::Value(HlslType::Scalar(ScalarKind::Float)),
                ),
            ],
            is_pixel_shader_like: false,
        };

        let mut diagnostics = Vec::new();
        let reflection = reflect(&shader, &mut diagnostics);

        assert!(diagnostics.is_empty());
        assert!(reflection.fits_root_signature);
        assert_eq!(reflection.layout.resource_count, 2);
        assert_eq!(reflection.resources.len(), 2);
        assert_eq!(reflection.layout.constant_buffer_size, 16);
    }

    #[test]
    fn pixel_shader_like_gets_the_implicit_output_texture() {
        let shader = ShaderTypeDescription {
            type_name: "InvertEffect".to_owned(),
            fields: Vec::new(),
            is_pixel_shader_like: true,
        };

        let mut diagnostics = Vec::new();
        let reflection = reflect(&shader, &mut diagnostics);

        assert_eq!(reflection.layout.constant_buffer_size, 8);
        assert_eq!(reflection.resources.len(), 1);
        assert_eq!(
            reflection.resources.descriptors[0],
            ResourceDescriptor {
                kind: ResourceCategory::ReadWriteView,
                register_offset: 0,
            }
        );
    }
}
