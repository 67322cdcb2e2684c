//! Byte offset assignment for captured shader values.
//!
//! Reproduces the HLSL constant buffer ABI exactly: values pack at their
//! element alignment, never straddle a 16-byte register, and matrices with
//! more than one row take a fresh register per row. Getting any of this wrong
//! corrupts GPU-visible data silently, so the planner is a deterministic pure
//! fold with no configuration knobs.

use crate::align::{align_to_boundary, pad};
use crate::field::{ClassifiedField, ClassifiedKind, FieldPath};
use crate::hlsl::{HlslType, ResourceKind};

/// Bytes reserved at offset 0 for the implicit (x, y, z) dispatch id of a
/// compute shader.
pub const COMPUTE_DISPATCH_ID_BYTE_SIZE: usize = 3 * 4;

/// Bytes reserved at offset 0 for the implicit (x, y) position of a
/// pixel-shader-like shader.
pub const PIXEL_DISPATCH_ID_BYTE_SIZE: usize = 2 * 4;

/// Where one captured field lives at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDescriptor {
    /// A bound resource; `slot_index` is its position in the flat resource
    /// table, not a hardware register.
    Resource {
        path: FieldPath,
        kind: ResourceKind,
        slot_index: u32,
    },
    /// A contiguous value inside the constant buffer byte array.
    Primitive {
        path: FieldPath,
        type_name: String,
        byte_offset: usize,
    },
    /// A matrix with more than one row; each row has its own offset because
    /// rows individually satisfy the 16-byte register rule.
    Matrix {
        path: FieldPath,
        type_name: String,
        element_type_name: String,
        rows: u32,
        columns: u32,
        row_byte_offsets: Vec<usize>,
    },
}

/// The packed binary layout of one shader type's captured values.
///
/// Created once per shader type; immutable thereafter. Recomputed from
/// scratch whenever the shader declaration changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderLayout {
    /// Total constant buffer size in bytes; always a multiple of 4.
    pub constant_buffer_size: usize,
    /// Descriptors in field declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Number of declared resource fields.
    pub resource_count: u32,
    /// `constant_buffer_size / 4`: each 32-bit value costs one root constant.
    pub root_32bit_constant_count: u32,
}

/// Assigns byte offsets to data fields and flat slot indices to resources.
///
/// Same classified field list in, byte-identical layout out: the fold has no
/// hidden state, which is what makes cache keys and builds reproducible.
pub fn plan_layout(classified: Vec<ClassifiedField>, is_pixel_shader_like: bool) -> ShaderLayout {
    let mut raw_data_offset = if is_pixel_shader_like {
        PIXEL_DISPATCH_ID_BYTE_SIZE
    } else {
        COMPUTE_DISPATCH_ID_BYTE_SIZE
    };
    let mut resource_offset = 0u32;
    let mut fields = Vec::with_capacity(classified.len());

    for field in classified {
        if field.starts_aggregate {
            // Nested aggregates always begin on a register boundary.
            raw_data_offset = pad(raw_data_offset, 16);
        }

        match field.kind {
            ClassifiedKind::Resource(kind) => {
                fields.push(FieldDescriptor::Resource {
                    path: field.path,
                    kind,
                    slot_index: resource_offset,
                });
                resource_offset += 1;
            }
            ClassifiedKind::Primitive(ty) => {
                let size = ty.size();
                let start = align_to_boundary(pad(raw_data_offset, ty.pack()), size, 16);

                fields.push(FieldDescriptor::Primitive {
                    path: field.path,
                    type_name: ty.hlsl_name(),
                    byte_offset: start,
                });
                raw_data_offset = start + size;
            }
            ClassifiedKind::Matrix {
                scalar,
                rows,
                columns,
            } => {
                let row_size = scalar.size() * columns as usize;
                let mut row_byte_offsets = Vec::with_capacity(rows as usize);

                for _ in 0..rows {
                    let row_offset = pad(raw_data_offset, 16);
                    row_byte_offsets.push(row_offset);
                    raw_data_offset = row_offset + row_size;
                }

                fields.push(FieldDescriptor::Matrix {
                    path: field.path,
                    type_name: HlslType::Matrix(scalar, rows, columns).hlsl_name(),
                    element_type_name: scalar.hlsl_name().to_owned(),
                    rows,
                    columns,
                    row_byte_offsets,
                });
            }
        }
    }

    let constant_buffer_size = pad(raw_data_offset, 4);

    ShaderLayout {
        constant_buffer_size,
        fields,
        resource_count: resource_offset,
        root_32bit_constant_count: (constant_buffer_size / 4) as u32,
    }
}
