//! Dispatch-time assembly of the constant buffer described by a
//! [`ShaderLayout`].
//!
//! The builder writes the implicit dispatch id at offset 0 and each captured
//! value at its planned offset, then yields an object referenceable as a byte
//! buffer that can be uploaded to a mapped constant buffer.

use bytemuck::NoUninit;
use thiserror::Error;

use crate::layout::{FieldDescriptor, ShaderLayout};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstantBufferError {
    #[error("write of {size} bytes at offset {offset} overruns the {buffer_size}-byte buffer")]
    OutOfBounds {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },
    #[error("field `{path}` is not a primitive constant buffer field")]
    NotAPrimitive { path: String },
    #[error("field `{path}` is not a matrix field")]
    NotAMatrix { path: String },
    #[error("matrix `{path}` has {expected} rows, got {actual}")]
    RowCountMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },
}

/// Writes captured values into a zeroed buffer of the planned size.
pub struct ConstantBufferBuilder<'a> {
    layout: &'a ShaderLayout,
    data: Vec<u8>,
}

impl<'a> ConstantBufferBuilder<'a> {
    pub fn new(layout: &'a ShaderLayout) -> Self {
        ConstantBufferBuilder {
            layout,
            data: vec![0; layout.constant_buffer_size],
        }
    }

    /// Writes the implicit dispatch id components at offset 0.
    pub fn write_dispatch_id(&mut self, ids: &[u32]) -> Result<(), ConstantBufferError> {
        self.write_bytes(0, bytemuck::cast_slice(ids))
    }

    /// Writes a scalar, vector or single-row matrix value at its planned
    /// offset. The caller supplies a value of the field's declared HLSL type;
    /// only buffer bounds are checked here.
    pub fn write_primitive<T: NoUninit>(
        &mut self,
        field: &FieldDescriptor,
        value: &T,
    ) -> Result<(), ConstantBufferError> {
        let FieldDescriptor::Primitive { byte_offset, .. } = field else {
            return Err(ConstantBufferError::NotAPrimitive {
                path: field_path(field),
            });
        };

        self.write_bytes(*byte_offset, bytemuck::bytes_of(value))
    }

    /// Writes one matrix value row by row, each row at its own register
    /// offset.
    pub fn write_matrix_rows<T: NoUninit>(
        &mut self,
        field: &FieldDescriptor,
        rows: &[T],
    ) -> Result<(), ConstantBufferError> {
        let FieldDescriptor::Matrix {
            row_byte_offsets, ..
        } = field
        else {
            return Err(ConstantBufferError::NotAMatrix {
                path: field_path(field),
            });
        };

        if rows.len() != row_byte_offsets.len() {
            return Err(ConstantBufferError::RowCountMismatch {
                path: field_path(field),
                expected: row_byte_offsets.len(),
                actual: rows.len(),
            });
        }

        for (row, offset) in rows.iter().zip(row_byte_offsets.iter()) {
            self.write_bytes(*offset, bytemuck::bytes_of(row))?;
        }

        Ok(())
    }

    /// Consumes the builder and finalizes the bytes.
    pub fn build(self) -> ConstantBuffer {
        ConstantBuffer(self.data)
    }

    pub fn layout(&self) -> &ShaderLayout {
        self.layout
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ConstantBufferError> {
        let end = offset + bytes.len();
        if end > self.data.len() {
            return Err(ConstantBufferError::OutOfBounds {
                offset,
                size: bytes.len(),
                buffer_size: self.data.len(),
            });
        }
        self.data[offset..end].copy_from_slice(bytes);

        Ok(())
    }
}

/// A finalized constant buffer ready for upload.
pub struct ConstantBuffer(Vec<u8>);

impl AsRef<[u8]> for ConstantBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn field_path(field: &FieldDescriptor) -> String {
    match field {
        FieldDescriptor::Resource { path, .. }
        | FieldDescriptor::Primitive { path, .. }
        | FieldDescriptor::Matrix { path, .. } => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{classify_fields, FieldType, ShaderField, ShaderTypeDescription};
    use crate::hlsl::{HlslType, ScalarKind};
    use crate::layout::plan_layout;

    fn example_layout() -> ShaderLayout {
        let shader = ShaderTypeDescription {
            type_name: "Shader".to_owned(),
            fields: vec![
                ShaderField::new(
                    "scale",
                    FieldType::Value(HlslType::Scalar(ScalarKind::Float)),
                ),
                ShaderField::new(
                    "transform",
                    FieldType::Value(HlslType::Matrix(ScalarKind::Float, 2, 2)),
                ),
            ],
            is_pixel_shader_like: false,
        };
        let mut diagnostics = Vec::new();
        let classified = classify_fields(&shader, &mut diagnostics);

        plan_layout(classified, false)
    }

    #[test]
    fn writes_land_at_planned_offsets() {
        let layout = example_layout();
        let mut builder = ConstantBufferBuilder::new(&layout);

        builder.write_dispatch_id(&[7, 8, 9]).unwrap();
        builder
            .write_primitive(&layout.fields[0], &2.0f32)
            .unwrap();
        builder
            .write_matrix_rows(&layout.fields[1], &[[1.0f32, 2.0], [3.0, 4.0]])
            .unwrap();

        let buffer = builder.build();
        let bytes = buffer.as_ref();
        assert_eq!(bytes.len(), layout.constant_buffer_size);
        assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &9u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2.0f32.to_le_bytes());
        // Matrix rows at 16 and 32.
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[32..36], &3.0f32.to_le_bytes());
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let layout = example_layout();
        let mut builder = ConstantBufferBuilder::new(&layout);

        let result = builder.write_dispatch_id(&[0u32; 32]);
        assert!(matches!(
            result,
            Err(ConstantBufferError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn field_kind_mismatches_are_rejected() {
        let layout = example_layout();
        let mut builder = ConstantBufferBuilder::new(&layout);

        assert!(matches!(
            builder.write_primitive(&layout.fields[1], &1.0f32),
            Err(ConstantBufferError::NotAPrimitive { .. })
        ));
        assert!(matches!(
            builder.write_matrix_rows(&layout.fields[0], &[[0.0f32; 2]]),
            Err(ConstantBufferError::NotAMatrix { .. })
        ));
        assert!(matches!(
            builder.write_matrix_rows(&layout.fields[1], &[[0.0f32; 2]]),
            Err(ConstantBufferError::RowCountMismatch { .. })
        ));
    }
}
