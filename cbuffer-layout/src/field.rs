//! Shader type descriptions and field classification.
//!
//! The transpiler hands this crate an ordered list of captured fields. The
//! classifier walks that list (recursing into nested value-type structs) and
//! decides, per field, whether it is a bound resource, a linearly packed
//! primitive, or a matrix that needs one register per row. Anything else is a
//! configuration error reported to the diagnostic sink; the walk keeps going
//! so every problem surfaces in a single pass.

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::hlsl::{HlslType, ResourceKind};

/// Ordered field names from the shader root down to a leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub(crate) fn root() -> Self {
        FieldPath {
            segments: Vec::new(),
        }
    }

    pub(crate) fn child(&self, name: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name.to_owned());

        FieldPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }

        Ok(())
    }
}

/// The declared type of a captured field, as reported by the transpiler.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// A typed GPU resource handle.
    Resource(ResourceKind),
    /// One of the known HLSL scalar, vector or matrix shapes.
    Value(HlslType),
    /// A nested value type made of unmanaged fields.
    Struct(Arc<ShaderStructType>),
    /// Anything else; carries the declared type name for diagnostics.
    Opaque(String),
}

/// A single declared field.
#[derive(Debug, Clone)]
pub struct ShaderField {
    pub name: String,
    pub ty: FieldType,
    pub is_static: bool,
    pub is_constant: bool,
}

impl ShaderField {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        ShaderField {
            name: name.into(),
            ty,
            is_static: false,
            is_constant: false,
        }
    }
}

/// A nested value type. Identity is the type name; a value type graph that
/// contains itself is not a valid input to this model.
#[derive(Debug, Clone)]
pub struct ShaderStructType {
    pub name: String,
    pub fields: Vec<ShaderField>,
}

/// Everything the layout subsystem needs to know about one shader type.
#[derive(Debug, Clone)]
pub struct ShaderTypeDescription {
    /// Identity of the shader type, used in diagnostics.
    pub type_name: String,
    /// Instance fields in declaration order.
    pub fields: Vec<ShaderField>,
    /// Pixel-shader-like shaders have a two-component implicit dispatch id
    /// and an implicit output texture on `u0`.
    pub is_pixel_shader_like: bool,
}

/// How the classifier resolved a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedKind {
    Resource(ResourceKind),
    /// Scalar, vector, or single-row matrix: one contiguous run of bytes.
    Primitive(HlslType),
    /// Matrix with more than one row, laid out one register per row.
    Matrix {
        scalar: crate::hlsl::ScalarKind,
        rows: u32,
        columns: u32,
    },
}

/// One classified field, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedField {
    pub path: FieldPath,
    pub kind: ClassifiedKind,
    /// True for the first data field inside a nested aggregate. The planner
    /// pads such fields to a fresh 16-byte register.
    pub starts_aggregate: bool,
}

struct Frame<'a> {
    type_name: &'a str,
    fields: &'a [ShaderField],
    index: usize,
    path: FieldPath,
    /// Set on entry to a nested aggregate, consumed by its first data field.
    pending_register_break: bool,
}

/// Walks the declared fields of `shader` and classifies each one.
///
/// Unsupported field shapes and self-referential struct types are reported to
/// `sink` and skipped; the rest of the walk is unaffected. Uses an explicit
/// frame stack, so pathological nesting depth cannot overflow the call stack.
pub fn classify_fields(
    shader: &ShaderTypeDescription,
    sink: &mut dyn DiagnosticSink,
) -> Vec<ClassifiedField> {
    let mut classified = Vec::with_capacity(shader.fields.len());
    let mut stack = vec![Frame {
        type_name: &shader.type_name,
        fields: &shader.fields,
        index: 0,
        path: FieldPath::root(),
        pending_register_break: false,
    }];

    loop {
        let (field, path): (&ShaderField, FieldPath) = {
            let frame = match stack.last_mut() {
                Some(frame) => frame,
                None => break,
            };

            if frame.index == frame.fields.len() {
                stack.pop();
                continue;
            }

            let fields = frame.fields;
            let field = &fields[frame.index];
            frame.index += 1;

            (field, frame.path.child(&field.name))
        };

        if field.is_static || field.is_constant {
            continue;
        }

        match &field.ty {
            FieldType::Resource(kind) => {
                classified.push(ClassifiedField {
                    path,
                    kind: ClassifiedKind::Resource(*kind),
                    starts_aggregate: false,
                });
            }
            FieldType::Value(ty) => {
                let starts_aggregate = match stack.last_mut() {
                    Some(frame) => std::mem::take(&mut frame.pending_register_break),
                    None => false,
                };
                let kind = match *ty {
                    HlslType::Matrix(scalar, rows, columns) if rows > 1 => ClassifiedKind::Matrix {
                        scalar,
                        rows,
                        columns,
                    },
                    ty => ClassifiedKind::Primitive(ty),
                };

                classified.push(ClassifiedField {
                    path,
                    kind,
                    starts_aggregate,
                });
            }
            FieldType::Struct(nested) => {
                if stack.iter().any(|frame| frame.type_name == nested.name) {
                    log::warn!(
                        "self-referential struct `{}` at `{}` in shader `{}`",
                        nested.name,
                        path,
                        shader.type_name
                    );
                    sink.report(Diagnostic {
                        kind: DiagnosticKind::SelfReferentialType {
                            type_name: nested.name.clone(),
                        },
                        shader_type: shader.type_name.clone(),
                        field_path: Some(path),
                    });
                    continue;
                }

                // The inner aggregate's own register break subsumes any
                // break still pending on this frame; without this, the field
                // after the inner aggregate would get a spurious break.
                if let Some(frame) = stack.last_mut() {
                    frame.pending_register_break = false;
                }

                stack.push(Frame {
                    type_name: &nested.name,
                    fields: &nested.fields,
                    index: 0,
                    path,
                    pending_register_break: true,
                });
            }
            FieldType::Opaque(type_name) => {
                sink.report(Diagnostic {
                    kind: DiagnosticKind::UnsupportedFieldType {
                        type_name: type_name.clone(),
                    },
                    shader_type: shader.type_name.clone(),
                    field_path: Some(path),
                });
            }
        }
    }

    classified
}
