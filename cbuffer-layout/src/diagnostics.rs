//! Diagnostics reported against a shader type.
//!
//! Configuration errors are recoverable at shader-type granularity: the
//! classifier and validator append diagnostics and keep going, so a host can
//! surface every problem in one pass.

use crate::field::FieldPath;

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A field's type is not a resource, a known HLSL primitive, or a nested
    /// struct of unmanaged fields.
    UnsupportedFieldType { type_name: String },
    /// A struct type contains itself, directly or through another nested
    /// struct.
    SelfReferentialType { type_name: String },
    /// The shader consumes more hardware root signature slots than the
    /// 64-DWORD budget.
    RootSignatureOverflow { slot_count: u32 },
}

/// A single diagnostic tied to the shader type it was produced for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Identity of the offending shader type.
    pub shader_type: String,
    /// Path to the offending field, when the diagnostic concerns one.
    pub field_path: Option<FieldPath>,
}

/// Append-only sink for diagnostics. This crate only ever writes to it.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}
