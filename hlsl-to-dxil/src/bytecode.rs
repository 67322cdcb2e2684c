//! The result model for one HLSL compilation.

use std::ops::Deref;
use std::sync::Arc;

use crate::cancel::{Cancelled, CancellationToken};
use crate::options::CompileOptions;

/// A compiled DXIL artifact.
///
/// Cheap to clone; the bytes are shared between the cache and every caller
/// that observed the same compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxilBytecode {
    inner: Arc<[u8]>,
}

impl DxilBytecode {
    pub fn new(bytes: Vec<u8>) -> Self {
        DxilBytecode {
            inner: bytes.into(),
        }
    }
}

impl Deref for DxilBytecode {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<[u8]> for DxilBytecode {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

/// Outcome of compiling one (source, options) pair. Produced once per
/// distinct cache key and immutable afterwards.
///
/// Failures are values, never panics or propagated exceptions, so a host can
/// decide per shader whether to fail the build or fall back to runtime
/// compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlslBytecodeInfo {
    /// Compilation succeeded.
    Success {
        bytecode: DxilBytecode,
        /// Whether the shader uses double-precision instructions and needs
        /// the corresponding device capability at dispatch time.
        requires_double_precision: bool,
    },
    /// Precompilation was deliberately skipped for this shader.
    Missing,
    /// The native compiler library could not be loaded or invoked.
    Win32Error { code: i32, message: String },
    /// The compiler rejected the generated HLSL; the message is a single
    /// normalized line.
    CompilerError { message: String },
}

/// The call contract of a shader compiler backend.
///
/// The cache composes its compute step out of this; tests substitute
/// closures or stub implementations.
pub trait BytecodeCompiler {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
        token: &CancellationToken,
    ) -> Result<HlslBytecodeInfo, Cancelled>;
}

/// Feature flag bits of the `SFI0` part that mark double-precision use.
const FEATURE_DOUBLES: u64 = 0x0001;
const FEATURE_11_1_DOUBLE_EXTENSIONS: u64 = 0x0020;

/// Scans a DXIL container for the `SFI0` feature flags part and reports
/// whether the shader requires double-precision support.
///
/// DXC emits the same FourCC part container as DXBC: a `DXBC` magic, a
/// 16-byte digest, a version pair, the total size, and a table of part
/// offsets, each part being a FourCC tag plus a length-prefixed payload.
/// Malformed input is treated as "no doubles" rather than an error; the
/// container was just produced by the compiler, so damage here would be a
/// compiler bug, not a caller mistake.
pub(crate) fn requires_double_precision(blob: &[u8]) -> bool {
    fn read_u32(blob: &[u8], offset: usize) -> Option<u32> {
        let bytes = blob.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    if blob.get(0..4) != Some(b"DXBC") {
        return false;
    }

    // 4 magic + 16 digest + 2x2 version + 4 total size.
    let part_count = match read_u32(blob, 28) {
        Some(count) => count as usize,
        None => return false,
    };

    for index in 0..part_count {
        let Some(part_offset) = read_u32(blob, 32 + index * 4) else {
            return false;
        };
        let part_offset = part_offset as usize;

        if blob.get(part_offset..part_offset + 4) != Some(b"SFI0") {
            continue;
        }

        let Some(part_size) = read_u32(blob, part_offset + 4) else {
            return false;
        };
        if part_size < 8 {
            return false;
        }
        let Some(low) = read_u32(blob, part_offset + 8) else {
            return false;
        };
        let Some(high) = read_u32(blob, part_offset + 12) else {
            return false;
        };
        let flags = (high as u64) << 32 | low as u64;

        return flags & (FEATURE_DOUBLES | FEATURE_11_1_DOUBLE_EXTENSIONS) != 0;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal container with a single `SFI0` part holding `flags`.
    fn container_with_feature_flags(flags: u64) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(b"DXBC");
        blob.extend_from_slice(&[0u8; 16]); // digest
        blob.extend_from_slice(&1u16.to_le_bytes()); // major
        blob.extend_from_slice(&0u16.to_le_bytes()); // minor
        blob.extend_from_slice(&0u32.to_le_bytes()); // total size, patched below
        blob.extend_from_slice(&1u32.to_le_bytes()); // part count
        let part_offset = blob.len() as u32 + 4;
        blob.extend_from_slice(&part_offset.to_le_bytes());
        blob.extend_from_slice(b"SFI0");
        blob.extend_from_slice(&8u32.to_le_bytes());
        blob.extend_from_slice(&flags.to_le_bytes());
        let total = blob.len() as u32;
        blob[24..28].copy_from_slice(&total.to_le_bytes());

        blob
    }

    #[test]
    fn doubles_flag_is_detected() {
        assert!(requires_double_precision(&container_with_feature_flags(
            0x0001
        )));
        assert!(requires_double_precision(&container_with_feature_flags(
            0x0020
        )));
        assert!(!requires_double_precision(&container_with_feature_flags(
            0x0010
        )));
    }

    #[test]
    fn malformed_containers_report_no_doubles() {
        assert!(!requires_double_precision(b""));
        assert!(!requires_double_precision(b"DXIL"));
        assert!(!requires_double_precision(b"DXBC\x01"));
    }

    #[test]
    fn bytecode_clones_share_bytes() {
        let bytecode = DxilBytecode::new(vec![1, 2, 3]);
        let clone = bytecode.clone();

        assert_eq!(&*bytecode, &[1, 2, 3]);
        assert_eq!(bytecode, clone);
    }
}
