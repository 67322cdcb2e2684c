//! Compiling HLSL with the native DXC shared library.
//!
//! The library is loaded lazily, once per process; a failed load is cached
//! and surfaced as a [`HlslBytecodeInfo::Win32Error`] value on every call
//! rather than retried.

mod ffi;

use std::ffi::c_void;
use std::fmt::Write as _;
use std::iter;
use std::ptr;
use std::slice;
use std::sync::OnceLock;

use libloading::Library;
use thiserror::Error;

use crate::bytecode::{self, BytecodeCompiler, DxilBytecode, HlslBytecodeInfo};
use crate::cancel::{CancellationToken, Cancelled};
use crate::options::CompileOptions;
use ffi::{ComPtr, DxcBuffer, Hresult};

#[cfg(windows)]
const LIBRARY_CANDIDATES: &[&str] = &["dxcompiler.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_CANDIDATES: &[&str] = &["libdxcompiler.dylib"];
#[cfg(all(unix, not(target_os = "macos")))]
const LIBRARY_CANDIDATES: &[&str] = &["libdxcompiler.so", "libdxcompiler.so.3.7"];

/// The DXC shared library or its `DxcCreateInstance` entry point could not
/// be resolved.
#[derive(Debug, Clone, Error)]
#[error("failed to load the DXC compiler library: {message}")]
pub struct LibraryLoadError {
    pub code: i32,
    pub message: String,
}

/// A loaded DXC library; kept alive for the life of the process so the
/// entry point stays valid.
struct DxcLibrary {
    _library: Library,
    create_instance: ffi::DxcCreateInstanceFn,
}

static DXC_LIBRARY: OnceLock<Result<DxcLibrary, LibraryLoadError>> = OnceLock::new();

/// OS error code at the time of a failed load, for the `Win32Error` value.
fn last_os_error_code() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(-1)
}

impl DxcLibrary {
    fn get() -> Result<&'static DxcLibrary, LibraryLoadError> {
        DXC_LIBRARY
            .get_or_init(DxcLibrary::load)
            .as_ref()
            .map_err(Clone::clone)
    }

    fn load() -> Result<DxcLibrary, LibraryLoadError> {
        let mut last_error = None;
        for candidate in LIBRARY_CANDIDATES {
            match unsafe { Library::new(candidate) } {
                Ok(library) => {
                    let create_instance = {
                        let symbol = unsafe {
                            library.get::<ffi::DxcCreateInstanceFn>(b"DxcCreateInstance\0")
                        }
                        .map_err(|error| LibraryLoadError {
                            code: last_os_error_code(),
                            message: error.to_string(),
                        })?;
                        *symbol
                    };
                    log::debug!("loaded DXC from {candidate}");
                    return Ok(DxcLibrary {
                        _library: library,
                        create_instance,
                    });
                }
                Err(error) => {
                    last_error = Some(LibraryLoadError {
                        code: last_os_error_code(),
                        message: error.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LibraryLoadError {
            code: -1,
            message: String::from("no DXC library candidates for this platform"),
        }))
    }

    /// Runs one compilation against the loaded library.
    ///
    /// # Safety
    ///
    /// The library must actually be DXC; the vtable casts in here trust the
    /// declared ABI.
    unsafe fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
        token: &CancellationToken,
    ) -> Result<RawOutput, DxcError> {
        let mut compiler_ptr: *mut c_void = ptr::null_mut();
        let hr = (self.create_instance)(
            &ffi::CLSID_DXC_COMPILER,
            &ffi::IID_IDXC_COMPILER3,
            &mut compiler_ptr,
        );
        let compiler = checked::<ffi::IDxcCompiler3Vtbl>("DxcCreateInstance", hr, compiler_ptr)?;

        let arguments: Vec<Vec<u16>> = options
            .to_arguments()
            .iter()
            .map(|argument| argument.encode_utf16().chain(iter::once(0)).collect())
            .collect();
        let argument_ptrs: Vec<*const u16> =
            arguments.iter().map(|argument| argument.as_ptr()).collect();

        let buffer = DxcBuffer {
            ptr: source.as_ptr().cast(),
            size: source.len(),
            encoding: ffi::DXC_CP_UTF8,
        };

        let mut result_ptr: *mut c_void = ptr::null_mut();
        let hr = (compiler.vtbl().compile)(
            compiler.as_raw(),
            &buffer,
            argument_ptrs.as_ptr(),
            argument_ptrs.len() as u32,
            ptr::null_mut(),
            &ffi::IID_IDXC_RESULT,
            &mut result_ptr,
        );
        let result = checked::<ffi::IDxcResultVtbl>("IDxcCompiler3::Compile", hr, result_ptr)?;

        let mut status: Hresult = 0;
        let hr = (result.vtbl().get_status)(result.as_raw(), &mut status);
        if !ffi::succeeded(hr) {
            return Err(DxcError::Call {
                stage: "IDxcResult::GetStatus",
                hr,
            });
        }

        let errors = read_errors(&result)?;

        if !ffi::succeeded(status) {
            return Err(DxcError::Rejected {
                errors: errors.unwrap_or_else(|| {
                    let mut message = String::from("compilation failed with HRESULT ");
                    let _ = write!(message, "{status:#010x}");
                    message
                }),
            });
        }

        // Last bail-out point before the bytecode copy.
        if token.is_cancelled() {
            return Err(DxcError::Cancelled);
        }

        let mut object_ptr: *mut c_void = ptr::null_mut();
        let hr = (result.vtbl().get_output)(
            result.as_raw(),
            ffi::DXC_OUT_OBJECT,
            &ffi::IID_IDXC_BLOB,
            &mut object_ptr,
            ptr::null_mut(),
        );
        let object = checked::<ffi::IDxcBlobVtbl>("IDxcResult::GetOutput", hr, object_ptr)?;

        let data = (object.vtbl().get_buffer_pointer)(object.as_raw());
        let size = (object.vtbl().get_buffer_size)(object.as_raw());
        let object = if data.is_null() || size == 0 {
            Vec::new()
        } else {
            slice::from_raw_parts(data.cast::<u8>(), size).to_vec()
        };

        Ok(RawOutput {
            object,
            warnings: errors,
        })
    }
}

/// Reads the compiler's diagnostic text, if any.
unsafe fn read_errors(result: &ComPtr<ffi::IDxcResultVtbl>) -> Result<Option<String>, DxcError> {
    if (result.vtbl().has_output)(result.as_raw(), ffi::DXC_OUT_ERRORS) == 0 {
        return Ok(None);
    }

    let mut errors_ptr: *mut c_void = ptr::null_mut();
    let hr = (result.vtbl().get_output)(
        result.as_raw(),
        ffi::DXC_OUT_ERRORS,
        &ffi::IID_IDXC_BLOB_UTF8,
        &mut errors_ptr,
        ptr::null_mut(),
    );
    let errors = checked::<ffi::IDxcBlobUtf8Vtbl>("IDxcResult::GetOutput", hr, errors_ptr)?;

    let text = (errors.vtbl().get_string_pointer)(errors.as_raw());
    let length = (errors.vtbl().get_string_length)(errors.as_raw());
    if text.is_null() || length == 0 {
        return Ok(None);
    }

    let bytes = slice::from_raw_parts(text.cast::<u8>(), length);
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.into_owned()))
    }
}

/// Wraps an out-pointer returned by a COM call, folding the HRESULT and the
/// null check into one error path.
unsafe fn checked<V: ffi::ComVtbl>(
    stage: &'static str,
    hr: Hresult,
    ptr: *mut c_void,
) -> Result<ComPtr<V>, DxcError> {
    if !ffi::succeeded(hr) {
        return Err(DxcError::Call { stage, hr });
    }
    ComPtr::from_raw(ptr).ok_or(DxcError::Call {
        stage,
        hr: ffi::E_POINTER,
    })
}

struct RawOutput {
    object: Vec<u8>,
    warnings: Option<String>,
}

enum DxcError {
    Cancelled,
    Call { stage: &'static str, hr: Hresult },
    Rejected { errors: String },
}

/// Compiles HLSL source to DXIL bytecode with the process-wide DXC library.
///
/// Infrastructure failures come back as [`HlslBytecodeInfo`] values, never
/// as panics; only cancellation short-circuits the call.
pub fn compile_hlsl(
    source: &str,
    options: &CompileOptions,
    token: &CancellationToken,
) -> Result<HlslBytecodeInfo, Cancelled> {
    token.check()?;

    let library = match DxcLibrary::get() {
        Ok(library) => library,
        Err(error) => {
            log::warn!("DXC unavailable: {error}");
            return Ok(HlslBytecodeInfo::Win32Error {
                code: error.code,
                message: error.message,
            });
        }
    };

    token.check()?;

    match unsafe { library.compile(source, options, token) } {
        Ok(output) => {
            if let Some(warnings) = &output.warnings {
                log::debug!(
                    "DXC warnings: {}",
                    normalize_compiler_message(warnings)
                );
            }
            let requires_double_precision = bytecode::requires_double_precision(&output.object);
            Ok(HlslBytecodeInfo::Success {
                bytecode: DxilBytecode::new(output.object),
                requires_double_precision,
            })
        }
        Err(DxcError::Cancelled) => Err(Cancelled),
        Err(DxcError::Call { stage, hr }) => Ok(HlslBytecodeInfo::Win32Error {
            code: hr,
            message: format!("{stage} failed with HRESULT {hr:#010x}"),
        }),
        Err(DxcError::Rejected { errors }) => Ok(HlslBytecodeInfo::CompilerError {
            message: normalize_compiler_message(&errors),
        }),
    }
}

/// The DXC-backed [`BytecodeCompiler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DxcCompiler;

impl DxcCompiler {
    pub fn new() -> Self {
        DxcCompiler
    }
}

impl BytecodeCompiler for DxcCompiler {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
        token: &CancellationToken,
    ) -> Result<HlslBytecodeInfo, Cancelled> {
        compile_hlsl(source, options, token)
    }
}

/// Flattens DXC's multi-line diagnostic dump into a single line.
///
/// Source echo lines, caret markers, and `note:` follow-ups are dropped; only
/// lines carrying an `error:` or `warning:` header survive, with the header
/// bracketed so the segments stay readable after joining. A dump without any
/// such header (an internal compiler failure, say) is kept line by line
/// instead of being normalized away.
fn normalize_compiler_message(message: &str) -> String {
    fn has_severity_header(line: &str) -> bool {
        line.contains("error:") || line.contains("warning:")
    }

    let any_header = message
        .lines()
        .any(|line| has_severity_header(line) && !line.contains("note:"));
    let mut segments = Vec::new();

    for line in message.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().all(|c| c == '^' || c == '~' || c == ' ') {
            continue;
        }
        if trimmed.contains("note:") {
            continue;
        }
        if any_header && !has_severity_header(trimmed) {
            continue;
        }

        let line = trimmed.replacen("error:", "[error]", 1);
        let line = line.replacen("warning:", "[warning]", 1);
        segments.push(line);
    }

    segments.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_drops_carets_and_notes() {
        let raw = "shader.hlsl:3:14: error: use of undeclared identifier 'foo'\n\
                   \x20   float x = foo;\n\
                   \x20             ^\n\
                   shader.hlsl:1:1: note: declared here\n\
                   \n\
                   shader.hlsl:7:2: warning: unused variable 'y'\n";
        let normalized = normalize_compiler_message(raw);

        assert_eq!(
            normalized,
            "shader.hlsl:3:14: [error] use of undeclared identifier 'foo' \
             shader.hlsl:7:2: [warning] unused variable 'y'"
        );
    }

    #[test]
    fn normalization_brackets_only_the_first_marker() {
        let raw = "x.hlsl:1:1: error: error: nested message";
        assert_eq!(
            normalize_compiler_message(raw),
            "x.hlsl:1:1: [error] error: nested message"
        );
    }

    #[test]
    fn normalization_keeps_headerless_dumps_intact() {
        let raw = "internal compiler failure\nplease file a bug\n";
        assert_eq!(
            normalize_compiler_message(raw),
            "internal compiler failure please file a bug"
        );
    }

    #[test]
    fn normalization_of_empty_input_is_empty() {
        assert_eq!(normalize_compiler_message(""), "");
        assert_eq!(normalize_compiler_message("\n  \n ^^^ \n"), "");
    }

    #[test]
    fn cancelled_token_short_circuits_before_loading() {
        let source = crate::cancel::CancellationSource::new();
        let token = source.token();
        source.cancel();

        let outcome = compile_hlsl("", &CompileOptions::default(), &token);
        assert_eq!(outcome, Err(Cancelled));
    }
}
