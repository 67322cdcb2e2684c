//! Compile HLSL compute shaders to DXIL through the native DXC library,
//! with a process-wide single-flight cache.
//!
//! The entry point is [`CompilationSession`]: hand it a
//! [`BytecodeCompiler`] (usually [`DxcCompiler`]) and call
//! [`compile`](CompilationSession::compile) with the shader source and
//! [`CompileOptions`]. Every distinct `(source, options, enabled)` triple is
//! compiled at most once per process; concurrent callers for the same key
//! block until the first one resolves it, and the resolved
//! [`HlslBytecodeInfo`] (success or failure) is shared afterwards.
//!
//! Long waits and compilations are cancellable through a
//! [`CancellationToken`]; cancellation unwinds the caller without poisoning
//! the cache entry for others.

mod bytecode;
mod cache;
mod cancel;
mod dxc;
mod options;

pub use bytecode::{BytecodeCompiler, DxilBytecode, HlslBytecodeInfo};
pub use cache::{BytecodeCompilationCache, CacheKey, CompilationSession};
pub use cancel::{CancellationSource, CancellationToken, Cancelled};
pub use dxc::{compile_hlsl, DxcCompiler, LibraryLoadError};
pub use options::{CompileFlags, CompileOptions, ShaderProfile};
