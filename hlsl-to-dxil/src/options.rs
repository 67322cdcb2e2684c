//! Compile options forwarded to the native compiler.
//!
//! Options participate in cache keys, so every type here has structural
//! equality and hashing.

use bitflags::bitflags;

bitflags! {
    /// Behavior toggles mapped onto DXC command line switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompileFlags: u32 {
        /// `-Od`: disable optimizations.
        const DISABLE_OPTIMIZATION = 1;
        /// `-WX`: treat warnings as errors.
        const WARNINGS_AS_ERRORS = 1 << 1;
        /// `-Gis`: force IEEE strictness.
        const IEEE_STRICTNESS = 1 << 2;
        /// `-enable-16bit-types`.
        const ENABLE_16BIT_TYPES = 1 << 3;
        /// `-Zi`: attach debug information.
        const DEBUG_INFO = 1 << 4;
    }
}

/// The compute shader profile to target.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProfile {
    Cs6_0,
    Cs6_1,
    Cs6_2,
    Cs6_3,
    Cs6_4,
    Cs6_5,
    Cs6_6,
    Cs6_7,
}

impl ShaderProfile {
    pub const fn as_str(self) -> &'static str {
        match self {
            ShaderProfile::Cs6_0 => "cs_6_0",
            ShaderProfile::Cs6_1 => "cs_6_1",
            ShaderProfile::Cs6_2 => "cs_6_2",
            ShaderProfile::Cs6_3 => "cs_6_3",
            ShaderProfile::Cs6_4 => "cs_6_4",
            ShaderProfile::Cs6_5 => "cs_6_5",
            ShaderProfile::Cs6_6 => "cs_6_6",
            ShaderProfile::Cs6_7 => "cs_6_7",
        }
    }
}

/// Options for one HLSL compilation; an opaque, equality-comparable value at
/// the cache boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    pub profile: ShaderProfile,
    pub entry_point: String,
    pub flags: CompileFlags,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            profile: ShaderProfile::Cs6_0,
            entry_point: String::from("main"),
            flags: CompileFlags::empty(),
        }
    }
}

impl CompileOptions {
    /// Renders the DXC argument vector for these options.
    pub(crate) fn to_arguments(&self) -> Vec<String> {
        let mut arguments = vec![
            String::from("-T"),
            self.profile.as_str().to_owned(),
            String::from("-E"),
            self.entry_point.clone(),
        ];

        if self.flags.contains(CompileFlags::DISABLE_OPTIMIZATION) {
            arguments.push(String::from("-Od"));
        } else {
            arguments.push(String::from("-O3"));
        }
        if self.flags.contains(CompileFlags::WARNINGS_AS_ERRORS) {
            arguments.push(String::from("-WX"));
        }
        if self.flags.contains(CompileFlags::IEEE_STRICTNESS) {
            arguments.push(String::from("-Gis"));
        }
        if self.flags.contains(CompileFlags::ENABLE_16BIT_TYPES) {
            arguments.push(String::from("-enable-16bit-types"));
        }
        if self.flags.contains(CompileFlags::DEBUG_INFO) {
            arguments.push(String::from("-Zi"));
        }

        arguments
    }
}
