//! The fixed set of HLSL primitive shapes and resource kinds understood by
//! the layout planner.

/// Scalar element type of an HLSL primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarKind {
    /// Size of the scalar in bytes inside a constant buffer.
    ///
    /// HLSL widens `bool` to 4 bytes in constant buffers.
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::Double => 8,
            _ => 4,
        }
    }

    /// The HLSL source name of the scalar.
    pub const fn hlsl_name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::UInt => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }
}

/// One of the known HLSL scalar, vector or matrix shapes.
///
/// Vector lanes and matrix dimensions are in `1..=4`; the classifier rejects
/// anything outside that range before a value of this type is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HlslType {
    Scalar(ScalarKind),
    Vector(ScalarKind, u32),
    Matrix(ScalarKind, u32, u32),
}

impl HlslType {
    pub const fn scalar(self) -> ScalarKind {
        match self {
            HlslType::Scalar(kind) | HlslType::Vector(kind, _) | HlslType::Matrix(kind, _, _) => {
                kind
            }
        }
    }

    /// Total unpadded size of the value in bytes.
    pub const fn size(self) -> usize {
        match self {
            HlslType::Scalar(kind) => kind.size(),
            HlslType::Vector(kind, lanes) => kind.size() * lanes as usize,
            HlslType::Matrix(kind, rows, columns) => kind.size() * (rows * columns) as usize,
        }
    }

    /// Packing alignment: the scalar element size.
    pub const fn pack(self) -> usize {
        self.scalar().size()
    }

    /// Whether the value occupies one contiguous run of bytes.
    ///
    /// Matrices with more than one row are laid out one register per row and
    /// are handled by the non-linear matrix path instead.
    pub const fn is_linear(self) -> bool {
        !matches!(self, HlslType::Matrix(_, rows, _) if rows > 1)
    }

    /// The HLSL source name, e.g. `float3` or `double2x2`.
    pub fn hlsl_name(self) -> String {
        match self {
            HlslType::Scalar(kind) => kind.hlsl_name().to_owned(),
            HlslType::Vector(kind, lanes) => format!("{}{}", kind.hlsl_name(), lanes),
            HlslType::Matrix(kind, rows, columns) => {
                format!("{}{}x{}", kind.hlsl_name(), rows, columns)
            }
        }
    }
}

/// A typed GPU resource handle captured by a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ConstantBuffer,
    ReadOnlyBuffer,
    ReadWriteBuffer,
    ReadOnlyTexture2D,
    ReadWriteTexture2D,
    ReadOnlyTexture3D,
    ReadWriteTexture3D,
}

/// The register category a resource binds to.
///
/// The mapping from [`ResourceKind`] is fixed, it is not a configuration
/// knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    /// `b` registers (CBV).
    ConstantBufferView,
    /// `t` registers (SRV).
    ReadOnlyView,
    /// `u` registers (UAV).
    ReadWriteView,
}

impl ResourceKind {
    pub const fn category(self) -> ResourceCategory {
        match self {
            ResourceKind::ConstantBuffer => ResourceCategory::ConstantBufferView,
            ResourceKind::ReadOnlyBuffer
            | ResourceKind::ReadOnlyTexture2D
            | ResourceKind::ReadOnlyTexture3D => ResourceCategory::ReadOnlyView,
            ResourceKind::ReadWriteBuffer
            | ResourceKind::ReadWriteTexture2D
            | ResourceKind::ReadWriteTexture3D => ResourceCategory::ReadWriteView,
        }
    }
}
