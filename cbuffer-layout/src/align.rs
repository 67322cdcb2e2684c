//! Integer alignment helpers for HLSL constant buffer packing.

/// Returns the smallest multiple of `alignment` that is greater than or equal
/// to `size`.
///
/// `alignment` must be a power of two.
pub const fn pad(size: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());

    (size + alignment - 1) & !(alignment - 1)
}

/// Returns `offset` unchanged if the range `[offset, offset + size)` does not
/// cross a multiple of `alignment`, otherwise pads `offset` up to the next
/// multiple.
///
/// HLSL packing allows a value to sit anywhere inside a 16-byte register, but
/// never lets it straddle two registers.
pub const fn align_to_boundary(offset: usize, size: usize, alignment: usize) -> usize {
    if offset / alignment == (offset + size - 1) / alignment {
        offset
    } else {
        pad(offset, alignment)
    }
}
