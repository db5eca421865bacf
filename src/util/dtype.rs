//! Element types - the numeric storage types a channel array may hold.

use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt;

/// Numeric element type of a decoded channel.
///
/// Mirrors the fixed-width numpy dtypes an `.npy` channel file can carry.
/// Each type has a fixed size and well-defined binary representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementType {
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Signed 8-bit integer
    Int8 = 2,
    /// Unsigned 16-bit integer
    Uint16 = 3,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Unsigned 32-bit integer
    Uint32 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Unsigned 64-bit integer
    Uint64 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16 = 9,
    /// 32-bit floating point (IEEE 754 single precision)
    Float32 = 10,
    /// 64-bit floating point (IEEE 754 double precision)
    Float64 = 11,
}

impl ElementType {
    /// Returns the size in bytes of a single element of this type.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Returns the numpy name of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Uint64 => "uint64",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Parse a numpy type code without its byte-order character (`"f4"`, `"u1"`).
    pub fn from_type_code(code: &str) -> Option<Self> {
        let ty = match code {
            "u1" => Self::Uint8,
            "i1" => Self::Int8,
            "u2" => Self::Uint16,
            "i2" => Self::Int16,
            "u4" => Self::Uint32,
            "i4" => Self::Int32,
            "u8" => Self::Uint64,
            "i8" => Self::Int64,
            "f2" => Self::Float16,
            "f4" => Self::Float32,
            "f8" => Self::Float64,
            _ => return None,
        };
        Some(ty)
    }

    /// Numpy type code without byte order.
    pub const fn type_code(self) -> &'static str {
        match self {
            Self::Uint8 => "u1",
            Self::Int8 => "i1",
            Self::Uint16 => "u2",
            Self::Int16 => "i2",
            Self::Uint32 => "u4",
            Self::Int32 => "i4",
            Self::Uint64 => "u8",
            Self::Int64 => "i8",
            Self::Float16 => "f2",
            Self::Float32 => "f4",
            Self::Float64 => "f8",
        }
    }

    /// Returns true if this is a floating point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Types that can be stored as channel elements.
pub trait ChannelPod: Pod + Zeroable + Copy + Default {
    /// The corresponding ElementType enum value.
    const ELEMENT_TYPE: ElementType;
}

impl ChannelPod for u8 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint8;
}

impl ChannelPod for i8 {
    const ELEMENT_TYPE: ElementType = ElementType::Int8;
}

impl ChannelPod for u16 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint16;
}

impl ChannelPod for i16 {
    const ELEMENT_TYPE: ElementType = ElementType::Int16;
}

impl ChannelPod for u32 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint32;
}

impl ChannelPod for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::Int32;
}

impl ChannelPod for u64 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint64;
}

impl ChannelPod for i64 {
    const ELEMENT_TYPE: ElementType = ElementType::Int64;
}

impl ChannelPod for f16 {
    const ELEMENT_TYPE: ElementType = ElementType::Float16;
}

impl ChannelPod for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Float32;
}

impl ChannelPod for f64 {
    const ELEMENT_TYPE: ElementType = ElementType::Float64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(ElementType::Uint8.num_bytes(), 1);
        assert_eq!(ElementType::Float16.num_bytes(), 2);
        assert_eq!(ElementType::Int32.num_bytes(), 4);
        assert_eq!(ElementType::Float64.num_bytes(), 8);
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(ElementType::from_type_code("f4"), Some(ElementType::Float32));
        assert_eq!(ElementType::from_type_code("c8"), None);
        assert_eq!(ElementType::Float32.type_code(), "f4");
        assert_eq!(<f16 as ChannelPod>::ELEMENT_TYPE, ElementType::Float16);
        assert_eq!(ElementType::Int16.to_string(), "int16");
    }
}
