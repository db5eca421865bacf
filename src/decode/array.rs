//! Typed channel arrays and stacked sample tensors.

use half::f16;

use crate::util::{ChannelPod, ElementType, Error, Result, Shape};

/// Dispatch on every [`ArrayData`] variant with the same body.
macro_rules! each_variant {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ArrayData::U8($v) => $body,
            ArrayData::I8($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::F16($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

/// Flat element storage in native byte order.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Copy raw bytes into a typed vector, byte-swapping each element if asked.
fn collect<T: ChannelPod>(bytes: &[u8], swap: bool) -> Vec<T> {
    let mut values: Vec<T> = bytemuck::pod_collect_to_vec(bytes);
    if swap && std::mem::size_of::<T>() > 1 {
        for v in &mut values {
            bytemuck::bytes_of_mut(v).reverse();
        }
    }
    values
}

impl ArrayData {
    /// Decode `bytes` as elements of `ty`. `swap` reverses each element's bytes.
    ///
    /// `bytes.len()` must be a multiple of the element size.
    pub fn from_bytes(ty: ElementType, bytes: &[u8], swap: bool) -> Result<Self> {
        if bytes.len() % ty.num_bytes() != 0 {
            return Err(Error::TypeMismatch {
                expected: format!("multiple of {} bytes for {}", ty.num_bytes(), ty),
                actual: format!("{} bytes", bytes.len()),
            });
        }
        Ok(Self::collect_from(ty, bytes, swap))
    }

    /// Wrap a typed vector.
    pub fn from_vec<T: ChannelPod>(values: Vec<T>) -> Self {
        Self::collect_from(T::ELEMENT_TYPE, bytemuck::cast_slice(values.as_slice()), false)
    }

    fn collect_from(ty: ElementType, bytes: &[u8], swap: bool) -> Self {
        match ty {
            ElementType::Uint8 => Self::U8(bytes.to_vec()),
            ElementType::Int8 => Self::I8(collect(bytes, false)),
            ElementType::Uint16 => Self::U16(collect(bytes, swap)),
            ElementType::Int16 => Self::I16(collect(bytes, swap)),
            ElementType::Uint32 => Self::U32(collect(bytes, swap)),
            ElementType::Int32 => Self::I32(collect(bytes, swap)),
            ElementType::Uint64 => Self::U64(collect(bytes, swap)),
            ElementType::Int64 => Self::I64(collect(bytes, swap)),
            ElementType::Float16 => Self::F16(collect(bytes, swap)),
            ElementType::Float32 => Self::F32(collect(bytes, swap)),
            ElementType::Float64 => Self::F64(collect(bytes, swap)),
        }
    }

    /// Element type of the storage.
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::U8(_) => ElementType::Uint8,
            Self::I8(_) => ElementType::Int8,
            Self::U16(_) => ElementType::Uint16,
            Self::I16(_) => ElementType::Int16,
            Self::U32(_) => ElementType::Uint32,
            Self::I32(_) => ElementType::Int32,
            Self::U64(_) => ElementType::Uint64,
            Self::I64(_) => ElementType::Int64,
            Self::F16(_) => ElementType::Float16,
            Self::F32(_) => ElementType::Float32,
            Self::F64(_) => ElementType::Float64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements as native-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        each_variant!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Typed view, `None` if `T` is not the stored type.
    pub fn as_slice<T: ChannelPod>(&self) -> Option<&[T]> {
        if T::ELEMENT_TYPE != self.element_type() {
            return None;
        }
        bytemuck::try_cast_slice(self.as_bytes()).ok()
    }

    /// Elements converted to `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::F16(v) => v.iter().map(|x| x.to_f32()).collect(),
            Self::F32(v) => v.clone(),
            Self::U8(v) => v.iter().map(|&x| x as f32).collect(),
            Self::I8(v) => v.iter().map(|&x| x as f32).collect(),
            Self::U16(v) => v.iter().map(|&x| x as f32).collect(),
            Self::I16(v) => v.iter().map(|&x| x as f32).collect(),
            Self::U32(v) => v.iter().map(|&x| x as f32).collect(),
            Self::I32(v) => v.iter().map(|&x| x as f32).collect(),
            Self::U64(v) => v.iter().map(|&x| x as f32).collect(),
            Self::I64(v) => v.iter().map(|&x| x as f32).collect(),
            Self::F64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    /// Append another storage of the same type.
    fn extend_from(&mut self, other: &ArrayData) -> Result<()> {
        let (expected, actual) = (self.element_type(), other.element_type());
        match (self, other) {
            (Self::U8(dst), Self::U8(src)) => dst.extend_from_slice(src),
            (Self::I8(dst), Self::I8(src)) => dst.extend_from_slice(src),
            (Self::U16(dst), Self::U16(src)) => dst.extend_from_slice(src),
            (Self::I16(dst), Self::I16(src)) => dst.extend_from_slice(src),
            (Self::U32(dst), Self::U32(src)) => dst.extend_from_slice(src),
            (Self::I32(dst), Self::I32(src)) => dst.extend_from_slice(src),
            (Self::U64(dst), Self::U64(src)) => dst.extend_from_slice(src),
            (Self::I64(dst), Self::I64(src)) => dst.extend_from_slice(src),
            (Self::F16(dst), Self::F16(src)) => dst.extend_from_slice(src),
            (Self::F32(dst), Self::F32(src)) => dst.extend_from_slice(src),
            (Self::F64(dst), Self::F64(src)) => dst.extend_from_slice(src),
            _ => {
                return Err(Error::TypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// One decoded channel: a shaped array.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelArray {
    shape: Shape,
    data: ArrayData,
}

impl ChannelArray {
    /// Create an array; the element count must match the shape.
    pub fn new(shape: impl Into<Shape>, data: ArrayData) -> Result<Self> {
        let shape = shape.into();
        if shape.checked_num_elements() != Some(data.len()) {
            return Err(Error::ShapeMismatch {
                channel: String::new(),
                expected: shape.sizes().to_vec(),
                actual: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// Create from a typed vector.
    pub fn from_vec<T: ChannelPod>(shape: impl Into<Shape>, values: Vec<T>) -> Result<Self> {
        Self::new(shape, ArrayData::from_vec(values))
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    #[inline]
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn as_slice<T: ChannelPod>(&self) -> Option<&[T]> {
        self.data.as_slice()
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }
}

/// Channels of one sample stacked along a new leading axis: `[C, H, W]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleTensor {
    shape: Shape,
    channels: Vec<String>,
    data: ArrayData,
}

impl SampleTensor {
    /// Stack named 2-D channels in the given order.
    ///
    /// All channels must share the spatial shape and element type of the
    /// first one.
    pub fn stack<I>(channels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ChannelArray)>,
    {
        let mut names = Vec::new();
        let mut reference: Option<(Shape, ArrayData)> = None;

        for (name, array) in channels {
            match &mut reference {
                None => {
                    if array.shape.rank() != 2 {
                        return Err(Error::ShapeMismatch {
                            channel: name,
                            expected: Vec::new(),
                            actual: array.shape.sizes().to_vec(),
                        });
                    }
                    reference = Some((array.shape, array.data));
                }
                Some((shape, data)) => {
                    if array.shape != *shape {
                        return Err(Error::ShapeMismatch {
                            channel: name,
                            expected: shape.sizes().to_vec(),
                            actual: array.shape.sizes().to_vec(),
                        });
                    }
                    data.extend_from(&array.data)?;
                }
            }
            names.push(name);
        }

        let (shape, data) =
            reference.ok_or_else(|| Error::InvariantViolation("cannot stack zero channels".into()))?;
        Ok(Self {
            shape: shape.stacked(names.len()),
            channels: names,
            data,
        })
    }

    /// `[C, H, W]`.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Number of stacked channels.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Channel names in stacking order.
    pub fn channel_names(&self) -> &[String] {
        &self.channels
    }

    #[inline]
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// All elements, channel-major.
    pub fn as_slice<T: ChannelPod>(&self) -> Option<&[T]> {
        self.data.as_slice()
    }

    /// One channel plane.
    pub fn channel<T: ChannelPod>(&self, index: usize) -> Option<&[T]> {
        let plane = self.plane_len();
        let all = self.as_slice::<T>()?;
        all.get(index * plane..(index + 1) * plane)
    }

    /// All elements as `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.data.to_f32_vec()
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    fn plane_len(&self) -> usize {
        self.shape.sizes().iter().skip(1).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(h: usize, w: usize, fill: f32) -> ChannelArray {
        ChannelArray::from_vec((h, w), vec![fill; h * w]).unwrap()
    }

    #[test]
    fn test_from_bytes_swap() {
        let be = 1.5f32.to_be_bytes();
        let data = ArrayData::from_bytes(ElementType::Float32, &be, cfg!(target_endian = "little")).unwrap();
        assert_eq!(data.as_slice::<f32>(), Some(&[1.5f32][..]));

        let err = ArrayData::from_bytes(ElementType::Uint16, &[1, 2, 3], false);
        assert!(matches!(err, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_as_slice_type_checked() {
        let data = ArrayData::from_vec(vec![1i16, -2, 3]);
        assert_eq!(data.element_type(), ElementType::Int16);
        assert_eq!(data.as_slice::<i16>(), Some(&[1i16, -2, 3][..]));
        assert!(data.as_slice::<u16>().is_none());
        assert_eq!(data.to_f32_vec(), vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_f16_to_f32() {
        let data = ArrayData::from_vec(vec![f16::from_f32(0.5), f16::from_f32(-2.0)]);
        assert_eq!(data.to_f32_vec(), vec![0.5, -2.0]);
    }

    #[test]
    fn test_channel_array_shape_checked() {
        assert!(ChannelArray::from_vec((2, 2), vec![0u8; 3]).is_err());
        let a = ChannelArray::from_vec((2, 3), vec![0u8; 6]).unwrap();
        assert_eq!(a.shape().sizes(), &[2, 3]);
    }

    #[test]
    fn test_stack() {
        let tensor = SampleTensor::stack(vec![
            ("hmi_m.npy".to_string(), plane(2, 2, 1.0)),
            ("aia_0171.npy".to_string(), plane(2, 2, 2.0)),
        ])
        .unwrap();
        assert_eq!(tensor.shape().sizes(), &[2, 2, 2]);
        assert_eq!(tensor.num_channels(), 2);
        assert_eq!(tensor.channel::<f32>(0), Some(&[1.0f32; 4][..]));
        assert_eq!(tensor.channel::<f32>(1), Some(&[2.0f32; 4][..]));
        assert!(tensor.channel::<f32>(2).is_none());
    }

    #[test]
    fn test_stack_mismatches() {
        let err = SampleTensor::stack(vec![
            ("a.npy".to_string(), plane(2, 2, 0.0)),
            ("b.npy".to_string(), plane(2, 3, 0.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { ref channel, .. } if channel == "b.npy"));

        let err = SampleTensor::stack(vec![
            ("a.npy".to_string(), plane(2, 2, 0.0)),
            ("b.npy".to_string(), ChannelArray::from_vec((2, 2), vec![0u8; 4]).unwrap()),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let cube = ChannelArray::from_vec(vec![1, 2, 2], vec![0f32; 4]).unwrap();
        let err = SampleTensor::stack(vec![("a.npy".to_string(), cube)]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));

        assert!(SampleTensor::stack(Vec::new()).is_err());
    }
}
