use std::fmt;

/// The element types a tensor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    I32,
    F32,
    F64,
}

impl DType {
    /// The size in bytes of a single element.
    pub const fn size(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::I32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::U8 => "uint8",
            DType::I32 => "int32",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }

    /// Reads the element stored in `bytes` promoted to `f64`.
    ///
    /// `bytes` must be exactly `self.size()` long.
    pub(crate) fn read_f64(self, bytes: &[u8]) -> f64 {
        match self {
            DType::U8 => bytes[0].to_f64(),
            DType::I32 => bytemuck::pod_read_unaligned::<i32>(bytes).to_f64(),
            DType::F32 => bytemuck::pod_read_unaligned::<f32>(bytes).to_f64(),
            DType::F64 => bytemuck::pod_read_unaligned::<f64>(bytes),
        }
    }

    /// Converts `value` into this element type and stores it in `bytes`.
    ///
    /// `bytes` must be exactly `self.size()` long.
    pub(crate) fn write_f64(self, bytes: &mut [u8], value: f64) {
        match self {
            DType::U8 => bytes[0] = u8::from_f64(value),
            DType::I32 => bytes.copy_from_slice(bytemuck::bytes_of(&i32::from_f64(value))),
            DType::F32 => bytes.copy_from_slice(bytemuck::bytes_of(&f32::from_f64(value))),
            DType::F64 => bytes.copy_from_slice(bytemuck::bytes_of(&value)),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive number type that can be stored in a tensor.
///
/// Every conversion goes through `f64`, which represents all four element
/// types exactly. Converting back follows a single policy:
///
/// * float to integer truncates toward zero and saturates at the bounds of
///   the target type, `NaN` becomes `0`.
/// * integer narrowing (`i32` to `u8`) saturates.
/// * `f64` to `f32` rounds to the nearest representable value, values out of
///   range become infinite.
pub trait Element: bytemuck::Pod + PartialEq + fmt::Debug {
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            // `as` from a float saturates, truncates toward zero and maps NaN to 0.
            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
        }
    };
}

impl_element!(u8, DType::U8);
impl_element!(i32, DType::I32);
impl_element!(f32, DType::F32);
impl_element!(f64, DType::F64);
