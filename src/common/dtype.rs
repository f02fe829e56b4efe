//! Element types and shape arithmetic.

use std::fmt;

use crate::common::{Error, Result};

/// Element type of a buffer payload.
///
/// Buffers are typed regions of contiguous memory described by a shape and
/// an element type. `U8` covers raw byte payloads; the wider types cover
/// decoded frame planes and intermediate float results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size_of(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::I16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::U8 => "u8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// Number of elements described by a shape.
///
/// # Errors
/// Returns [`Error::InvalidShape`] for an empty shape, a zero dimension, or
/// a product that overflows. Zero-size requests are caller errors and are
/// rejected before any pool is touched.
pub fn element_count(shape: &[usize]) -> Result<usize> {
    if shape.is_empty() {
        return Err(Error::InvalidShape("empty shape".to_string()));
    }

    let mut count: usize = 1;
    for &dim in shape {
        if dim == 0 {
            return Err(Error::InvalidShape(format!(
                "zero dimension in shape {:?}",
                shape
            )));
        }
        count = count.checked_mul(dim).ok_or_else(|| {
            Error::InvalidShape(format!("shape {:?} overflows usize", shape))
        })?;
    }
    Ok(count)
}

/// Total byte size of a buffer with the given shape and element type.
pub fn byte_size(shape: &[usize], dtype: DType) -> Result<usize> {
    let count = element_count(shape)?;
    count.checked_mul(dtype.size_of()).ok_or_else(|| {
        Error::InvalidShape(format!("shape {:?} x {} overflows usize", shape, dtype))
    })
}
