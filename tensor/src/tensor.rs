use std::{fmt, sync::Arc};

use crate::{
    DType, Element, Result, Storage, TensorErr,
    layout::{Offsets, contiguous_strides},
};

/// A dtype-tagged, strided, N-dimensional view over a shared `Storage`.
///
/// Views produced by `view`, `permute` and `narrow` share their parent's
/// storage, the storage is freed once the last view is dropped.
#[derive(Clone)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
    storage: Arc<Storage>,
}

impl Tensor {
    /// Allocates a new zero-initialized tensor.
    ///
    /// # Arguments
    /// * `dtype` - The element type.
    /// * `shape` - The size of every dimension.
    ///
    /// # Returns
    /// The new tensor or an error if any dimension is negative or the byte
    /// size does not fit in a signed 64 bit integer.
    pub fn allocate(dtype: DType, shape: &[i64]) -> Result<Self> {
        let shape = shape
            .iter()
            .enumerate()
            .map(|(dim, &size)| {
                usize::try_from(size).map_err(|_| TensorErr::NegativeDimension { dim, size })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::zeros(dtype, &shape)
    }

    /// Allocates a new zero-initialized tensor from an unsigned shape.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Result<Self> {
        let nbytes = byte_size(dtype, shape)?;

        Ok(Self {
            dtype,
            strides: contiguous_strides(shape),
            shape: shape.to_vec(),
            offset: 0,
            storage: Arc::new(Storage::zeroed(nbytes)),
        })
    }

    /// Creates a new contiguous tensor holding a copy of `data`.
    ///
    /// # Arguments
    /// * `shape` - The size of every dimension.
    /// * `data` - The elements in row-major order.
    pub fn from_slice<T: Element>(shape: &[usize], data: &[T]) -> Result<Self> {
        let tensor = Self::zeros(T::DTYPE, shape)?;
        tensor.copy_from(data)?;
        Ok(tensor)
    }

    /// Creates a new contiguous tensor holding a copy of the raw row-major
    /// `bytes`.
    pub fn from_bytes(dtype: DType, shape: &[usize], bytes: &[u8]) -> Result<Self> {
        let tensor = Self::zeros(dtype, shape)?;
        tensor.copy_from_bytes(bytes)?;
        Ok(tensor)
    }

    /// The number of storage bytes a contiguous tensor of `dtype` and
    /// `shape` takes, computed without allocating.
    ///
    /// # Errors
    /// `SizeOverflow` if the size does not fit in a signed 64 bit integer.
    pub fn byte_len(dtype: DType, shape: &[usize]) -> Result<usize> {
        byte_size(dtype, shape)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The strides, in elements, for every dimension.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// The offset in bytes of the first element into the storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The total amount of elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Whether `self` and `other` are views over the same storage.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// A tensor is contiguous iff its strides are the canonical row-major
    /// strides for its shape.
    pub fn is_contiguous(&self) -> bool {
        self.strides == contiguous_strides(&self.shape)
    }

    /// Bulk copies `data` into the entire storage.
    ///
    /// # Returns
    /// An error if `T` is not this tensor's element type or if `data` does
    /// not cover the storage exactly.
    pub fn copy_from<T: Element>(&self, data: &[T]) -> Result<()> {
        if T::DTYPE != self.dtype {
            return Err(TensorErr::DtypeMismatch {
                got: T::DTYPE,
                expected: self.dtype,
            });
        }

        self.copy_from_bytes(bytemuck::cast_slice(data))
    }

    /// Bulk copies raw `bytes` into the entire storage.
    pub fn copy_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        let expected = self.storage.len();
        if bytes.len() != expected {
            return Err(TensorErr::LengthMismatch {
                got: bytes.len(),
                expected,
            });
        }

        self.storage.write(|buf| buf.copy_from_slice(bytes));
        Ok(())
    }

    /// Reinterprets a contiguous tensor with a different shape holding the
    /// same amount of elements. Never copies.
    pub fn view(&self, shape: &[usize]) -> Result<Tensor> {
        if !self.is_contiguous() {
            return Err(TensorErr::NotContiguous);
        }

        let to = byte_size(self.dtype, shape)? / self.dtype.size();
        let from = self.numel();
        if from != to {
            return Err(TensorErr::ElementCountMismatch { from, to });
        }

        Ok(Self {
            shape: shape.to_vec(),
            strides: contiguous_strides(shape),
            ..self.clone()
        })
    }

    /// Reorders the dimensions following `axes`. Never copies.
    ///
    /// # Arguments
    /// * `axes` - A permutation of `0..rank`, the `i`-th dimension of the
    ///            result is the `axes[i]`-th dimension of `self`.
    pub fn permute(&self, axes: &[usize]) -> Result<Tensor> {
        let rank = self.rank();
        let invalid = || TensorErr::InvalidPermutation {
            axes: axes.to_vec(),
            rank,
        };

        if axes.len() != rank {
            return Err(invalid());
        }

        let mut seen = vec![false; rank];
        for &axis in axes {
            match seen.get_mut(axis) {
                Some(flag) if !*flag => *flag = true,
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            shape: axes.iter().map(|&a| self.shape[a]).collect(),
            strides: axes.iter().map(|&a| self.strides[a]).collect(),
            ..self.clone()
        })
    }

    /// Restricts dimension `dim` to `start..start + length`. Never copies.
    pub fn narrow(&self, dim: usize, start: usize, length: usize) -> Result<Tensor> {
        let rank = self.rank();
        let size = *self
            .shape
            .get(dim)
            .ok_or(TensorErr::DimOutOfRange { dim, rank })?;

        let out_of_bounds = TensorErr::NarrowOutOfBounds {
            dim,
            start,
            length,
            size,
        };

        match start.checked_add(length) {
            Some(end) if end <= size => {}
            _ => return Err(out_of_bounds),
        }

        let mut shape = self.shape.clone();
        shape[dim] = length;

        Ok(Self {
            shape,
            offset: self.offset + start * self.strides[dim] * self.dtype.size(),
            ..self.clone()
        })
    }

    /// Converts every element into `dtype` following the `Element`
    /// conversion policy. Always allocates new storage.
    pub fn cast(&self, dtype: DType) -> Result<Tensor> {
        self.map_into(dtype, |value| value)
    }

    /// Returns `self` if it's already contiguous, otherwise a contiguous
    /// copy preserving the logical element order.
    pub fn as_contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }

        let out = Self::zeros(self.dtype, &self.shape)?;
        let size = self.dtype.size();

        self.storage.read(|src| {
            out.storage.write(|dst| {
                for (chunk, off) in dst.chunks_exact_mut(size).zip(self.offsets()) {
                    chunk.copy_from_slice(&src[off..off + size]);
                }
            })
        });

        Ok(out)
    }

    /// The logical elements as row-major bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tensor = self.as_contiguous()?;
        let start = tensor.offset;
        let end = start + tensor.numel() * tensor.dtype.size();
        Ok(tensor.storage.read(|bytes| bytes[start..end].to_vec()))
    }

    /// The logical elements in row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(TensorErr::DtypeMismatch {
                got: T::DTYPE,
                expected: self.dtype,
            });
        }

        let size = self.dtype.size();
        let values: Vec<T> = self.storage.read(|bytes| {
            self.offsets()
                .map(|off| bytemuck::pod_read_unaligned(&bytes[off..off + size]))
                .collect()
        });

        Ok(values)
    }

    /// Reads the element at `indices` promoted to `f64`.
    pub fn get_element_as_float(&self, indices: &[usize]) -> Result<f64> {
        if indices.len() != self.rank() {
            return Err(TensorErr::RankMismatch {
                got: indices.len(),
                expected: self.rank(),
            });
        }

        let mut off = self.offset;
        for (dim, ((&index, &size), &stride)) in
            indices.iter().zip(&self.shape).zip(&self.strides).enumerate()
        {
            if index >= size {
                return Err(TensorErr::IndexOutOfBounds { dim, index, size });
            }

            off += index * stride * self.dtype.size();
        }

        let size = self.dtype.size();
        Ok(self
            .storage
            .read(|bytes| self.dtype.read_f64(&bytes[off..off + size])))
    }

    /// Element-wise equality, tensors of different dtype or shape are never
    /// equal.
    pub fn equals(&self, other: &Tensor) -> bool {
        if self.dtype != other.dtype || self.shape != other.shape {
            return false;
        }

        let size = self.dtype.size();
        self.storage.read(|a| {
            other.storage.read(|b| {
                self.offsets()
                    .zip(other.offsets())
                    .all(|(x, y)| a[x..x + size] == b[y..y + size])
            })
        })
    }

    /// The euclidean distance between two tensors of the same dtype and
    /// shape.
    pub fn euclidean_distance(&self, other: &Tensor) -> Result<f64> {
        self.ensure_same_layout(other)?;

        let a = self.to_f64_values();
        let b = other.to_f64_values();
        let sum: f64 = a.iter().zip(&b).map(|(x, y)| (x - y).powi(2)).sum();

        Ok(sum.sqrt())
    }

    /// Divides every element by `divisor`, only defined for float tensors.
    pub fn div_scalar(&self, divisor: f64) -> Result<Tensor> {
        if !self.dtype.is_float() {
            return Err(TensorErr::UnsupportedDtype {
                op: "div_scalar",
                dtype: self.dtype,
            });
        }

        self.map_into(self.dtype, |value| value / divisor)
    }

    fn ensure_same_layout(&self, other: &Tensor) -> Result<()> {
        if self.dtype != other.dtype {
            return Err(TensorErr::DtypeMismatch {
                got: other.dtype,
                expected: self.dtype,
            });
        }

        if self.shape != other.shape {
            return Err(TensorErr::ShapeMismatch {
                a: self.shape.clone(),
                b: other.shape.clone(),
            });
        }

        Ok(())
    }

    fn to_f64_values(&self) -> Vec<f64> {
        let size = self.dtype.size();
        self.storage.read(|bytes| {
            self.offsets()
                .map(|off| self.dtype.read_f64(&bytes[off..off + size]))
                .collect()
        })
    }

    fn map_into(&self, dtype: DType, f: impl Fn(f64) -> f64) -> Result<Tensor> {
        let out = Self::zeros(dtype, &self.shape)?;
        let values = self.to_f64_values();

        out.storage.write(|dst| {
            for (chunk, value) in dst.chunks_exact_mut(dtype.size()).zip(values) {
                dtype.write_f64(chunk, f(value));
            }
        });

        Ok(out)
    }

    fn offsets(&self) -> Offsets<'_> {
        Offsets::new(&self.shape, &self.strides, self.offset, self.dtype.size())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("storage_len", &self.storage.len())
            .finish()
    }
}

/// Computes `prod(shape) * dtype.size()`, rejecting anything that doesn't fit
/// in an `i64`.
fn byte_size(dtype: DType, shape: &[usize]) -> Result<usize> {
    let nbytes = shape
        .iter()
        .try_fold(dtype.size(), |acc, &size| acc.checked_mul(size))
        .ok_or(TensorErr::SizeOverflow)?;

    if i64::try_from(nbytes).is_err() {
        return Err(TensorErr::SizeOverflow);
    }

    Ok(nbytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        let data: Vec<f32> = (1..=n).map(|x| x as f32).collect();
        Tensor::from_slice(shape, &data).unwrap()
    }

    #[test]
    fn allocate_rejects_negative_dimensions() {
        let err = Tensor::allocate(DType::F32, &[2, -1]).unwrap_err();
        assert_eq!(err, TensorErr::NegativeDimension { dim: 1, size: -1 });
    }

    #[test]
    fn allocate_sizes_storage_by_dtype() {
        let t = Tensor::allocate(DType::F64, &[2, 3]).unwrap();
        assert_eq!(t.storage().len(), 48);
        assert_eq!(t.strides(), &[3, 1]);
        assert!(t.is_contiguous());
    }

    #[test]
    fn allocate_rejects_overflowing_shapes() {
        let err = Tensor::allocate(DType::F64, &[i64::MAX, 2]).unwrap_err();
        assert_eq!(err, TensorErr::SizeOverflow);
    }

    #[test]
    fn byte_len_matches_allocation_without_allocating() {
        assert_eq!(Tensor::byte_len(DType::I32, &[3, 5]).unwrap(), 60);
        assert_eq!(Tensor::byte_len(DType::F64, &[0, 1 << 40]).unwrap(), 0);
        assert_eq!(
            Tensor::byte_len(DType::F64, &[usize::MAX, 2]),
            Err(TensorErr::SizeOverflow)
        );
    }

    #[test]
    fn copy_from_requires_exact_length() {
        let t = Tensor::allocate(DType::F32, &[2, 2]).unwrap();
        let err = t.copy_from(&[1.0f32, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, TensorErr::LengthMismatch { got: 12, expected: 16 });
    }

    #[test]
    fn copy_from_requires_matching_dtype() {
        let t = Tensor::allocate(DType::F32, &[2]).unwrap();
        assert!(matches!(
            t.copy_from(&[1.0f64, 2.0]),
            Err(TensorErr::DtypeMismatch { .. })
        ));
    }

    #[test]
    fn view_shares_storage() {
        let t = iota(&[2, 3]);
        let v = t.view(&[3, 2]).unwrap();
        assert!(v.shares_storage(&t));
        assert_eq!(v.get_element_as_float(&[2, 1]).unwrap(), 6.0);
    }

    #[test]
    fn view_rejects_different_element_count() {
        let t = iota(&[2, 3]);
        assert_eq!(
            t.view(&[4, 2]).unwrap_err(),
            TensorErr::ElementCountMismatch { from: 6, to: 8 }
        );
    }

    #[test]
    fn view_rejects_non_contiguous_source() {
        let t = iota(&[2, 3]).permute(&[1, 0]).unwrap();
        assert_eq!(t.view(&[6]).unwrap_err(), TensorErr::NotContiguous);
    }

    #[test]
    fn permute_rejects_invalid_orderings() {
        let t = iota(&[2, 3, 4]);
        assert!(t.permute(&[0, 1]).is_err());
        assert!(t.permute(&[0, 0, 1]).is_err());
        assert!(t.permute(&[0, 1, 3]).is_err());
    }

    #[test]
    fn narrow_restricts_one_dimension() {
        let t = iota(&[3, 2]);
        let n = t.narrow(0, 1, 2).unwrap();
        assert_eq!(n.shape(), &[2, 2]);
        assert!(n.shares_storage(&t));
        assert_eq!(n.to_vec::<f32>().unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn narrow_past_the_end_fails() {
        let t = iota(&[3, 2]);
        assert_eq!(
            t.narrow(0, 0, 4).unwrap_err(),
            TensorErr::NarrowOutOfBounds {
                dim: 0,
                start: 0,
                length: 4,
                size: 3
            }
        );
        assert!(matches!(
            t.narrow(2, 0, 1),
            Err(TensorErr::DimOutOfRange { dim: 2, rank: 2 })
        ));
    }

    #[test]
    fn narrow_on_inner_dimension_is_not_contiguous() {
        let t = iota(&[2, 3]);
        let n = t.narrow(1, 1, 2).unwrap();
        assert!(!n.is_contiguous());
        assert_eq!(n.to_bytes().unwrap().len(), 16);
        assert_eq!(n.to_vec::<f32>().unwrap(), vec![2.0, 3.0, 5.0, 6.0]);
    }

    #[test]
    fn as_contiguous_materializes_logical_order() {
        let t = iota(&[2, 3]).permute(&[1, 0]).unwrap();
        let c = t.as_contiguous().unwrap();
        assert!(c.is_contiguous());
        assert!(!c.shares_storage(&t));
        assert_eq!(c.to_vec::<f32>().unwrap(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn as_contiguous_on_contiguous_tensor_shares_storage() {
        let t = iota(&[4]);
        assert!(t.as_contiguous().unwrap().shares_storage(&t));
    }

    #[test]
    fn cast_always_allocates() {
        let t = iota(&[3]);
        let c = t.cast(DType::F32).unwrap();
        assert!(!c.shares_storage(&t));
        assert!(c.equals(&t));
    }

    #[test]
    fn cast_float_to_uint8_truncates_and_saturates() {
        let t = Tensor::from_slice(&[5], &[-3.5f32, 0.9, 1.5, 254.99, 1000.0]).unwrap();
        let c = t.cast(DType::U8).unwrap();
        assert_eq!(c.to_vec::<u8>().unwrap(), vec![0, 0, 1, 254, 255]);
    }

    #[test]
    fn cast_int32_to_uint8_saturates() {
        let t = Tensor::from_slice(&[3], &[-5i32, 128, 70000]).unwrap();
        let c = t.cast(DType::U8).unwrap();
        assert_eq!(c.to_vec::<u8>().unwrap(), vec![0, 128, 255]);
    }

    #[test]
    fn get_element_checks_rank_and_bounds() {
        let t = iota(&[2, 3]);
        assert_eq!(
            t.get_element_as_float(&[1]).unwrap_err(),
            TensorErr::RankMismatch { got: 1, expected: 2 }
        );
        assert_eq!(
            t.get_element_as_float(&[1, 3]).unwrap_err(),
            TensorErr::IndexOutOfBounds {
                dim: 1,
                index: 3,
                size: 3
            }
        );
    }

    #[test]
    fn equality_requires_same_dtype_and_shape() {
        let a = iota(&[2, 3]);
        assert!(!a.equals(&a.view(&[3, 2]).unwrap()));
        assert!(!a.equals(&a.cast(DType::F64).unwrap()));
        assert!(a.equals(&a.as_contiguous().unwrap()));
    }

    #[test]
    fn euclidean_distance_of_known_tensors() {
        let a = Tensor::from_slice(&[2], &[0.0f64, 0.0]).unwrap();
        let b = Tensor::from_slice(&[2], &[3.0f64, 4.0]).unwrap();
        assert_eq!(a.euclidean_distance(&b).unwrap(), 5.0);
        assert!(a.euclidean_distance(&b.cast(DType::F32).unwrap()).is_err());
    }

    #[test]
    fn div_scalar_only_for_floats() {
        let t = Tensor::from_slice(&[2], &[255u8, 51]).unwrap();
        assert!(t.div_scalar(255.0).is_err());

        let f = t.cast(DType::F32).unwrap().div_scalar(255.0).unwrap();
        assert_eq!(f.to_vec::<f32>().unwrap(), vec![1.0, 0.2]);
    }
}
