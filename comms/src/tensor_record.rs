use bytes::BufMut;
use tensor::{DType, Tensor, TensorErr};

use crate::{Deserialize, Result, Serialize, WireErr, codec};

/// The wire tag for each element type.
fn dtype_tag(dtype: DType) -> u8 {
    match dtype {
        DType::F32 => 1,
        DType::F64 => 2,
        DType::U8 => 3,
        DType::I32 => 4,
    }
}

fn dtype_from_tag(tag: u8) -> Result<DType> {
    match tag {
        1 => Ok(DType::F32),
        2 => Ok(DType::F64),
        3 => Ok(DType::U8),
        4 => Ok(DType::I32),
        tag => Err(WireErr::UnknownDtype(tag)),
    }
}

/// A tensor record is laid out as
///
/// | dtype: u8 | rank: u32 | dims: rank * i32 | count: u64 | len: u64 | payload |
///
/// where the payload is the row-major element bytes. Non contiguous tensors
/// are materialized before being written.
impl Serialize for Tensor {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let dense = self.as_contiguous()?;

        buf.put_u8(dtype_tag(dense.dtype()));
        buf.put_u32(dense.rank() as u32);
        for (dim, &size) in dense.shape().iter().enumerate() {
            let size = i32::try_from(size).map_err(|_| WireErr::DimensionTooLarge { dim, size })?;
            buf.put_i32(size);
        }

        buf.put_u64(dense.numel() as u64);
        codec::put_bytes(buf, &dense.to_bytes()?);
        Ok(())
    }
}

impl Deserialize for Tensor {
    fn deserialize(buf: &mut &[u8]) -> Result<Self> {
        let dtype = dtype_from_tag(codec::get_u8(buf, "tensor dtype")?)?;
        let rank = codec::get_u32(buf, "tensor rank")? as usize;

        // every dimension takes 4 bytes, refuse ranks the buffer can't hold
        // before allocating for them.
        if rank.saturating_mul(size_of::<i32>()) > buf.len() {
            return Err(WireErr::Truncated {
                field: "tensor shape",
                needed: rank.saturating_mul(size_of::<i32>()),
                remaining: buf.len(),
            });
        }

        let shape = (0..rank)
            .map(|dim| {
                let size = codec::get_i32(buf, "tensor shape")?;
                usize::try_from(size).map_err(|_| {
                    WireErr::from(TensorErr::NegativeDimension {
                        dim,
                        size: i64::from(size),
                    })
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let count = codec::get_u64(buf, "tensor count")?;
        let payload = codec::get_bytes(buf, "tensor payload")?;

        // sizes come from the header, check them against what was actually
        // received before allocating anything.
        let expected = Tensor::byte_len(dtype, &shape)?;
        let numel = expected / dtype.size();
        if count != numel as u64 {
            return Err(WireErr::TensorLength {
                got: usize::try_from(count).unwrap_or(usize::MAX),
                expected: numel,
            });
        }

        if payload.len() != expected {
            return Err(WireErr::TensorLength {
                got: payload.len(),
                expected,
            });
        }

        Ok(Tensor::from_bytes(dtype, &shape, payload)?)
    }
}
