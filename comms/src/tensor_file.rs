//! Self describing tensor files used for datasets: a 4 byte magic followed by
//! a single tensor record.

use std::io::{Read, Write};

use tensor::Tensor;

use crate::{Deserialize, Result, Serialize, WireErr};

pub const MAGIC: [u8; 4] = *b"TNSR";

/// Reads a tensor file out of `reader`, consuming it to the end.
///
/// # Errors
/// Propagates I/O errors, fails on a wrong magic or a malformed record.
pub fn read_tensor<R: Read>(mut reader: R) -> Result<Tensor> {
    let mut magic = [0; MAGIC.len()];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(WireErr::BadMagic(magic));
    }

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let mut buf = &bytes[..];
    let tensor = Tensor::deserialize(&mut buf)?;
    if !buf.is_empty() {
        return Err(WireErr::TrailingBytes(buf.len()));
    }

    Ok(tensor)
}

/// Writes `tensor` as a tensor file into `writer`.
pub fn write_tensor<W: Write>(mut writer: W, tensor: &Tensor) -> Result<()> {
    let mut buf = MAGIC.to_vec();
    tensor.serialize(&mut buf)?;
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tensor::DType;

    use super::*;

    #[test]
    fn written_file_reads_back() {
        let t = Tensor::from_slice(&[2, 2], &[0u8, 127, 128, 255]).unwrap();

        let mut file = Vec::new();
        write_tensor(&mut file, &t).unwrap();
        assert_eq!(&file[..4], b"TNSR");

        let back = read_tensor(Cursor::new(file)).unwrap();
        assert_eq!(back.dtype(), DType::U8);
        assert!(back.equals(&t));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let err = read_tensor(Cursor::new(b"NOPE....".to_vec())).unwrap_err();
        assert!(matches!(err, WireErr::BadMagic(m) if &m == b"NOPE"));
    }

    #[test]
    fn empty_file_is_an_io_error() {
        let err = read_tensor(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, WireErr::Io(_)));
    }
}
