//! Bounds checked primitives shared by every decoder. All integers are big
//! endian, variable sized fields are prefixed by their length.

use bytes::{Buf, BufMut};

use crate::{Header, Result, WireErr};

type LenType = u64;

fn ensure(buf: &[u8], needed: usize, field: &'static str) -> Result<()> {
    if buf.len() < needed {
        return Err(WireErr::Truncated {
            field,
            needed,
            remaining: buf.len(),
        });
    }

    Ok(())
}

pub(crate) fn get_u8(buf: &mut &[u8], field: &'static str) -> Result<u8> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut &[u8], field: &'static str) -> Result<u16> {
    ensure(buf, 2, field)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_u32(buf: &mut &[u8], field: &'static str) -> Result<u32> {
    ensure(buf, 4, field)?;
    Ok(buf.get_u32())
}

pub(crate) fn get_i32(buf: &mut &[u8], field: &'static str) -> Result<i32> {
    ensure(buf, 4, field)?;
    Ok(buf.get_i32())
}

pub(crate) fn get_u64(buf: &mut &[u8], field: &'static str) -> Result<u64> {
    ensure(buf, 8, field)?;
    Ok(buf.get_u64())
}

pub(crate) fn get_f64(buf: &mut &[u8], field: &'static str) -> Result<f64> {
    ensure(buf, 8, field)?;
    Ok(buf.get_f64())
}

/// Splits `len` bytes off the front of `buf`.
pub(crate) fn get_slice<'a>(buf: &mut &'a [u8], len: usize, field: &'static str) -> Result<&'a [u8]> {
    ensure(buf, len, field)?;
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

/// Reads a length prefixed byte field.
pub(crate) fn get_bytes<'a>(buf: &mut &'a [u8], field: &'static str) -> Result<&'a [u8]> {
    let len = get_u64(buf, field)?;
    let len = usize::try_from(len).map_err(|_| WireErr::Truncated {
        field,
        needed: usize::MAX,
        remaining: buf.len(),
    })?;

    get_slice(buf, len, field)
}

/// Reads a length prefixed utf-8 field.
pub(crate) fn get_string(buf: &mut &[u8], field: &'static str) -> Result<String> {
    let bytes = get_bytes(buf, field)?;
    let s = str::from_utf8(bytes).map_err(|_| WireErr::InvalidUtf8 { field })?;
    Ok(s.to_owned())
}

pub(crate) fn put_bytes<B: BufMut>(buf: &mut B, bytes: &[u8]) {
    buf.put_u64(bytes.len() as LenType);
    buf.put_slice(bytes);
}

/// Writes the fields produced by `fields` as one length prefixed body, so a
/// message cut anywhere after its header is detected on decode.
pub(crate) fn put_body<B: BufMut>(
    buf: &mut B,
    fields: impl FnOnce(&mut Vec<u8>) -> Result<()>,
) -> Result<()> {
    let mut body = Vec::new();
    fields(&mut body)?;
    put_bytes(buf, &body);
    Ok(())
}

/// Reads the length prefixed body of a message.
pub(crate) fn get_body<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    get_bytes(buf, "message body")
}

/// Fails if anything is left after a complete message.
pub(crate) fn expect_end(buf: &[u8]) -> Result<()> {
    if !buf.is_empty() {
        return Err(WireErr::TrailingBytes(buf.len()));
    }

    Ok(())
}

/// Consumes the header and checks it's the `expected` message kind.
pub(crate) fn expect_kind(buf: &mut &[u8], expected: Header) -> Result<()> {
    let got = get_u32(buf, "header")?;
    if got != expected {
        return Err(WireErr::UnexpectedKind { got, expected });
    }

    Ok(())
}
