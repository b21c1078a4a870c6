use crate::Result;

/// Decodes `Self` from the front of `buf`, advancing it past the consumed
/// bytes.
pub trait Deserialize: Sized {
    fn deserialize(buf: &mut &[u8]) -> Result<Self>;
}
