use bytes::BufMut;

use crate::Result;

pub trait Serialize {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()>;
}
