use parking_lot::RwLock;

/// An owned, contiguous byte buffer backing one or more tensor views.
///
/// The bytes live in a `u64` backed allocation so every element type is
/// properly aligned, the same trick the receiving end of the wire protocol
/// uses for its read buffers.
#[derive(Debug)]
pub struct Storage {
    len: usize,
    words: RwLock<Box<[u64]>>,
}

impl Storage {
    /// Creates a new zero-initialized `Storage` of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        let words = vec![0u64; len.div_ceil(size_of::<u64>())].into_boxed_slice();

        Self {
            len,
            words: RwLock::new(words),
        }
    }

    /// Creates a new `Storage` holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let storage = Self::zeroed(bytes.len());
        storage.write(|buf| buf.copy_from_slice(bytes));
        storage
    }

    /// The length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Runs `f` with shared access to the storage's bytes.
    ///
    /// Shared access is recursive, two views over the same storage can be
    /// read at the same time.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let words = self.words.read_recursive();
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        f(&bytes[..self.len])
    }

    /// Runs `f` with exclusive access to the storage's bytes.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut words = self.words.write();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
        f(&mut bytes[..self.len])
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.read(<[u8]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_storage_has_exact_length() {
        let storage = Storage::zeroed(13);
        assert_eq!(storage.len(), 13);
        assert_eq!(storage.to_vec(), vec![0; 13]);
    }

    #[test]
    fn from_bytes_copies_the_input() {
        let storage = Storage::from_bytes(&[1, 2, 3]);
        storage.write(|buf| buf[0] = 9);
        assert_eq!(storage.to_vec(), vec![9, 2, 3]);
    }
}
