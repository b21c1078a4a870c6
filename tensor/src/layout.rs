/// Returns the canonical row-major strides, in elements, for `shape`.
pub fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut acc = 1usize;

    for (stride, &size) in strides.iter_mut().zip(shape).rev() {
        *stride = acc;
        acc = acc.saturating_mul(size);
    }

    strides
}

/// Walks the byte offsets of every element of a strided layout in logical
/// row-major order.
pub(crate) struct Offsets<'t> {
    shape: &'t [usize],
    strides: &'t [usize],
    elem_size: usize,
    index: Vec<usize>,
    current: usize,
    remaining: usize,
}

impl<'t> Offsets<'t> {
    pub(crate) fn new(
        shape: &'t [usize],
        strides: &'t [usize],
        offset: usize,
        elem_size: usize,
    ) -> Self {
        Self {
            shape,
            strides,
            elem_size,
            index: vec![0; shape.len()],
            current: offset,
            remaining: shape.iter().product(),
        }
    }
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }

        let out = self.current;
        self.remaining -= 1;

        if self.remaining > 0 {
            for dim in (0..self.shape.len()).rev() {
                let step = self.strides[dim] * self.elem_size;
                self.index[dim] += 1;
                self.current += step;

                if self.index[dim] < self.shape[dim] {
                    break;
                }

                self.current -= step * self.index[dim];
                self.index[dim] = 0;
            }
        }

        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_strides_are_row_major() {
        assert_eq!(contiguous_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(contiguous_strides(&[5]), vec![1]);
        assert!(contiguous_strides(&[]).is_empty());
    }

    #[test]
    fn offsets_follow_transposed_strides() {
        // A [2, 3] buffer seen as its [3, 2] transpose.
        let shape = [3, 2];
        let strides = [1, 3];
        let offsets: Vec<_> = Offsets::new(&shape, &strides, 0, 4).collect();
        assert_eq!(offsets, vec![0, 12, 4, 16, 8, 20]);
    }

    #[test]
    fn scalar_layout_yields_a_single_offset() {
        let offsets: Vec<_> = Offsets::new(&[], &[], 8, 4).collect();
        assert_eq!(offsets, vec![8]);
    }

    #[test]
    fn empty_dimension_yields_nothing() {
        assert_eq!(Offsets::new(&[3, 0], &[0, 1], 0, 4).count(), 0);
    }
}
