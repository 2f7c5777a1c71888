//! Stripe layout: splitting object content into equal-length data rows
//!
//! Content of `size` bytes is zero-padded to a whole number of stripes
//! (`data_count * chunk_size` bytes each) and reshaped row-major into
//! `data_count` rows of `chunk_size * stripe_count` bytes. Row `i` always
//! belongs to the `i`-th data node of the object.

use crate::matrix::Matrix;

/// Default chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeLayout {
    data_count: usize,
    chunk_size: usize,
}

impl StripeLayout {
    pub fn new(data_count: usize, chunk_size: usize) -> Self {
        Self {
            data_count,
            chunk_size,
        }
    }

    pub fn data_count(&self) -> usize {
        self.data_count
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes covered by one stripe across all data rows
    pub fn stripe_size(&self) -> usize {
        self.data_count * self.chunk_size
    }

    /// Number of stripes needed for `size` bytes (zero for empty content)
    pub fn stripe_count(&self, size: usize) -> usize {
        size.div_ceil(self.stripe_size())
    }

    /// Length of every data and parity row for content of `size` bytes
    pub fn row_len(&self, size: usize) -> usize {
        self.chunk_size * self.stripe_count(size)
    }

    pub fn padded_len(&self, size: usize) -> usize {
        self.stripe_size() * self.stripe_count(size)
    }

    /// Pad with zeros and reshape into `data_count` rows
    pub fn split(&self, content: &[u8]) -> Matrix {
        let mut padded = Vec::with_capacity(self.padded_len(content.len()));
        padded.extend_from_slice(content);
        padded.resize(self.padded_len(content.len()), 0);

        Matrix::from_row_major(self.data_count, self.row_len(content.len()), padded)
    }

    /// Concatenate rows in order and drop the padding
    pub fn merge(&self, rows: &Matrix, size: usize) -> Vec<u8> {
        let bytes = rows.as_bytes();
        bytes[..size.min(bytes.len())].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        let layout = StripeLayout::new(3, DEFAULT_CHUNK_SIZE);

        assert_eq!(layout.stripe_size(), 48);
        assert_eq!(layout.stripe_count(0), 0);
        assert_eq!(layout.stripe_count(1), 1);
        assert_eq!(layout.stripe_count(48), 1);
        assert_eq!(layout.stripe_count(49), 2);
        assert_eq!(layout.row_len(49), 32);
        assert_eq!(layout.padded_len(49), 96);
    }

    #[test]
    fn test_split_pads_with_zeros() {
        let layout = StripeLayout::new(2, 4);
        let rows = layout.split(&[1, 2, 3, 4, 5]);

        assert_eq!(rows.rows(), 2);
        assert_eq!(rows.row(0), &[1, 2, 3, 4]);
        assert_eq!(rows.row(1), &[5, 0, 0, 0]);
    }

    #[test]
    fn test_split_empty_content() {
        let layout = StripeLayout::new(3, DEFAULT_CHUNK_SIZE);
        let rows = layout.split(&[]);

        assert_eq!((rows.rows(), rows.cols()), (3, 0));
        assert!(layout.merge(&rows, 0).is_empty());
    }

    #[test]
    fn test_merge_truncates() {
        let layout = StripeLayout::new(2, 4);
        let content = b"hello";
        let rows = layout.split(content);

        assert_eq!(layout.merge(&rows, content.len()), content);
    }
}
