//! Owned host-side containers.

use std::ops::{Index, IndexMut};

/// A fixed-length sequence of `f64` values.
///
/// Cloning copies the data; two arrays never share storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumericArray {
    data: Vec<f64>,
}

impl NumericArray {
    /// Array of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

impl From<Vec<f64>> for NumericArray {
    fn from(data: Vec<f64>) -> Self {
        Self { data }
    }
}

impl From<&[f64]> for NumericArray {
    fn from(data: &[f64]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

impl Index<usize> for NumericArray {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.data[index]
    }
}

impl IndexMut<usize> for NumericArray {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.data[index]
    }
}

/// Row-major `size x size` matrix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SquareMatrix {
    size: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Builds a matrix from row-major data. Returns `None` when `data.len()`
    /// is not `size * size`.
    pub fn from_row_major(size: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == size * size).then_some(Self { size, data })
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.size..(row + 1) * self.size]
    }
}

impl Index<(usize, usize)> for SquareMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(col < self.size, "column {col} out of bounds");
        &self.data[row * self.size + col]
    }
}

impl IndexMut<(usize, usize)> for SquareMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        assert!(col < self.size, "column {col} out of bounds");
        &mut self.data[row * self.size + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_deep() {
        let original = NumericArray::from(vec![1.0, 2.0, 3.0]);
        let mut copy = original.clone();
        copy[0] = 42.0;
        assert_eq!(original[0], 1.0);
        assert_eq!(copy[0], 42.0);
    }

    #[test]
    fn test_empty_array() {
        let array = NumericArray::zeros(0);
        assert!(array.is_empty());
        assert_eq!(array.len(), 0);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_bounds() {
        let array = NumericArray::zeros(2);
        let _ = array[2];
    }

    #[test]
    fn test_matrix_layout() {
        let m = SquareMatrix::from_row_major(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(m.row(1), &[3.0, 4.0]);
        assert!(SquareMatrix::from_row_major(2, vec![1.0]).is_none());
    }

    #[test]
    #[should_panic]
    fn test_matrix_column_out_of_bounds() {
        let m = SquareMatrix::zeros(2);
        let _ = m[(0, 2)];
    }
}
