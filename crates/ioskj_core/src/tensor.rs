//! Dense multi-axis arrays of `f64` with row-major storage.
//!
//! `Tensor<D>` is indexed by `[usize; D]` and supports the handful of
//! operations the engine needs: broadcast assignment, elementwise assignment
//! from a closure, and reduction onto a subset of axes.

use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<const D: usize> {
    shape: [usize; D],
    strides: [usize; D],
    data: Vec<f64>,
}

impl<const D: usize> Tensor<D> {
    pub fn zeros(shape: [usize; D]) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: [usize; D], value: f64) -> Self {
        let mut strides = [0usize; D];
        let mut stride = 1usize;
        for axis in (0..D).rev() {
            strides[axis] = stride;
            stride *= shape[axis];
        }
        Self {
            shape,
            strides,
            data: vec![value; stride],
        }
    }

    pub fn from_fn(shape: [usize; D], f: impl FnMut([usize; D]) -> f64) -> Self {
        let mut tensor = Self::zeros(shape);
        tensor.assign_with(f);
        tensor
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
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

    pub fn get(&self, index: [usize; D]) -> Option<f64> {
        if index.iter().zip(self.shape.iter()).any(|(i, n)| i >= n) {
            return None;
        }
        Some(self.data[self.offset(index)])
    }

    /// Broadcast a scalar to every element.
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Assign every element from a function of its index.
    pub fn assign_with(&mut self, mut f: impl FnMut([usize; D]) -> f64) {
        for flat in 0..self.data.len() {
            let index = self.unravel(flat);
            self.data[flat] = f(index);
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Smallest element, or NaN if any element is NaN.
    pub fn min(&self) -> f64 {
        self.data.iter().fold(f64::INFINITY, |acc, &v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                acc.min(v)
            }
        })
    }

    /// Sum over every axis not listed in `keep`. The result's axes follow the
    /// order given in `keep`.
    pub fn aggregate<const K: usize>(&self, keep: [usize; K]) -> Tensor<K> {
        for (i, &axis) in keep.iter().enumerate() {
            assert!(axis < D, "axis {} out of range for rank {}", axis, D);
            assert!(
                !keep[..i].contains(&axis),
                "axis {} listed more than once",
                axis
            );
        }
        let mut out = Tensor::zeros(keep.map(|axis| self.shape[axis]));
        for (flat, value) in self.data.iter().enumerate() {
            let index = self.unravel(flat);
            out[keep.map(|axis| index[axis])] += *value;
        }
        out
    }

    /// Iterate over `(index, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = ([usize; D], f64)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(move |(flat, value)| (self.unravel(flat), *value))
    }

    fn offset(&self, index: [usize; D]) -> usize {
        let mut flat = 0;
        for axis in 0..D {
            assert!(
                index[axis] < self.shape[axis],
                "index {} out of bounds for axis {} of length {}",
                index[axis],
                axis,
                self.shape[axis]
            );
            flat += index[axis] * self.strides[axis];
        }
        flat
    }

    fn unravel(&self, mut flat: usize) -> [usize; D] {
        let mut index = [0usize; D];
        for axis in 0..D {
            index[axis] = flat / self.strides[axis];
            flat %= self.strides[axis];
        }
        index
    }
}

impl<const D: usize> Index<[usize; D]> for Tensor<D> {
    type Output = f64;

    fn index(&self, index: [usize; D]) -> &f64 {
        &self.data[self.offset(index)]
    }
}

impl<const D: usize> IndexMut<[usize; D]> for Tensor<D> {
    fn index_mut(&mut self, index: [usize; D]) -> &mut f64 {
        let flat = self.offset(index);
        &mut self.data[flat]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_min_propagates_nan() {
        let mut t = Tensor::from_fn([2, 2], |[i, j]| (i + j) as f64);
        assert_eq!(t.min(), 0.0);
        t[[1, 0]] = f64::NAN;
        assert!(t.min().is_nan());
        assert!(!(t.min() >= 0.0));
        t.fill(f64::NAN);
        assert!(t.min().is_nan());
    }

    #[test]
    fn test_row_major_layout() {
        let t = Tensor::from_fn([2, 3], |[i, j]| (i * 10 + j) as f64);
        assert_eq!(t.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(t[[1, 2]], 12.0);
        assert_eq!(t.get([2, 0]), None);
    }

    #[test]
    fn test_fill_and_assign() {
        let mut t = Tensor::<3>::zeros([2, 2, 2]);
        t.fill(0.5);
        assert_eq!(t.sum(), 4.0);
        t.assign_with(|[a, b, c]| (a + b + c) as f64);
        assert_eq!(t[[1, 1, 1]], 3.0);
        t[[0, 0, 0]] += 7.0;
        assert_eq!(t[[0, 0, 0]], 7.0);
    }

    #[test]
    fn test_aggregate_keeps_requested_axes_in_order() {
        let t = Tensor::from_fn([2, 3, 4], |[r, a, s]| (r * 100 + a * 10 + s) as f64);
        let by_region = t.aggregate([0]);
        assert_eq!(by_region.shape(), [2]);
        let expected_r0: f64 = (0..3)
            .flat_map(|a| (0..4).map(move |s| (a * 10 + s) as f64))
            .sum();
        assert_eq!(by_region[[0]], expected_r0);

        let swapped = t.aggregate([2, 0]);
        assert_eq!(swapped.shape(), [4, 2]);
        assert_eq!(swapped[[3, 1]], (0..3).map(|a| (100 + a * 10 + 3) as f64).sum::<f64>());
    }

    #[test]
    #[should_panic(expected = "listed more than once")]
    fn test_aggregate_rejects_repeated_axis() {
        let t = Tensor::<2>::zeros([2, 2]);
        let _ = t.aggregate([1, 1]);
    }

    proptest! {
        #[test]
        fn aggregation_preserves_total(values in proptest::collection::vec(0.0f64..1e6, 24)) {
            let t = Tensor::from_fn([2, 3, 4], |[i, j, k]| values[i * 12 + j * 4 + k]);
            let total = t.sum();
            let partial = t.aggregate([1]).sum();
            prop_assert!((total - partial).abs() <= 1e-9 * total.max(1.0));
        }
    }
}
