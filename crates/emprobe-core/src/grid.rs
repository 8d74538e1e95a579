use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("grid shape {shape:?} holds {expected} values, got {actual}")]
    LengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("grid shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch { left: [usize; 3], right: [usize; 3] },
}

/// Flat storage, last axis fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid3<T> {
    shape: [usize; 3],
    values: Vec<T>,
}

impl<T: Clone> Grid3<T> {
    pub fn filled(shape: [usize; 3], value: T) -> Self {
        Self {
            shape,
            values: vec![value; shape.iter().product()],
        }
    }
}

impl<T: Clone + Default> Grid3<T> {
    pub fn new(shape: [usize; 3]) -> Self {
        Self::filled(shape, T::default())
    }
}

impl<T> Grid3<T> {
    pub fn from_vec(shape: [usize; 3], values: Vec<T>) -> Result<Self, GridError> {
        let expected = shape.iter().product();
        if values.len() != expected {
            return Err(GridError::LengthMismatch {
                shape: shape.to_vec(),
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, pos: [usize; 3]) -> bool {
        pos.iter().zip(self.shape).all(|(&index, extent)| index < extent)
    }

    fn offset(&self, pos: [usize; 3]) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos[0] * self.shape[1] + pos[1]) * self.shape[2] + pos[2])
    }

    pub fn get(&self, pos: [usize; 3]) -> Option<&T> {
        self.offset(pos).map(|offset| &self.values[offset])
    }

    pub fn get_mut(&mut self, pos: [usize; 3]) -> Option<&mut T> {
        self.offset(pos).map(|offset| &mut self.values[offset])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Node positions in storage order.
    pub fn positions(&self) -> impl Iterator<Item = [usize; 3]> + use<T> {
        positions(self.shape)
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid3<U> {
        Grid3 {
            shape: self.shape,
            values: self.values.iter().map(f).collect(),
        }
    }
}

impl<T> Index<[usize; 3]> for Grid3<T> {
    type Output = T;

    fn index(&self, pos: [usize; 3]) -> &T {
        match self.offset(pos) {
            Some(offset) => &self.values[offset],
            None => panic!("grid position {pos:?} outside shape {:?}", self.shape),
        }
    }
}

impl<T> IndexMut<[usize; 3]> for Grid3<T> {
    fn index_mut(&mut self, pos: [usize; 3]) -> &mut T {
        match self.offset(pos) {
            Some(offset) => &mut self.values[offset],
            None => panic!("grid position {pos:?} outside shape {:?}", self.shape),
        }
    }
}

pub fn positions(shape: [usize; 3]) -> impl Iterator<Item = [usize; 3]> {
    (0..shape[0]).flat_map(move |i| {
        (0..shape[1]).flat_map(move |j| (0..shape[2]).map(move |k| [i, j, k]))
    })
}

/// Three component grids sharing one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGrid3<T> {
    components: [Grid3<T>; 3],
}

impl<T: Clone + Default> VectorGrid3<T> {
    pub fn new(shape: [usize; 3]) -> Self {
        Self {
            components: [Grid3::new(shape), Grid3::new(shape), Grid3::new(shape)],
        }
    }
}

impl<T> VectorGrid3<T> {
    pub fn from_components(components: [Grid3<T>; 3]) -> Result<Self, GridError> {
        let shape = components[0].shape();
        for component in &components[1..] {
            if component.shape() != shape {
                return Err(GridError::ShapeMismatch {
                    left: shape,
                    right: component.shape(),
                });
            }
        }
        Ok(Self { components })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.components[0].shape()
    }

    pub fn component(&self, axis: usize) -> &Grid3<T> {
        &self.components[axis]
    }

    pub fn component_mut(&mut self, axis: usize) -> &mut Grid3<T> {
        &mut self.components[axis]
    }

    pub fn components(&self) -> &[Grid3<T>; 3] {
        &self.components
    }

    pub fn get(&self, axis: usize, pos: [usize; 3]) -> Option<&T> {
        self.components.get(axis).and_then(|grid| grid.get(pos))
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> VectorGrid3<U> {
        VectorGrid3 {
            components: [
                self.components[0].map(&mut f),
                self.components[1].map(&mut f),
                self.components[2].map(&mut f),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid2<T> {
    shape: [usize; 2],
    values: Vec<T>,
}

impl<T: Clone + Default> Grid2<T> {
    pub fn new(shape: [usize; 2]) -> Self {
        Self {
            shape,
            values: vec![T::default(); shape[0] * shape[1]],
        }
    }
}

impl<T> Grid2<T> {
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn get(&self, pos: [usize; 2]) -> Option<&T> {
        (pos[0] < self.shape[0] && pos[1] < self.shape[1])
            .then(|| &self.values[pos[0] * self.shape[1] + pos[1]])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }
}

impl<T> Index<[usize; 2]> for Grid2<T> {
    type Output = T;

    fn index(&self, pos: [usize; 2]) -> &T {
        match self.get(pos) {
            Some(value) => value,
            None => panic!("grid position {pos:?} outside shape {:?}", self.shape),
        }
    }
}

impl<T> IndexMut<[usize; 2]> for Grid2<T> {
    fn index_mut(&mut self, pos: [usize; 2]) -> &mut T {
        if pos[0] >= self.shape[0] || pos[1] >= self.shape[1] {
            panic!("grid position {pos:?} outside shape {:?}", self.shape);
        }
        &mut self.values[pos[0] * self.shape[1] + pos[1]]
    }
}

#[cfg(test)]
mod tests {
    use super::{Grid2, Grid3, GridError, VectorGrid3};

    #[test]
    fn grid3_accessors_are_bounds_checked() {
        let mut grid: Grid3<f64> = Grid3::new([2, 3, 4]);
        assert_eq!(grid.len(), 24);
        assert!(grid.get([1, 2, 3]).is_some());
        assert!(grid.get([2, 0, 0]).is_none());
        assert!(grid.get([0, 3, 0]).is_none());

        *grid.get_mut([1, 2, 3]).expect("position should be in range") = 7.5;
        assert_eq!(grid[[1, 2, 3]], 7.5);
        assert_eq!(grid.as_slice()[23], 7.5);
    }

    #[test]
    #[should_panic(expected = "outside shape")]
    fn grid3_index_panics_outside_shape() {
        let grid: Grid3<f64> = Grid3::new([1, 1, 1]);
        let _ = grid[[0, 0, 1]];
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let error = Grid3::from_vec([2, 2, 2], vec![0.0; 7]).expect_err("length should mismatch");
        assert_eq!(
            error,
            GridError::LengthMismatch {
                shape: vec![2, 2, 2],
                expected: 8,
                actual: 7,
            }
        );
    }

    #[test]
    fn positions_follow_storage_order() {
        let grid: Grid3<u8> = Grid3::new([2, 1, 2]);
        let positions: Vec<_> = grid.positions().collect();
        assert_eq!(positions, vec![[0, 0, 0], [0, 0, 1], [1, 0, 0], [1, 0, 1]]);
    }

    #[test]
    fn vector_grid_rejects_mismatched_components() {
        let error = VectorGrid3::from_components([
            Grid3::<f64>::new([2, 2, 2]),
            Grid3::new([2, 2, 2]),
            Grid3::new([2, 2, 3]),
        ])
        .expect_err("shapes should mismatch");
        assert!(matches!(error, GridError::ShapeMismatch { .. }));
    }

    #[test]
    fn grid2_round_trips_values() {
        let mut plane: Grid2<f64> = Grid2::new([3, 2]);
        plane[[2, 1]] = -1.0;
        assert_eq!(plane.get([2, 1]), Some(&-1.0));
        assert_eq!(plane.get([3, 0]), None);
    }
}
