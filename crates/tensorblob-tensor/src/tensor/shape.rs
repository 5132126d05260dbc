use super::TensorError;

/// Shape of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    /// The dimensions of the tensor.
    pub dims: Vec<usize>,
}

impl Shape {
    /// Constructs a new `Shape`.
    pub fn new<const D: usize>(dims: [usize; D]) -> Self {
        Self {
            dims: dims.to_vec(),
        }
    }

    /// Returns the total number of elements of a tensor having this shape.
    ///
    /// A scalar (no dimensions) holds one element, any zero dimension makes the tensor empty.
    /// Counts that do not fit in a `usize` saturate, shapes read from the wire are rejected
    /// before that point.
    pub fn num_elements(&self) -> usize {
        self.try_num_elements().unwrap_or(usize::MAX)
    }

    /// Total number of elements, `None` if it does not fit in a `usize`.
    pub fn try_num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |numel, &dim| numel.checked_mul(dim))
    }

    /// Returns the number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Dimensions as signed 64 bit integers, the representation used on the wire.
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.dims.iter().map(|&d| d as i64).collect()
    }
}

impl TryFrom<&[i64]> for Shape {
    type Error = TensorError;

    fn try_from(dims: &[i64]) -> Result<Self, Self::Error> {
        let dims = dims
            .iter()
            .map(|&d| usize::try_from(d).map_err(|_| TensorError::NegativeDimension(d)))
            .collect::<Result<Vec<_>, _>>()?;
        let shape = Self { dims };

        match shape.try_num_elements() {
            Some(_) => Ok(shape),
            None => Err(TensorError::ElementCountOverflow(shape.dims)),
        }
    }
}

impl IntoIterator for Shape {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.dims.into_iter()
    }
}

impl<const D: usize> From<[usize; D]> for Shape {
    fn from(dims: [usize; D]) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape { dims: dims.into() }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(shape: Vec<usize>) -> Self {
        Self { dims: shape }
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.dims
    }
}
